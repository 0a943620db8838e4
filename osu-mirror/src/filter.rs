// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Selection of which catalog entries are worth downloading.

use std::collections::HashSet;
use std::str::FromStr;

use osu_mirror_db::{ApprovedStatus, Beatmap, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

/// Filters as written in the settings file. Unset means "accept anything".
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Accepted approval codes (4 loved ... -2 graveyard)
    #[serde(default)]
    pub approved: Vec<i64>,

    /// `"x.xx"` for an exact star rating or `"a-b"` for an inclusive range
    #[serde(default)]
    pub difficulty: Option<String>,

    #[serde(default)]
    pub min_favourites: Option<i64>,

    #[serde(default)]
    pub min_rating: Option<f64>,
}

/// Star rating condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DifficultyRange {
    Exact(f64),
    Between(f64, f64),
}

impl DifficultyRange {
    pub fn contains(&self, rating: f64) -> bool {
        match *self {
            DifficultyRange::Exact(expected) => rating == expected,
            DifficultyRange::Between(low, high) => (low..=high).contains(&rating),
        }
    }
}

impl FromStr for DifficultyRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let number = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| Error::filter(format!("'{s}' is not a difficulty or range")))
        };
        match s.split_once('-') {
            Some((a, b)) => {
                let (a, b) = (number(a)?, number(b)?);
                // Bounds may be given in either order.
                Ok(DifficultyRange::Between(a.min(b), a.max(b)))
            }
            None => Ok(DifficultyRange::Exact(number(s)?)),
        }
    }
}

/// Compiled [`FilterConfig`]. A beatmap passes when every configured
/// condition accepts it; a missing or unreadable attribute never passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatmapFilter {
    approved: Option<HashSet<ApprovedStatus>>,
    difficulty: Option<DifficultyRange>,
    min_favourites: Option<i64>,
    min_rating: Option<f64>,
}

impl BeatmapFilter {
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let approved = if config.approved.is_empty() {
            None
        } else {
            let statuses = config
                .approved
                .iter()
                .map(|code| {
                    ApprovedStatus::from_value(&Value::Integer(*code))
                        .ok_or_else(|| Error::filter(format!("unknown approval status {code}")))
                })
                .collect::<Result<HashSet<_>>>()?;
            Some(statuses)
        };

        let difficulty = config
            .difficulty
            .as_deref()
            .map(DifficultyRange::from_str)
            .transpose()?;

        Ok(Self {
            approved,
            difficulty,
            min_favourites: config.min_favourites,
            min_rating: config.min_rating,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn accepts(&self, beatmap: &Beatmap) -> bool {
        let approved = self.approved.as_ref().is_none_or(|allowed| {
            beatmap.approved().is_some_and(|status| allowed.contains(&status))
        });
        let difficulty = self.difficulty.is_none_or(|range| {
            beatmap
                .difficulty_rating()
                .is_some_and(|rating| range.contains(rating))
        });
        let favourites = self
            .min_favourites
            .is_none_or(|min| beatmap.favourite_count().is_some_and(|n| n >= min));
        let rating = self
            .min_rating
            .is_none_or(|min| beatmap.rating().is_some_and(|r| r >= min));

        approved && difficulty && favourites && rating
    }

    /// Keep the beatmaps this filter accepts, in their original order.
    pub fn apply(&self, beatmaps: Vec<Beatmap>) -> Vec<Beatmap> {
        beatmaps
            .into_iter()
            .filter(|beatmap| {
                let keep = self.accepts(beatmap);
                if !keep {
                    trace!("Filtered out {beatmap}");
                }
                keep
            })
            .collect()
    }
}
