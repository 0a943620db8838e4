// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Where catalog entries come from.

use std::path::{Path, PathBuf};

use osu_mirror_db::Beatmap;
use tracing::{debug, warn};

use crate::error::{IoContext, Result};

pub trait CatalogSource {
    /// Fetch the current batch of catalog entries.
    fn fetch(&mut self) -> Result<Vec<Beatmap>>;
}

/// Entries handed over in memory; drained by the first fetch.
impl CatalogSource for Vec<Beatmap> {
    fn fetch(&mut self) -> Result<Vec<Beatmap>> {
        Ok(std::mem::take(self))
    }
}

/// A file holding a JSON array of catalog entries, as the catalog API
/// returns them.
#[derive(Debug, Clone)]
pub struct JsonDumpSource {
    path: PathBuf,
}

impl JsonDumpSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonDumpSource {
    /// Entries that could not be written to the beatmaps table (a required
    /// key or a not-null column missing) are skipped with a warning.
    fn fetch(&mut self) -> Result<Vec<Beatmap>> {
        let contents = std::fs::read_to_string(&self.path)
            .io_context(|| format!("Failed to read catalog dump {}", self.path.display()))?;
        let entries: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(&contents)?;

        let total = entries.len();
        let beatmaps: Vec<Beatmap> = entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match storable_beatmap(entry) {
                Ok(beatmap) => Some(beatmap),
                Err(e) => {
                    warn!("Skipping entry #{i} of {}: {e}", self.path.display());
                    None
                }
            })
            .collect();
        debug!(
            "Read {} of {total} entries from {}",
            beatmaps.len(),
            self.path.display()
        );
        Ok(beatmaps)
    }
}

fn storable_beatmap(entry: &serde_json::Map<String, serde_json::Value>) -> Result<Beatmap> {
    let beatmap = Beatmap::from_json(entry)?;
    beatmap.record().to_insert_parameters()?;
    Ok(beatmap)
}
