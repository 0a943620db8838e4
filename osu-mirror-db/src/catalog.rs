// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! osu! catalog tables and their typed views.

use std::fmt;
use std::sync::LazyLock;

use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};
use crate::field::{Field, FieldType};
use crate::query::Row;
use crate::record::Record;
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::value::Value;

pub const BEATMAPS_TABLE: &str = "beatmaps";
pub const DOWNLOADED_TABLE: &str = "downloaded_beatmapsets";

/// Column holding the group (beatmapset) id in both tables.
pub const BEATMAPSET_ID: &str = "beatmapset_id";

/// Keys a raw catalog entry must carry to be usable at all.
pub const REQUIRED_BEATMAP_KEYS: &[&str] =
    &["beatmap_id", BEATMAPSET_ID, "approved", "title", "version"];

fn beatmap_fields() -> Vec<Field> {
    use FieldType::*;

    vec![
        Field::new("beatmap_id", Integer).not_null().primary_key().unique(),
        Field::new(BEATMAPSET_ID, Integer).not_null(),
        Field::new("approved", Integer).not_null(),
        Field::new("total_length", Integer).not_null(),
        Field::new("hit_length", Integer).not_null(),
        Field::new("version", Text).not_null(),
        Field::new("file_md5", Text).not_null(),
        Field::new("diff_size", Real).not_null(),
        Field::new("diff_overall", Real).not_null(),
        Field::new("diff_approach", Real).not_null(),
        Field::new("diff_drain", Real).not_null(),
        Field::new("mode", Integer).not_null(),
        Field::new("count_normal", Integer).not_null(),
        Field::new("count_slider", Integer).not_null(),
        Field::new("count_spinner", Integer).not_null(),
        Field::new("submit_date", Timestamp).not_null(),
        Field::new("approved_date", Timestamp),
        Field::new("last_update", Timestamp),
        Field::new("artist", Text).not_null(),
        Field::new("artist_unicode", Text).not_null(),
        Field::new("title", Text).not_null(),
        Field::new("title_unicode", Text).not_null(),
        Field::new("creator", Text).not_null(),
        Field::new("creator_id", Integer).not_null(),
        Field::new("bpm", Real).not_null(),
        Field::new("source", Text),
        Field::new("tags", Text).not_null(),
        Field::new("genre_id", Integer).not_null(),
        Field::new("language_id", Integer).not_null(),
        Field::new("favourite_count", Integer).not_null(),
        Field::new("rating", Real).not_null(),
        Field::new("storyboard", Boolean).not_null(),
        Field::new("video", Boolean).not_null(),
        Field::new("download_unavailable", Boolean).not_null(),
        Field::new("audio_unavailable", Boolean).not_null(),
        Field::new("playcount", Integer).not_null(),
        Field::new("passcount", Integer).not_null(),
        Field::new("packs", Text),
        Field::new("max_combo", Integer),
        Field::new("diff_aim", Real),
        Field::new("diff_speed", Real),
        Field::new("difficultyrating", Real),
    ]
}

fn downloaded_fields() -> Vec<Field> {
    vec![
        Field::new(BEATMAPSET_ID, FieldType::Integer)
            .not_null()
            .primary_key()
            .unique()
            .references(BEATMAPS_TABLE, BEATMAPSET_ID),
        Field::new("downloaded", FieldType::Boolean).default_value(false),
    ]
}

/// One row per beatmap (difficulty) as returned by the catalog API.
pub static BEATMAPS: LazyLock<EntitySchema> =
    LazyLock::new(|| EntitySchema::from_parts(BEATMAPS_TABLE, beatmap_fields()));

/// One marker row per fully downloaded beatmapset.
pub static DOWNLOADED_BEATMAPSETS: LazyLock<EntitySchema> =
    LazyLock::new(|| EntitySchema::from_parts(DOWNLOADED_TABLE, downloaded_fields()));

/// Registry holding the catalog schemas, referenced table first.
pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_ordered(vec![BEATMAPS.clone(), DOWNLOADED_BEATMAPSETS.clone()])
}

/// Ranking state of a beatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(i8)]
pub enum ApprovedStatus {
    Loved = 4,
    Qualified = 3,
    Approved = 2,
    Ranked = 1,
    Pending = 0,
    Wip = -1,
    Graveyard = -2,
}

impl ApprovedStatus {
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_i64()
            .and_then(|i| i8::try_from(i).ok())
            .and_then(|i| Self::try_from(i).ok())
    }
}

/// A catalog entry bound to the beatmaps schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Beatmap {
    record: Record<'static>,
}

impl Beatmap {
    /// Wrap a raw catalog entry, requiring the keys in [`REQUIRED_BEATMAP_KEYS`].
    pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        if let Some(missing) = REQUIRED_BEATMAP_KEYS
            .iter()
            .find(|key| !object.contains_key(**key))
        {
            return Err(Error::MissingRequiredField {
                table: BEATMAPS_TABLE.to_owned(),
                field: (*missing).to_owned(),
            });
        }
        Ok(Self {
            record: Record::from_json(&BEATMAPS, object),
        })
    }

    /// Wrap a row previously read from the beatmaps table.
    pub fn from_row(row: Row) -> Self {
        Self {
            record: Record::from_values(&BEATMAPS, row.into_inner()),
        }
    }

    /// Wrap a record without checking for the required keys.
    pub fn from_record(record: Record<'static>) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &Record<'static> {
        &self.record
    }

    pub fn into_record(self) -> Record<'static> {
        self.record
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.record.get(name)
    }

    pub fn id(&self) -> Option<i64> {
        self.get("beatmap_id").and_then(Value::as_i64)
    }

    pub fn beatmapset_id(&self) -> Option<i64> {
        self.get(BEATMAPSET_ID).and_then(Value::as_i64)
    }

    pub fn approved(&self) -> Option<ApprovedStatus> {
        self.get("approved").and_then(ApprovedStatus::from_value)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.get("version").and_then(Value::as_str)
    }

    pub fn artist(&self) -> Option<&str> {
        self.get("artist").and_then(Value::as_str)
    }

    pub fn difficulty_rating(&self) -> Option<f64> {
        self.get("difficultyrating").and_then(Value::as_f64)
    }

    pub fn favourite_count(&self) -> Option<i64> {
        self.get("favourite_count").and_then(Value::as_i64)
    }

    pub fn rating(&self) -> Option<f64> {
        self.get("rating").and_then(Value::as_f64)
    }
}

impl fmt::Display for Beatmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = |name: &str| self.get(name).map(Value::to_string).unwrap_or_default();
        write!(
            f,
            "{} {} - {} ({})",
            text(BEATMAPSET_ID),
            text("artist"),
            text("title"),
            text("version")
        )
    }
}

/// Marks a beatmapset as fully downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadedMarker {
    pub beatmapset_id: i64,
    pub downloaded: bool,
}

impl DownloadedMarker {
    pub fn downloaded(beatmapset_id: i64) -> Self {
        Self {
            beatmapset_id,
            downloaded: true,
        }
    }

    pub fn to_record(&self) -> Record<'static> {
        Record::new(&DOWNLOADED_BEATMAPSETS)
            .with(BEATMAPSET_ID, self.beatmapset_id)
            .with("downloaded", self.downloaded)
    }

    /// Read a marker back from a downloaded_beatmapsets row.
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            beatmapset_id: row.get(BEATMAPSET_ID)?.as_i64()?,
            downloaded: row.get("downloaded").and_then(Value::as_i64).unwrap_or(0) != 0,
        })
    }
}
