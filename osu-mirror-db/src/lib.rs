// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! SQLite persistence for the osu! beatmap catalog.
//!
//! Tables are described as plain data ([`EntitySchema`] built from
//! [`Field`]s); rows to write are [`Record`]s bound to a schema. A [`Store`]
//! creates tables, inserts records singly or in batches and answers equality
//! queries. On top of that the crate tracks which beatmapsets were already
//! downloaded, keyed by beatmapset id.
//!
//! # Key Features
//!
//! - Declarative schemas with defaults, uniqueness and foreign keys
//! - Conflict policies (abort, replace, ignore) per insert
//! - One transaction per table for batched inserts
//! - Dedup of catalog entries per beatmapset
//! - [`ConcurrentStore`]: writes on a background connection, reads on the
//!   caller's
//!
//! # Example
//!
//! ```ignore
//! use osu_mirror_db::{ConflictPolicy, OpenMode, Store, StoreOptions};
//!
//! let mut store = Store::open("database.db", OpenMode::Create, StoreOptions::default())?;
//! store.initialize_schemas()?;
//!
//! if !store.is_group_downloaded(39804)? {
//!     store.flag_as_downloaded(39804, ConflictPolicy::Ignore)?;
//! }
//! ```

mod catalog;
mod concurrent;
mod connection;
mod error;
mod field;
mod proxy;
mod query;
mod record;
mod schema;
mod tracker;
mod value;
mod write;

pub use catalog::{
    ApprovedStatus, BEATMAPS, BEATMAPS_TABLE, BEATMAPSET_ID, Beatmap, DOWNLOADED_BEATMAPSETS,
    DOWNLOADED_TABLE, DownloadedMarker, REQUIRED_BEATMAP_KEYS,
};
pub use concurrent::{ConcurrentStore, PendingWrite};
pub use connection::{OpenMode, Store, StoreOptions};
pub use error::{Error, Result};
pub use field::{Field, FieldType, ForeignKey};
pub use proxy::{TaskHandle, WriteOp, WriteProxy};
pub use query::Row;
pub use record::{Params, Record, Statement};
pub use schema::{ConflictPolicy, EntitySchema, SchemaRegistry};
pub use tracker::{GroupDescriptor, dedup_by_group};
pub use value::Value;
pub use write::BatchSummary;
