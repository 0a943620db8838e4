// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Catalog sync: record fetched entries, pick one beatmap per beatmapset
//! and fetch every beatmapset that is not marked as downloaded yet.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use osu_mirror_db::{
    Beatmap, ConcurrentStore, ConflictPolicy, Error as DbError, PendingWrite, Store,
    dedup_by_group,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, IoContext, Result};
use crate::filter::BeatmapFilter;
use crate::source::CatalogSource;

/// Extension of beatmapset archives.
pub const ARCHIVE_EXTENSION: &str = "osz";

/// The store operations a sync needs. Writes hand back a [`PendingWrite`]
/// so that queued and immediate stores can be driven the same way.
pub trait CatalogStore {
    fn record_beatmaps(&mut self, beatmaps: &[Beatmap]) -> Result<PendingWrite>;
    fn stored_beatmaps(&self) -> Result<Vec<Beatmap>>;
    fn is_downloaded(&self, beatmap: &Beatmap) -> Result<bool>;
    fn mark_downloaded(&mut self, beatmap: &Beatmap) -> Result<PendingWrite>;
}

impl CatalogStore for Store {
    fn record_beatmaps(&mut self, beatmaps: &[Beatmap]) -> Result<PendingWrite> {
        let summaries = self.add_beatmaps(beatmaps, ConflictPolicy::Replace)?;
        Ok(PendingWrite::settled(summaries.iter().map(|s| s.rows).sum()))
    }

    fn stored_beatmaps(&self) -> Result<Vec<Beatmap>> {
        Ok(self.get_all_beatmaps()?)
    }

    fn is_downloaded(&self, beatmap: &Beatmap) -> Result<bool> {
        Ok(self.is_group_downloaded(beatmap)?)
    }

    fn mark_downloaded(&mut self, beatmap: &Beatmap) -> Result<PendingWrite> {
        self.flag_as_downloaded(beatmap, ConflictPolicy::Ignore)?;
        Ok(PendingWrite::settled(1))
    }
}

impl CatalogStore for ConcurrentStore {
    fn record_beatmaps(&mut self, beatmaps: &[Beatmap]) -> Result<PendingWrite> {
        Ok(self.add_beatmaps(beatmaps, ConflictPolicy::Replace)?)
    }

    fn stored_beatmaps(&self) -> Result<Vec<Beatmap>> {
        Ok(self.get_all_beatmaps()?)
    }

    fn is_downloaded(&self, beatmap: &Beatmap) -> Result<bool> {
        Ok(self.is_group_downloaded(beatmap)?)
    }

    fn mark_downloaded(&mut self, beatmap: &Beatmap) -> Result<PendingWrite> {
        let (_, pending) = self.flag_as_downloaded(beatmap, ConflictPolicy::Ignore)?;
        Ok(pending)
    }
}

/// Brings one beatmapset to disk.
pub trait GroupFetcher {
    fn fetch_group(&mut self, beatmap: &Beatmap) -> Result<()>;
}

/// Treats a beatmapset as fetched when its archive is already in the
/// download directory, e.g. `39804 xi - FREEDOM DiVE.osz`.
#[derive(Debug, Clone)]
pub struct ArchiveDirFetcher {
    dir: PathBuf,
}

impl ArchiveDirFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The archive for `beatmapset_id`, if one exists.
    pub fn find_archive(&self, beatmapset_id: i64) -> Result<Option<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::io(
                    format!("Failed to list {}", self.dir.display()),
                    e,
                ));
            }
        };

        let prefix = beatmapset_id.to_string();
        for entry in entries {
            let entry =
                entry.io_context(|| format!("Failed to list {}", self.dir.display()))?;
            let path = entry.path();
            if is_archive_of(&path, &prefix) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

fn is_archive_of(path: &Path, prefix: &str) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXTENSION) {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    // "123 title" and "123" belong to set 123, "1234 title" does not.
    stem.strip_prefix(prefix)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
}

impl GroupFetcher for ArchiveDirFetcher {
    fn fetch_group(&mut self, beatmap: &Beatmap) -> Result<()> {
        let beatmapset_id = beatmap.beatmapset_id().ok_or(DbError::MissingGroupId)?;
        match self.find_archive(beatmapset_id)? {
            Some(path) => {
                debug!("Found {} for {beatmap}", path.display());
                Ok(())
            }
            None => Err(Error::MissingArchive {
                beatmapset_id,
                dir: self.dir.clone(),
            }),
        }
    }
}

/// Switches of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub record_beatmaps: bool,
    pub lookup_beatmaps_in_database: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            record_beatmaps: true,
            lookup_beatmaps_in_database: false,
        }
    }
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            record_beatmaps: config.record_beatmaps,
            lookup_beatmaps_in_database: config.lookup_beatmaps_in_database,
        }
    }
}

/// What a sync run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries returned by the source
    pub fetched: usize,
    /// Rows written to the beatmaps table
    pub recorded: usize,
    /// Entries that passed the filters, stored ones included
    pub candidates: usize,
    /// Beatmapsets among the candidates
    pub groups: usize,
    /// Beatmapsets already marked as downloaded
    pub skipped: usize,
    /// Beatmapsets fetched and marked in this run
    pub fetched_groups: Vec<i64>,
    /// Beatmapsets the fetcher failed on
    pub failed_groups: Vec<i64>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {} beatmaps, recorded {}, {} candidates in {} beatmapsets: \
             {} already downloaded, {} fetched, {} failed",
            self.fetched,
            self.recorded,
            self.candidates,
            self.groups,
            self.skipped,
            self.fetched_groups.len(),
            self.failed_groups.len()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Syncer {
    filter: BeatmapFilter,
    options: SyncOptions,
}

impl Syncer {
    pub fn new(filter: BeatmapFilter, options: SyncOptions) -> Self {
        Self { filter, options }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            BeatmapFilter::from_config(&config.filters)?,
            SyncOptions::from(config),
        ))
    }

    /// Run one sync.
    ///
    /// A fetcher failure only affects its own beatmapset; store failures
    /// abort the run. Markers are committed before this returns.
    pub fn run<S, C, F>(&self, store: &mut S, source: &mut C, fetcher: &mut F) -> Result<SyncReport>
    where
        S: CatalogStore + ?Sized,
        C: CatalogSource + ?Sized,
        F: GroupFetcher + ?Sized,
    {
        let mut report = SyncReport::default();

        let mut beatmaps = source.fetch()?;
        report.fetched = beatmaps.len();
        info!("Fetched {} beatmaps from the catalog", report.fetched);

        if self.options.record_beatmaps && !beatmaps.is_empty() {
            report.recorded = store.record_beatmaps(&beatmaps)?.wait()?;
            info!("Recorded {} beatmaps into the database", report.recorded);
        }

        if self.options.lookup_beatmaps_in_database {
            let stored = store.stored_beatmaps()?;
            info!(
                "Found {} beatmaps in the database, {} in total",
                stored.len(),
                beatmaps.len() + stored.len()
            );
            beatmaps.extend(stored);
        }

        let candidates = self.filter.apply(beatmaps);
        report.candidates = candidates.len();
        let groups = dedup_by_group(candidates);
        report.groups = groups.len();
        info!(
            "{} beatmaps passed the filters, {} unique beatmapsets",
            report.candidates, report.groups
        );

        let mut markers = PendingWrite::default();
        for beatmap in &groups {
            if store.is_downloaded(beatmap)? {
                debug!("Already downloaded: {beatmap}");
                report.skipped += 1;
                continue;
            }
            // dedup_by_group only keeps entries that carry a beatmapset id
            let beatmapset_id = beatmap.beatmapset_id().unwrap_or_default();
            match fetcher.fetch_group(beatmap) {
                Ok(()) => {
                    markers.merge(store.mark_downloaded(beatmap)?);
                    report.fetched_groups.push(beatmapset_id);
                }
                Err(e) => {
                    warn!("Failed to fetch {beatmap}: {e}");
                    report.failed_groups.push(beatmapset_id);
                }
            }
        }
        markers.wait()?;

        Ok(report)
    }
}
