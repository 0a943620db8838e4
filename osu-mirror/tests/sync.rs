#![recursion_limit = "256"]

// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! End-to-end sync runs against real databases.

use std::fs;
use std::path::Path;

use osu_mirror::config::Config;
use osu_mirror::source::JsonDumpSource;
use osu_mirror::sync::{ArchiveDirFetcher, CatalogStore, Syncer};
use osu_mirror_db::{BEATMAPS_TABLE, ConcurrentStore, DOWNLOADED_TABLE, OpenMode, Store};
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

fn entry(beatmap_id: i64, beatmapset_id: i64, approved: i64, difficulty: f64) -> serde_json::Value {
    json!({
        "beatmap_id": beatmap_id.to_string(),
        "beatmapset_id": beatmapset_id.to_string(),
        "approved": approved.to_string(),
        "total_length": "120",
        "hit_length": "110",
        "version": format!("diff {beatmap_id}"),
        "file_md5": format!("{beatmap_id:032x}"),
        "diff_size": "4",
        "diff_overall": "7",
        "diff_approach": "8",
        "diff_drain": "5",
        "mode": "0",
        "count_normal": "300",
        "count_slider": "200",
        "count_spinner": "1",
        "submit_date": "2020-01-02 03:04:05",
        "approved_date": null,
        "last_update": "2020-02-03 04:05:06",
        "artist": "artist",
        "artist_unicode": "artist",
        "title": format!("song {beatmapset_id}"),
        "title_unicode": format!("song {beatmapset_id}"),
        "creator": "mapper",
        "creator_id": "2",
        "bpm": "180",
        "source": "",
        "tags": "",
        "genre_id": "1",
        "language_id": "1",
        "favourite_count": "50",
        "rating": "9.1",
        "storyboard": "0",
        "video": "0",
        "download_unavailable": "0",
        "audio_unavailable": "0",
        "playcount": "10",
        "passcount": "5",
        "packs": null,
        "max_combo": "700",
        "diff_aim": null,
        "diff_speed": null,
        "difficultyrating": difficulty.to_string()
    })
}

struct Fixture {
    dir: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("Downloads");
        fs::create_dir(&downloads).unwrap();

        let dump = dir.path().join("catalog.json");
        let entries = json!([
            entry(1, 100, 1, 4.5),
            entry(2, 100, 1, 5.5),
            entry(3, 200, 1, 5.0),
            entry(4, 300, -2, 5.0),
            entry(5, 400, 4, 9.0),
        ]);
        fs::write(&dump, entries.to_string()).unwrap();

        // 100 and 200 are on disk already, 400 is not.
        fs::write(downloads.join("100 artist - song 100.osz"), b"").unwrap();
        fs::write(downloads.join("200 artist - song 200.osz"), b"").unwrap();

        let mut config = Config {
            database: dir.path().join("database.db"),
            download_dir: downloads,
            catalog_dump: Some(dump),
            ..Config::default()
        };
        config.filters.approved = vec![1, 4];
        Self { dir, config }
    }

    fn database(&self) -> &Path {
        &self.config.database
    }
}

fn open_store(config: &Config, threaded: bool) -> Box<dyn CatalogStore> {
    if threaded {
        let store = ConcurrentStore::open(&config.database, config.store_options()).unwrap();
        store.initialize_schemas().unwrap();
        Box::new(store)
    } else {
        let store = Store::open(&config.database, OpenMode::Create, config.store_options()).unwrap();
        store.initialize_schemas().unwrap();
        Box::new(store)
    }
}

#[rstest]
#[case::direct(false)]
#[case::threaded(true)]
fn test_sync_records_and_marks(#[case] threaded: bool) {
    let fixture = Fixture::new();
    let syncer = Syncer::from_config(&fixture.config).unwrap();
    let mut fetcher = ArchiveDirFetcher::new(&fixture.config.download_dir);
    let dump = fixture.config.catalog_dump.clone().unwrap();

    let report = {
        let mut store = open_store(&fixture.config, threaded);
        syncer
            .run(store.as_mut(), &mut JsonDumpSource::new(&dump), &mut fetcher)
            .unwrap()
    };
    assert_eq!(report.fetched, 5);
    assert_eq!(report.recorded, 5);
    assert_eq!(report.candidates, 4);
    assert_eq!(report.groups, 3);
    assert_eq!(report.fetched_groups, [100, 200]);
    assert_eq!(report.failed_groups, [400]);

    let db = Store::open(fixture.database(), OpenMode::ReadWrite, Default::default()).unwrap();
    assert_eq!(db.count(BEATMAPS_TABLE).unwrap(), 5);
    assert_eq!(db.count(DOWNLOADED_TABLE).unwrap(), 2);
    assert!(db.is_group_downloaded(100).unwrap());
    assert!(!db.is_group_downloaded(400).unwrap());
    assert_eq!(db.get_beatmap(2).unwrap().unwrap().title(), Some("song 100"));

    // Once the archive shows up, a second run only picks up set 400.
    fs::write(
        fixture.config.download_dir.join("400 artist - song 400.osz"),
        b"",
    )
    .unwrap();
    drop(db);
    let report = {
        let mut store = open_store(&fixture.config, threaded);
        syncer
            .run(store.as_mut(), &mut JsonDumpSource::new(&dump), &mut fetcher)
            .unwrap()
    };
    assert_eq!(report.skipped, 2);
    assert_eq!(report.fetched_groups, [400]);
    assert!(report.failed_groups.is_empty());
    assert!(fixture.dir.path().join("database.db").exists());
}

/// An entry missing catalog columns is dropped by the source instead of
/// failing the whole run.
#[rstest]
#[case::direct(false)]
#[case::threaded(true)]
fn test_incomplete_entry_does_not_abort_sync(#[case] threaded: bool) {
    let fixture = Fixture::new();
    let dump = fixture.config.catalog_dump.clone().unwrap();
    let entries = json!([
        entry(1, 100, 1, 4.5),
        {"beatmap_id": "6", "beatmapset_id": "500", "approved": "1", "title": "a", "version": "v"},
    ]);
    fs::write(&dump, entries.to_string()).unwrap();
    fs::write(fixture.config.download_dir.join("500.osz"), b"").unwrap();

    let syncer = Syncer::from_config(&fixture.config).unwrap();
    let mut fetcher = ArchiveDirFetcher::new(&fixture.config.download_dir);
    let report = {
        let mut store = open_store(&fixture.config, threaded);
        syncer
            .run(store.as_mut(), &mut JsonDumpSource::new(&dump), &mut fetcher)
            .unwrap()
    };
    assert_eq!(report.fetched, 1);
    assert_eq!(report.fetched_groups, [100]);

    let db = Store::open(fixture.database(), OpenMode::ReadWrite, Default::default()).unwrap();
    assert!(db.is_group_downloaded(100).unwrap());
    assert!(!db.is_group_downloaded(500).unwrap());
}
