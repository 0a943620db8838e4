// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

use std::process::ExitCode;

use log::{error, info, warn};
use osu_mirror::config::{self, Config};
use osu_mirror::error::{IoContext, Result};
use osu_mirror::source::{CatalogSource, JsonDumpSource};
use osu_mirror::sync::{ArchiveDirFetcher, CatalogStore, SyncReport, Syncer};
use osu_mirror_db::{Beatmap, ConcurrentStore, OpenMode, Store};

fn main() -> ExitCode {
    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("osu-mirror: {e}");
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    match run(&config) {
        Ok(report) => {
            info!("Sync finished: {report}");
            if report.failed_groups.is_empty() {
                ExitCode::SUCCESS
            } else {
                warn!("Beatmapsets not fetched: {:?}", report.failed_groups);
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<SyncReport> {
    info!("Database: {}", config.database.display());
    info!("Download directory: {}", config.download_dir.display());

    std::fs::create_dir_all(&config.download_dir).io_context(|| {
        format!(
            "Failed to create download directory {}",
            config.download_dir.display()
        )
    })?;

    let syncer = Syncer::from_config(config)?;
    let mut source: Box<dyn CatalogSource> = match &config.catalog_dump {
        Some(path) => Box::new(JsonDumpSource::new(path)),
        None => {
            warn!("No catalog_dump configured, nothing new to import");
            Box::new(Vec::<Beatmap>::new())
        }
    };
    let mut fetcher = ArchiveDirFetcher::new(&config.download_dir);

    let mut store: Box<dyn CatalogStore> = if config.threaded_writes {
        let store = ConcurrentStore::open(&config.database, config.store_options())?;
        store.initialize_schemas()?;
        Box::new(store)
    } else {
        let store = Store::open(&config.database, OpenMode::Create, config.store_options())?;
        store.initialize_schemas()?;
        Box::new(store)
    };

    syncer.run(store.as_mut(), source.as_mut(), &mut fetcher)
}
