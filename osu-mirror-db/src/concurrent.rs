// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Store variant that hands every write to a [`WriteProxy`].
//!
//! Reads run synchronously on the caller's own connection. Writes are queued
//! and return a [`PendingWrite`]; they become visible to reads once the
//! worker has committed them.

use std::path::Path;

use tracing::{debug, warn};

use crate::catalog::{Beatmap, DownloadedMarker};
use crate::connection::{OpenMode, Store, StoreOptions};
use crate::error::Result;
use crate::proxy::{TaskHandle, WriteProxy};
use crate::query::Row;
use crate::record::Record;
use crate::schema::{ConflictPolicy, EntitySchema, SchemaRegistry};
use crate::tracker::GroupDescriptor;
use crate::write::partition;

/// Outcome of one or more queued tasks.
#[derive(Debug, Default)]
#[must_use = "dropping a PendingWrite leaves failures only in the logs"]
pub struct PendingWrite {
    handles: Vec<TaskHandle>,
    settled: usize,
}

impl PendingWrite {
    /// A write that already happened synchronously.
    pub fn settled(rows: usize) -> Self {
        Self {
            handles: Vec::new(),
            settled: rows,
        }
    }

    fn queued(handles: Vec<TaskHandle>) -> Self {
        Self {
            handles,
            settled: 0,
        }
    }

    /// Fold another pending write into this one.
    pub fn merge(&mut self, other: PendingWrite) {
        self.handles.extend(other.handles);
        self.settled += other.settled;
    }

    pub fn is_settled(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task and return the total number of rows changed.
    ///
    /// All tasks are waited for even after one fails; the first failure is
    /// returned.
    pub fn wait(self) -> Result<usize> {
        let mut rows = self.settled;
        let mut first_error = None;
        for handle in self.handles {
            match handle.wait() {
                Ok(n) => rows += n,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(rows),
        }
    }
}

/// A [`Store`] whose writes run on a background connection.
pub struct ConcurrentStore {
    reader: Store,
    proxy: WriteProxy,
}

impl ConcurrentStore {
    /// Open the caller's connection and start the write proxy on a second
    /// connection to the same file.
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let reader = Store::open(path.as_ref(), OpenMode::Create, options)?;
        let proxy = WriteProxy::spawn(path.as_ref(), options)?;
        Ok(Self { reader, proxy })
    }

    pub fn register_schema(&mut self, schema: EntitySchema) -> Result<()> {
        self.reader.register_schema(schema)
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        self.reader.schemas()
    }

    /// Create every registered table through the proxy and wait for it.
    pub fn initialize_schemas(&self) -> Result<()> {
        let ddl: Vec<String> = self
            .reader
            .schemas()
            .iter()
            .map(EntitySchema::create_table_statement)
            .collect();
        let created = self.proxy.execute_batch(ddl.join(";\n"));
        self.proxy.commit().wait()?;
        created.wait()?;
        debug!("Initialized {} tables through write proxy", ddl.len());
        Ok(())
    }

    /// Queue one insert followed by a commit.
    ///
    /// Missing required fields are reported right away; nothing is queued.
    pub fn insert(&self, record: &Record<'_>, policy: ConflictPolicy) -> Result<PendingWrite> {
        self.reader.ensure_registered(record.table_name())?;
        let statement = record.to_insert_statement_and_parameters(policy)?;
        Ok(PendingWrite::queued(vec![
            self.proxy.execute(statement),
            self.proxy.commit(),
        ]))
    }

    /// Queue one batched insert plus a commit per schema.
    pub fn insert_many(&self, records: &[Record<'_>], policy: ConflictPolicy) -> Result<PendingWrite> {
        let batches = partition(records)?;
        for batch in &batches {
            self.reader.ensure_registered(batch.schema.table_name())?;
        }

        let mut handles = Vec::with_capacity(batches.len() * 2);
        for batch in batches {
            handles.push(
                self.proxy
                    .execute_many(batch.schema.insert_statement(policy), batch.rows),
            );
            handles.push(self.proxy.commit());
        }
        Ok(PendingWrite::queued(handles))
    }

    pub fn add_beatmap(&self, beatmap: &Beatmap, policy: ConflictPolicy) -> Result<PendingWrite> {
        self.insert(beatmap.record(), policy)
    }

    pub fn add_beatmaps(&self, beatmaps: &[Beatmap], policy: ConflictPolicy) -> Result<PendingWrite> {
        let records: Vec<Record<'static>> = beatmaps.iter().map(|b| b.record().clone()).collect();
        self.insert_many(&records, policy)
    }

    /// Queue a marker for the beatmapset `descriptor` resolves to.
    pub fn flag_as_downloaded(
        &self,
        descriptor: impl Into<GroupDescriptor>,
        policy: ConflictPolicy,
    ) -> Result<(DownloadedMarker, PendingWrite)> {
        let marker = descriptor.into().to_marker()?;
        let pending = self.insert(&marker.to_record(), policy)?;
        Ok((marker, pending))
    }

    pub fn bulk_flag_as_downloaded<I>(
        &self,
        descriptors: I,
        policy: ConflictPolicy,
    ) -> Result<(Vec<DownloadedMarker>, PendingWrite)>
    where
        I: IntoIterator,
        I::Item: Into<GroupDescriptor>,
    {
        let markers = descriptors
            .into_iter()
            .map(|d| d.into().to_marker())
            .collect::<Result<Vec<_>>>()?;
        let records: Vec<Record<'static>> = markers.iter().map(DownloadedMarker::to_record).collect();
        let pending = self.insert_many(&records, policy)?;
        Ok((markers, pending))
    }

    /// Queue a commit of whatever the worker has written so far.
    pub fn commit(&self) -> TaskHandle {
        self.proxy.commit()
    }

    /// Wait until everything queued before this call is committed.
    pub fn flush(&self) -> Result<()> {
        self.proxy.commit().wait()?;
        Ok(())
    }

    /// Run `f` against the caller's connection, bypassing the queue.
    pub fn call_immediate<T>(&self, f: impl FnOnce(&Store) -> Result<T>) -> Result<T> {
        f(&self.reader)
    }

    pub fn select(&self, criteria: &Record<'_>) -> Result<Vec<Row>> {
        self.reader.select(criteria)
    }

    pub fn count(&self, table_name: &str) -> Result<u64> {
        self.reader.count(table_name)
    }

    pub fn get_all_beatmaps(&self) -> Result<Vec<Beatmap>> {
        self.reader.get_all_beatmaps()
    }

    pub fn get_beatmap(&self, beatmap_id: i64) -> Result<Option<Beatmap>> {
        self.reader.get_beatmap(beatmap_id)
    }

    pub fn get_downloaded_marker(
        &self,
        descriptor: impl Into<GroupDescriptor>,
    ) -> Result<Option<DownloadedMarker>> {
        self.reader.get_downloaded_marker(descriptor)
    }

    pub fn is_group_downloaded(&self, descriptor: impl Into<GroupDescriptor>) -> Result<bool> {
        self.reader.is_group_downloaded(descriptor)
    }

    pub fn get_all_downloaded_beatmapsets(&self) -> Result<Vec<DownloadedMarker>> {
        self.reader.get_all_downloaded_beatmapsets()
    }
}

impl Drop for ConcurrentStore {
    fn drop(&mut self) {
        // Queued writes must not be lost to the worker's rollback on close.
        if let Err(e) = self.flush() {
            warn!("Final commit of write proxy failed: {e}");
        }
    }
}
