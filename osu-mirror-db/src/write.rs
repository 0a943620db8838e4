// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Write operations for the catalog database.

use tracing::debug;

use crate::connection::Store;
use crate::error::Result;
use crate::record::{Params, Record};
use crate::schema::{ConflictPolicy, EntitySchema};

/// One committed batch of `insert_many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub table: String,
    pub rows: usize,
}

/// Records of one schema prepared for a single batched write.
pub(crate) struct Batch<'s> {
    pub(crate) schema: &'s EntitySchema,
    pub(crate) rows: Vec<Params>,
}

/// Split `records` by schema, keeping first-seen schema order and the
/// relative order of records within each schema.
///
/// Every record's parameters are built before anything is written, so a
/// missing required field aborts the whole call without touching the store.
pub(crate) fn partition<'s>(records: &[Record<'s>]) -> Result<Vec<Batch<'s>>> {
    let mut batches: Vec<Batch<'s>> = Vec::new();
    for record in records {
        let params = record.to_insert_parameters()?;
        match batches
            .iter_mut()
            .find(|b| b.schema.table_name() == record.table_name())
        {
            Some(batch) => batch.rows.push(params),
            None => batches.push(Batch {
                schema: record.schema(),
                rows: vec![params],
            }),
        }
    }
    Ok(batches)
}

impl Store {
    /// Insert one record and commit.
    pub fn insert(&self, record: &Record<'_>, policy: ConflictPolicy) -> Result<usize> {
        self.ensure_registered(record.table_name())?;
        let statement = record.to_insert_statement_and_parameters(policy)?;
        let rows = statement
            .params
            .with_named(|named| self.conn.execute(&statement.sql, named))?;
        Ok(rows)
    }

    /// Insert many records, one transaction per schema.
    ///
    /// A failing batch is rolled back on its own; batches committed before
    /// it stay committed.
    pub fn insert_many(
        &mut self,
        records: &[Record<'_>],
        policy: ConflictPolicy,
    ) -> Result<Vec<BatchSummary>> {
        let batches = partition(records)?;
        for batch in &batches {
            self.ensure_registered(batch.schema.table_name())?;
        }

        let mut summaries = Vec::with_capacity(batches.len());
        for batch in batches {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(&batch.schema.insert_statement(policy))?;
                for params in &batch.rows {
                    params.with_named(|named| stmt.execute(named))?;
                }
            }
            tx.commit()?;

            debug!(
                "Committed {} row(s) into {}",
                batch.rows.len(),
                batch.schema.table_name()
            );
            summaries.push(BatchSummary {
                table: batch.schema.table_name().to_owned(),
                rows: batch.rows.len(),
            });
        }
        Ok(summaries)
    }
}
