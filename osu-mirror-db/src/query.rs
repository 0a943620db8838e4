// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Read query operations for the catalog database.

use rusqlite::Connection;

use crate::connection::Store;
use crate::error::Result;
use crate::record::{Params, Record};
use crate::value::Value;

/// A result row: column names and values in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<(String, Value)>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Value)> {
        self.0
    }
}

impl PartialEq<Params> for Row {
    fn eq(&self, other: &Params) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

/// Run `sql` with named `params` and collect every row.
pub(crate) fn query_rows(conn: &Connection, sql: &str, params: &Params) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();

    params.with_named(|named| {
        let mut rows = stmt.query(named)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                values.push((column.clone(), Value::from(row.get_ref(i)?)));
            }
            out.push(Row(values));
        }
        Ok(out)
    })
}

impl Store {
    /// All rows equal to `criteria` on every field it carries.
    ///
    /// Returns an empty vector when nothing matches.
    pub fn select(&self, criteria: &Record<'_>) -> Result<Vec<Row>> {
        self.ensure_registered(criteria.table_name())?;
        let statement = criteria.to_select_statement();
        query_rows(&self.conn, &statement.sql, &statement.params)
    }

    /// Count rows in a registered table.
    pub fn count(&self, table_name: &str) -> Result<u64> {
        self.ensure_registered(table_name)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            crate::field::quote_ident(table_name)
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
