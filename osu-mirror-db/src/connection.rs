// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::catalog;
use crate::error::{Error, Result};
use crate::schema::{EntitySchema, SchemaRegistry};

/// Database open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access
    ReadOnly,
    /// Read-write access to an existing database
    ReadWrite,
    /// Create new database if it doesn't exist
    Create,
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a connection waits on a lock held by another connection
    pub busy_timeout: Duration,
    /// Enforce `FOREIGN KEY` clauses. Off by default, like SQLite itself:
    /// the downloaded marker references a non-unique beatmap column.
    pub foreign_keys: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            foreign_keys: false,
        }
    }
}

/// SQLite-backed store for catalog records.
///
/// A freshly opened store knows the catalog schemas (beatmaps and
/// downloaded beatmapsets); more can be added with [`Store::register_schema`].
pub struct Store {
    pub(crate) conn: Connection,
    pub(crate) registry: SchemaRegistry,
}

impl Store {
    /// Open or create a database at a custom path.
    ///
    /// Tables are not created until [`Store::initialize_schemas`] runs.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, options: StoreOptions) -> Result<Self> {
        let conn = open_connection(path.as_ref(), mode, options)?;
        debug!("Opened database at {} ({:?})", path.as_ref().display(), mode);
        Ok(Self {
            conn,
            registry: catalog::registry(),
        })
    }

    /// Create an in-memory database (for testing).
    ///
    /// The catalog tables are created right away.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            registry: catalog::registry(),
        };
        store.initialize_schemas()?;
        debug!("Created in-memory database");
        Ok(store)
    }

    /// Make `schema` known to this store. Call [`Store::initialize_schemas`]
    /// afterwards to create its table.
    pub fn register_schema(&mut self, schema: EntitySchema) -> Result<()> {
        self.registry.register(schema)
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Create every registered table that does not exist yet.
    pub fn initialize_schemas(&self) -> Result<()> {
        for schema in self.registry.iter() {
            self.conn.execute(&schema.create_table_statement(), [])?;
            debug!("Initialized table {}", schema.table_name());
        }
        Ok(())
    }

    /// Check whether a table exists in the database.
    pub fn has_table(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get raw connection (for advanced usage).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn ensure_registered(&self, table_name: &str) -> Result<()> {
        match self.registry.get(table_name) {
            Some(_) => Ok(()),
            None => Err(Error::UnknownTable(table_name.to_owned())),
        }
    }
}

/// Open a connection with the flags for `mode` and apply `options`.
pub(crate) fn open_connection(path: &Path, mode: OpenMode, options: StoreOptions) -> Result<Connection> {
    let flags = match mode {
        OpenMode::ReadOnly => {
            if !path.exists() {
                return Err(Error::DatabaseNotFound(path.to_owned()));
            }
            OpenFlags::SQLITE_OPEN_READ_ONLY
        }
        OpenMode::ReadWrite => {
            if !path.exists() {
                return Err(Error::DatabaseNotFound(path.to_owned()));
            }
            OpenFlags::SQLITE_OPEN_READ_WRITE
        }
        OpenMode::Create => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    };

    let conn = Connection::open_with_flags(path, flags).map_err(|e| Error::DatabaseOpen {
        path: path.to_owned(),
        source: e,
    })?;
    conn.busy_timeout(options.busy_timeout)?;

    if mode != OpenMode::ReadOnly {
        configure_pragmas(&conn, options)?;
    }
    Ok(conn)
}

/// WAL lets the write proxy's connection and the caller's connection work
/// on the same file side by side.
fn configure_pragmas(conn: &Connection, options: StoreOptions) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        "#,
    )?;
    conn.pragma_update(None, "foreign_keys", options.foreign_keys)?;
    Ok(())
}
