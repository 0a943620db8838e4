// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Error types for catalog database operations.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for catalog database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during catalog database operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Primary key, unique, not-null or foreign key constraint rejected a write
    #[error("Constraint violation: {source}")]
    ConstraintViolation {
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to open database with context
    #[error("Failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Database file not found
    #[error("Database not found at: {0}")]
    DatabaseNotFound(PathBuf),

    /// A not-null field without default was absent from the record
    #[error("'{field}' is required by table '{table}' but not found in data")]
    MissingRequiredField { table: String, field: String },

    /// Schema definition or registration is inconsistent
    #[error("Invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    /// Record belongs to a table the store does not know about
    #[error("Table '{0}' is not registered with this store")]
    UnknownTable(String),

    /// Descriptor mapping carries no beatmapset id
    #[error("Descriptor has no beatmapset_id")]
    MissingGroupId,

    /// Descriptor value cannot be read as a beatmapset id
    #[error("Invalid beatmapset id: {0}")]
    InvalidGroupId(String),

    /// A task queued on the write proxy failed inside the worker
    #[error("Queued '{operation}' failed: {source}")]
    WorkerTask {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    /// The write proxy worker thread could not be started
    #[error("Failed to spawn write proxy worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The write proxy worker has exited and accepts no more tasks
    #[error("Write proxy worker is no longer running")]
    WorkerGone,
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::ConstraintViolation { source: e },
            _ => Self::Sqlite(e),
        }
    }
}

impl Error {
    /// Whether this error is (or wraps) a store-level constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::ConstraintViolation { .. } => true,
            Self::WorkerTask { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }

    pub(crate) fn invalid_schema(table: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            table: table.to_owned(),
            reason: reason.into(),
        }
    }
}
