// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Background writer owning a dedicated connection.
//!
//! Writes are queued on an unbounded channel and applied one at a time, in
//! submission order, by a single worker thread. The worker opens a
//! transaction before its first write and only a queued [`WriteOp::Commit`]
//! ends it. Every other task runs under its own savepoint, so a failing task
//! leaves nothing behind for the next commit to persist. Each queued task reports its outcome through a [`TaskHandle`];
//! dropping the handle makes the task fire-and-forget, in which case a
//! failure is only visible in the logs.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use rusqlite::Connection;
use tracing::{debug, error, trace};

use crate::connection::{OpenMode, StoreOptions, open_connection};
use crate::error::{Error, Result};
use crate::record::{Params, Statement};

/// A mutating operation for the worker connection.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// One statement with named parameters
    Execute(Statement),
    /// One statement run once per parameter set
    ExecuteMany { sql: String, rows: Vec<Params> },
    /// Several `;`-separated statements without parameters
    ExecuteBatch(String),
    /// Commit the worker's open transaction, if any
    Commit,
}

impl WriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::Execute(_) => "execute",
            WriteOp::ExecuteMany { .. } => "execute_many",
            WriteOp::ExecuteBatch(_) => "execute_batch",
            WriteOp::Commit => "commit",
        }
    }
}

struct Task {
    op: WriteOp,
    done: Sender<Result<usize>>,
}

/// Completion signal of one queued task.
#[derive(Debug)]
pub struct TaskHandle {
    operation: &'static str,
    done: Receiver<Result<usize>>,
}

impl TaskHandle {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Block until the worker has applied the task.
    ///
    /// Returns the number of rows changed, [`Error::WorkerTask`] when the
    /// task failed, or [`Error::WorkerGone`] when it never ran.
    pub fn wait(self) -> Result<usize> {
        self.done.recv().unwrap_or(Err(Error::WorkerGone))
    }

    /// The outcome if the task has already run.
    pub fn try_wait(&self) -> Option<Result<usize>> {
        match self.done.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerGone)),
        }
    }
}

/// Handle to the background writer.
///
/// Dropping the proxy closes the queue; the worker drains what is already
/// queued and exits. An uncommitted transaction is rolled back when its
/// connection closes.
pub struct WriteProxy {
    queue: Sender<Task>,
}

impl WriteProxy {
    /// Open a dedicated connection to `path` and start the worker on it.
    ///
    /// The worker thread is detached and never keeps the process alive.
    pub fn spawn<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let conn = open_connection(path.as_ref(), OpenMode::Create, options)?;
        let (queue, tasks) = mpsc::channel();

        thread::Builder::new()
            .name("write-proxy".into())
            .spawn(move || run_worker(conn, tasks))
            .map_err(Error::WorkerSpawn)?;

        debug!("Started write proxy for {}", path.as_ref().display());
        Ok(Self { queue })
    }

    /// Queue `op` without waiting for it to run.
    pub fn enqueue(&self, op: WriteOp) -> TaskHandle {
        let operation = op.name();
        let (done, done_rx) = mpsc::channel();
        if self.queue.send(Task { op, done }).is_err() {
            // The task (and its sender) came back with the error and is
            // dropped here, so `wait` reports WorkerGone.
            debug!("Write proxy worker is gone, dropping {operation}");
        }
        TaskHandle {
            operation,
            done: done_rx,
        }
    }

    pub fn execute(&self, statement: Statement) -> TaskHandle {
        self.enqueue(WriteOp::Execute(statement))
    }

    pub fn execute_many(&self, sql: String, rows: Vec<Params>) -> TaskHandle {
        self.enqueue(WriteOp::ExecuteMany { sql, rows })
    }

    pub fn execute_batch(&self, sql: String) -> TaskHandle {
        self.enqueue(WriteOp::ExecuteBatch(sql))
    }

    pub fn commit(&self) -> TaskHandle {
        self.enqueue(WriteOp::Commit)
    }
}

fn run_worker(conn: Connection, tasks: Receiver<Task>) {
    trace!("Write proxy worker running");
    while let Ok(task) = tasks.recv() {
        let operation = task.op.name();
        let result = apply(&conn, task.op).map_err(|e| {
            error!("Queued {operation} failed: {e}");
            Error::WorkerTask {
                operation: operation.to_owned(),
                source: Box::new(e),
            }
        });
        // Nobody waiting is fine: the task was fire-and-forget.
        let _ = task.done.send(result);
    }
    if !conn.is_autocommit() {
        debug!("Write proxy closing with uncommitted changes, rolling back");
    }
    trace!("Write proxy worker stopped");
}

fn apply(conn: &Connection, op: WriteOp) -> Result<usize> {
    if matches!(op, WriteOp::Commit) {
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        return Ok(0);
    }

    // Each task is all-or-nothing inside the worker's open transaction.
    begin_if_needed(conn)?;
    conn.execute_batch("SAVEPOINT task")?;
    match apply_write(conn, op) {
        Ok(rows) => {
            conn.execute_batch("RELEASE task")?;
            Ok(rows)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK TO task; RELEASE task") {
                error!("Failed to roll back failed task: {rollback}");
            }
            Err(e)
        }
    }
}

fn apply_write(conn: &Connection, op: WriteOp) -> Result<usize> {
    match op {
        WriteOp::Execute(statement) => {
            let rows = statement
                .params
                .with_named(|named| conn.execute(&statement.sql, named))?;
            Ok(rows)
        }
        WriteOp::ExecuteMany { sql, rows } => {
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut changed = 0;
            for params in &rows {
                changed += params.with_named(|named| stmt.execute(named))?;
            }
            Ok(changed)
        }
        WriteOp::ExecuteBatch(sql) => {
            conn.execute_batch(&sql)?;
            Ok(0)
        }
        WriteOp::Commit => Ok(0),
    }
}

fn begin_if_needed(conn: &Connection) -> Result<()> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::value::Value;

    #[test]
    fn test_tasks_report_outcome() {
        let dir = TempDir::new().unwrap();
        let proxy = WriteProxy::spawn(dir.path().join("db.sqlite"), StoreOptions::default()).unwrap();

        proxy
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)".into())
            .wait()
            .unwrap();
        let ok = proxy.execute(Statement {
            sql: "INSERT INTO t (id) VALUES (1)".into(),
            params: Params::default(),
        });
        let duplicate = proxy.execute(Statement {
            sql: "INSERT INTO t (id) VALUES (1)".into(),
            params: Params::default(),
        });

        assert_eq!(ok.wait().unwrap(), 1);
        let err = duplicate.wait().unwrap_err();
        assert!(matches!(err, Error::WorkerTask { .. }));
        assert!(err.is_constraint_violation());
        // The failure does not poison later tasks.
        proxy.commit().wait().unwrap();
    }

    #[test]
    fn test_failed_task_leaves_no_rows_behind() {
        let dir = TempDir::new().unwrap();
        let proxy = WriteProxy::spawn(dir.path().join("db.sqlite"), StoreOptions::default()).unwrap();
        proxy
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (3)".into())
            .wait()
            .unwrap();

        let rows: Vec<Params> = (1..=4)
            .map(|id| {
                [(String::from("id"), Value::Integer(id))]
                    .into_iter()
                    .collect::<Params>()
            })
            .collect();
        let failed = proxy.execute_many("INSERT INTO t (id) VALUES (:id)".into(), rows);
        assert!(failed.wait().unwrap_err().is_constraint_violation());
        proxy.commit().wait().unwrap();

        let conn = Connection::open(dir.path().join("db.sqlite")).unwrap();
        let ids: Vec<i64> = conn
            .prepare("SELECT id FROM t ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(ids, [3]);
    }

    #[test]
    fn test_try_wait_eventually_completes() {
        let dir = TempDir::new().unwrap();
        let proxy = WriteProxy::spawn(dir.path().join("db.sqlite"), StoreOptions::default()).unwrap();
        let handle = proxy.commit();
        let outcome = loop {
            if let Some(outcome) = handle.try_wait() {
                break outcome;
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(outcome.unwrap(), 0);
    }
}
