// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LotError, LotResult};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::thread;
use std::time::Duration;

pub const DEFAULT_ATTEMPTS: u32 = 4;
const BACKOFF_STEP_MS: u64 = 25;

/// Run a unit of work inside a single IMMEDIATE transaction with bounded
/// retry. The closure re-runs from scratch after a storage-level conflict
/// (busy/locked or a uniqueness race), so its guards are re-evaluated on
/// every attempt; a failed attempt leaves no visible writes. Business
/// errors abort immediately. Exhausted retries surface as
/// `TransientConflict`, never as success or a business rejection.
pub fn run<T>(
    conn: &mut Connection,
    f: impl FnMut(&Transaction) -> LotResult<T>,
) -> LotResult<T> {
    run_with(conn, DEFAULT_ATTEMPTS, f)
}

pub fn run_with<T>(
    conn: &mut Connection,
    max_attempts: u32,
    mut f: impl FnMut(&Transaction) -> LotResult<T>,
) -> LotResult<T> {
    assert!(max_attempts > 0);
    for attempt in 1..=max_attempts {
        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(e) if is_retryable(&e) => {
                backoff(attempt);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match f(&tx) {
            Ok(value) => match tx.commit() {
                Ok(()) => return Ok(value),
                Err(e) if is_retryable(&e) => {
                    backoff(attempt);
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
            Err(LotError::Storage(e)) if is_retryable(&e) => {
                // Transaction rolls back on drop.
                drop(tx);
                backoff(attempt);
                continue;
            }
            Err(other) => return Err(other),
        }
    }
    Err(LotError::TransientConflict {
        attempts: max_attempts,
    })
}

/// Busy/locked contention and uniqueness races re-run the whole unit of
/// work; the rerun's guard queries then see the winning row and turn the
/// race into the proper business rejection.
fn is_retryable(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => matches!(
            err.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::ConstraintViolation
        ),
        _ => false,
    }
}

fn backoff(attempt: u32) {
    thread::sleep(Duration::from_millis(BACKOFF_STEP_MS * u64::from(attempt)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT NOT NULL UNIQUE);")
            .unwrap();
        conn
    }

    #[test]
    fn commits_on_success() {
        let mut conn = mem();
        let id = run(&mut conn, |tx| {
            tx.execute("INSERT INTO t(v) VALUES ('a')", [])?;
            Ok(tx.last_insert_rowid())
        })
        .unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!((id, n), (1, 1));
    }

    #[test]
    fn business_error_rolls_back() {
        let mut conn = mem();
        let err = run(&mut conn, |tx| -> LotResult<()> {
            tx.execute("INSERT INTO t(v) VALUES ('a')", [])?;
            Err(LotError::Validation("nope".into()))
        })
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn constraint_race_retries_then_surfaces_guard_error() {
        let mut conn = mem();
        conn.execute("INSERT INTO t(v) VALUES ('taken')", []).unwrap();
        let mut attempts = 0;
        let err = run(&mut conn, |tx| -> LotResult<()> {
            attempts += 1;
            if attempts > 1 {
                // Rerun guard sees the winner.
                return Err(LotError::Validation("already there".into()));
            }
            tx.execute("INSERT INTO t(v) VALUES ('taken')", [])?;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(attempts, 2);
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn exhaustion_is_transient_conflict() {
        let mut conn = mem();
        conn.execute("INSERT INTO t(v) VALUES ('taken')", []).unwrap();
        let err = run_with(&mut conn, 3, |tx| -> LotResult<()> {
            tx.execute("INSERT INTO t(v) VALUES ('taken')", [])?;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.code(), "TRANSIENT_CONFLICT");
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 1);
    }
}
