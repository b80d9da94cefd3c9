//! Transactional scope for dial operations
//!
//! A [`Tx`] pairs a SQLite transaction with a logical timestamp sampled once
//! at `begin`. Every row written inside the scope uses that timestamp.
//!
//! Dropping a `Tx` without committing rolls the transaction back, which is
//! also what happens when the future driving it is cancelled.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;
use wtf_common::error::StorageContext;
use wtf_common::{Clock, Result};

/// Open transaction plus its logical timestamp
pub struct Tx {
    inner: Transaction<'static, Sqlite>,
    now: DateTime<Utc>,
    caller: &'static str,
    acquired_at: Instant,
}

impl Tx {
    /// Begin a transaction, logging pool wait time
    pub async fn begin(pool: &SqlitePool, clock: &dyn Clock, caller: &'static str) -> Result<Self> {
        let start = Instant::now();

        tracing::debug!(caller, "Connection acquisition requested");

        let inner = pool.begin().await.query_context("begin transaction")?;

        let wait_ms = start.elapsed().as_millis();
        if wait_ms > 1000 {
            tracing::warn!(
                caller,
                wait_ms,
                "SLOW CONNECTION ACQUISITION - Pool may be saturated"
            );
        } else {
            tracing::debug!(caller, wait_ms, "Connection acquired");
        }

        Ok(Self {
            inner,
            now: clock.now(),
            caller,
            acquired_at: Instant::now(),
        })
    }

    /// Logical timestamp of this scope
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Connection to run statements on
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.inner
    }

    /// Commit the transaction and log how long it was held
    pub async fn commit(self) -> Result<()> {
        let held_ms = self.acquired_at.elapsed().as_millis();
        self.inner.commit().await.query_context("commit")?;

        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                "LONG TRANSACTION - Dial row lock held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, "Transaction committed");
        }
        Ok(())
    }
}
