//! Database access layer for wtf-dial
//!
//! Every function runs inside a caller-supplied [`Tx`](crate::tx::Tx); none
//! of them opens, commits or rolls back a transaction.

pub mod dials;
pub mod history;
pub mod memberships;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::tx::Tx;
    use chrono::TimeZone;
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wtf_common::db::init_database;
    use wtf_common::FixedClock;

    /// File-backed database in a temporary directory
    pub struct TestDb {
        pub pool: SqlitePool,
        pub clock: Arc<FixedClock>,
        _dir: TempDir,
    }

    impl TestDb {
        pub async fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let pool = init_database(&dir.path().join("wtf.db"))
                .await
                .expect("database init");
            let clock = Arc::new(FixedClock::new(
                chrono::Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            ));
            Self {
                pool,
                clock,
                _dir: dir,
            }
        }

        pub async fn begin(&self) -> Tx {
            Tx::begin(&self.pool, self.clock.as_ref(), "test")
                .await
                .expect("begin")
        }
    }
}
