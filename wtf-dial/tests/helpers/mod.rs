//! Shared fixtures for wtf-dial integration tests
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wtf_common::db::init_database;
use wtf_common::events::PublishError;
use wtf_common::{DialId, EventPublisher, FixedClock, UserId, WtfEvent};
use wtf_dial::{DialService, RequestContext};

/// Publisher that remembers every event it was handed
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(UserId, WtfEvent)>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<(UserId, WtfEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn recipients(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.events().into_iter().map(|(u, _)| u).collect();
        users.sort_unstable();
        users
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish_event(&self, user_id: UserId, event: WtfEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push((user_id, event));
        Ok(())
    }
}

/// Publisher whose transport is always down
pub struct FailingPublisher;

impl EventPublisher for FailingPublisher {
    fn publish_event(&self, _user_id: UserId, _event: WtfEvent) -> Result<(), PublishError> {
        Err(PublishError::Delivery("connection refused".to_string()))
    }
}

/// Service over a temporary database with a fixed clock
pub struct Harness {
    pub service: DialService,
    pub pool: SqlitePool,
    pub clock: Arc<FixedClock>,
    _dir: TempDir,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 10).unwrap()
}

impl Harness {
    pub async fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let pool = init_database(&dir.path().join("wtf.db"))
            .await
            .expect("database init");
        let clock = Arc::new(FixedClock::new(start_time()));
        let service = DialService::new(pool.clone(), publisher).with_clock(clock.clone());
        Self {
            service,
            pool,
            clock,
            _dir: dir,
        }
    }

    pub async fn with_recorder() -> (Self, Arc<RecordingPublisher>) {
        let recorder = Arc::new(RecordingPublisher::default());
        let harness = Self::new(recorder.clone()).await;
        (harness, recorder)
    }

    /// Create a dial owned by `owner`
    pub async fn dial(&self, owner: UserId, name: &str) -> DialId {
        self.service
            .create_dial(&RequestContext::for_user(owner), name)
            .await
            .expect("create dial")
            .id
    }

    pub async fn stored_value(&self, dial_id: DialId) -> i64 {
        sqlx::query_scalar("SELECT value FROM dials WHERE id = ?")
            .bind(dial_id)
            .fetch_one(&self.pool)
            .await
            .expect("dial row")
    }

    pub async fn samples(&self, dial_id: DialId) -> Vec<(DateTime<Utc>, i64)> {
        sqlx::query_as(r#"SELECT "timestamp", value FROM dial_values WHERE dial_id = ? ORDER BY "timestamp""#)
            .bind(dial_id)
            .fetch_all(&self.pool)
            .await
            .expect("history rows")
    }

    pub async fn member_values(&self, dial_id: DialId) -> Vec<i64> {
        sqlx::query_scalar("SELECT value FROM dial_memberships WHERE dial_id = ?")
            .bind(dial_id)
            .fetch_all(&self.pool)
            .await
            .expect("membership rows")
    }
}
