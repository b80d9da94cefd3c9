//! Service counters
//!
//! One [`ServiceMetrics`] is created at startup and shared by `Arc` with
//! whatever needs it. There is no global instance.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use wtf_common::ErrorCode;

use crate::orchestrator::RefreshOutcome;

/// Process-wide counters for the dial pipeline
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    refreshes_total: AtomicU64,
    refreshes_changed: AtomicU64,
    refreshes_unchanged: AtomicU64,
    refreshes_not_found: AtomicU64,
    events_published: AtomicU64,
    events_undelivered: AtomicU64,
    errors_not_found: AtomicU64,
    errors_invalid: AtomicU64,
    errors_conflict: AtomicU64,
    errors_unauthorized: AtomicU64,
    errors_internal: AtomicU64,
}

/// Point-in-time copy of [`ServiceMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub refreshes_total: u64,
    pub refreshes_changed: u64,
    pub refreshes_unchanged: u64,
    pub refreshes_not_found: u64,
    pub events_published: u64,
    pub events_undelivered: u64,
    pub errors_not_found: u64,
    pub errors_invalid: u64,
    pub errors_conflict: u64,
    pub errors_unauthorized: u64,
    pub errors_internal: u64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a completed refresh
    pub fn record_refresh(&self, outcome: &RefreshOutcome) {
        self.refreshes_total.fetch_add(1, Ordering::Relaxed);
        match outcome {
            RefreshOutcome::NotFound => {
                self.refreshes_not_found.fetch_add(1, Ordering::Relaxed);
            }
            RefreshOutcome::Unchanged { .. } => {
                self.refreshes_unchanged.fetch_add(1, Ordering::Relaxed);
            }
            RefreshOutcome::Changed { notified, .. } => {
                self.refreshes_changed.fetch_add(1, Ordering::Relaxed);
                self.events_published
                    .fetch_add(notified.attempted as u64, Ordering::Relaxed);
                self.events_undelivered
                    .fetch_add(notified.failed as u64, Ordering::Relaxed);
            }
        }
    }

    /// Count a failed service call by classification
    pub fn record_error(&self, code: ErrorCode) {
        let counter = match code {
            ErrorCode::NotFound => &self.errors_not_found,
            ErrorCode::Invalid => &self.errors_invalid,
            ErrorCode::Conflict => &self.errors_conflict,
            ErrorCode::Unauthorized => &self.errors_unauthorized,
            ErrorCode::Internal => &self.errors_internal,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refreshes_total: self.refreshes_total.load(Ordering::Relaxed),
            refreshes_changed: self.refreshes_changed.load(Ordering::Relaxed),
            refreshes_unchanged: self.refreshes_unchanged.load(Ordering::Relaxed),
            refreshes_not_found: self.refreshes_not_found.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_undelivered: self.events_undelivered.load(Ordering::Relaxed),
            errors_not_found: self.errors_not_found.load(Ordering::Relaxed),
            errors_invalid: self.errors_invalid.load(Ordering::Relaxed),
            errors_conflict: self.errors_conflict.load(Ordering::Relaxed),
            errors_unauthorized: self.errors_unauthorized.load(Ordering::Relaxed),
            errors_internal: self.errors_internal.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.refreshes_total,
            &self.refreshes_changed,
            &self.refreshes_unchanged,
            &self.refreshes_not_found,
            &self.events_published,
            &self.events_undelivered,
            &self.errors_not_found,
            &self.errors_invalid,
            &self.errors_conflict,
            &self.errors_unauthorized,
            &self.errors_internal,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Fanout;

    #[test]
    fn test_refresh_counters() {
        let metrics = ServiceMetrics::new();
        metrics.record_refresh(&RefreshOutcome::NotFound);
        metrics.record_refresh(&RefreshOutcome::Unchanged { value: 3 });
        metrics.record_refresh(&RefreshOutcome::Changed {
            old_value: 0,
            new_value: 3,
            notified: Fanout { attempted: 4, failed: 1 },
        });

        let snap = metrics.snapshot();
        assert_eq!(snap.refreshes_total, 3);
        assert_eq!(snap.refreshes_not_found, 1);
        assert_eq!(snap.refreshes_unchanged, 1);
        assert_eq!(snap.refreshes_changed, 1);
        assert_eq!(snap.events_published, 4);
        assert_eq!(snap.events_undelivered, 1);
    }

    #[test]
    fn test_error_counters_and_reset() {
        let metrics = ServiceMetrics::new();
        metrics.record_error(ErrorCode::Invalid);
        metrics.record_error(ErrorCode::Invalid);
        metrics.record_error(ErrorCode::Internal);

        let snap = metrics.snapshot();
        assert_eq!(snap.errors_invalid, 2);
        assert_eq!(snap.errors_internal, 1);
        assert_eq!(snap.errors_conflict, 0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
