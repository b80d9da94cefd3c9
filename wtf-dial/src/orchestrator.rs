//! Dial value refresh
//!
//! Runs the recompute sequence inside the caller's transaction:
//!
//! ```text
//! Idle → ValueLoaded → Recomputed ─┬─ NoChange ──────────────────────────→ Done
//!                                  └─ Changed → Persisted → Notified ──→ Done
//! Idle → NotFound ─────────────────────────────────────────────────────→ Done
//! ```
//!
//! The dial row is write-locked when its value is loaded, so concurrent
//! refreshes of one dial serialize on the database lock and each sees the
//! value committed by the previous one.
//!
//! The caller commits. A storage error in any step is returned before the
//! caller can commit, so value and history stay unchanged together. Event
//! delivery is best effort and cannot fail the refresh.

use crate::aggregator;
use crate::db::{dials, history};
use crate::notifier::{self, Fanout};
use crate::tx::Tx;
use wtf_common::{DialId, EventPublisher, Result, WtfEvent};

/// Terminal state of one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Dial vanished before the refresh ran
    NotFound,
    /// Stored value already matched the memberships
    Unchanged { value: i64 },
    /// Value, history and notifications were updated
    Changed {
        old_value: i64,
        new_value: i64,
        notified: Fanout,
    },
}

impl RefreshOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, RefreshOutcome::Changed { .. })
    }
}

/// Recompute, persist, record and broadcast a dial's value
pub async fn refresh_dial_value(
    tx: &mut Tx,
    publisher: &dyn EventPublisher,
    dial_id: DialId,
) -> Result<RefreshOutcome> {
    // Load + recompute
    let Some(recompute) = aggregator::recompute(tx, dial_id).await? else {
        tracing::debug!(dial_id, "Dial not found during refresh, skipping");
        return Ok(RefreshOutcome::NotFound);
    };

    if !recompute.changed() {
        return Ok(RefreshOutcome::Unchanged {
            value: recompute.old_value,
        });
    }

    // Persist
    let new_value = recompute.new_value;
    dials::store_dial_value(tx, dial_id, new_value).await?;
    let now = tx.now();
    history::record_sample(tx, dial_id, new_value, now).await?;

    // Notify
    let notified = notifier::publish_dial_event(
        tx,
        publisher,
        dial_id,
        WtfEvent::DialValueChanged {
            dial_id,
            value: new_value,
        },
    )
    .await?;

    tracing::info!(
        dial_id,
        old_value = recompute.old_value,
        new_value,
        notified = notified.attempted,
        "Dial value changed"
    );

    Ok(RefreshOutcome::Changed {
        old_value: recompute.old_value,
        new_value,
        notified,
    })
}
