//! Member fan-out
//!
//! The member list is read into memory before anything is published, so no
//! statement is held open while the publisher runs.

use crate::db::memberships;
use crate::tx::Tx;
use wtf_common::events::PublishError;
use wtf_common::{DialId, EventPublisher, Result, WtfEvent};

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fanout {
    /// Publish calls made (one per member)
    pub attempted: usize,
    /// Calls the publisher reported as undelivered
    pub failed: usize,
}

/// Publish `event` once to every current member of `dial_id`
///
/// Publisher failures are logged and counted, never returned. Only reading
/// the member list can fail.
pub async fn publish_dial_event(
    tx: &mut Tx,
    publisher: &dyn EventPublisher,
    dial_id: DialId,
    event: WtfEvent,
) -> Result<Fanout> {
    let members = memberships::list_member_ids(tx, dial_id).await?;

    let mut fanout = Fanout::default();
    for user_id in members {
        fanout.attempted += 1;
        match publisher.publish_event(user_id, event.clone()) {
            Ok(()) => {}
            Err(PublishError::NoSubscribers(_)) => {
                // Member is not listening right now.
                fanout.failed += 1;
                tracing::trace!(dial_id, user_id, "No subscribers for member");
            }
            Err(e) => {
                fanout.failed += 1;
                tracing::warn!(dial_id, user_id, error = %e, "Event not delivered");
            }
        }
    }

    tracing::debug!(
        dial_id,
        event_type = event.event_type(),
        attempted = fanout.attempted,
        failed = fanout.failed,
        "Published dial event"
    );
    Ok(fanout)
}
