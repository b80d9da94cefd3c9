//! Dial service facade
//!
//! Entry points for the presentation layers. Each public method opens one
//! transaction scope, runs the storage and pipeline steps inside it and
//! commits. Any early return drops the scope, which rolls it back.

use crate::context::RequestContext;
use crate::db::{dials, history, memberships};
use crate::metrics::ServiceMetrics;
use crate::orchestrator::{refresh_dial_value, RefreshOutcome};
use crate::tx::Tx;
use sqlx::SqlitePool;
use std::ops::RangeInclusive;
use std::sync::Arc;
use wtf_common::config::TomlConfig;
use wtf_common::db::{
    Dial, DialFilter, DialMembership, DialMembershipFilter, DialUpdate, DialValue,
    DialValueFilter,
};
use wtf_common::{Clock, DialId, Error, EventPublisher, Result, SystemClock, UserId};

/// Longest accepted dial name, in characters
pub const MAX_DIAL_NAME_LEN: usize = 100;

/// Dial operations over a shared pool and event publisher
#[derive(Clone)]
pub struct DialService {
    pool: SqlitePool,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    value_range: RangeInclusive<i64>,
}

impl DialService {
    /// Create a service with the system clock, fresh metrics and the
    /// default 0..=100 membership value range
    pub fn new(pool: SqlitePool, publisher: Arc<dyn EventPublisher>) -> Self {
        let defaults = TomlConfig::default();
        Self {
            pool,
            publisher,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(ServiceMetrics::new()),
            value_range: defaults.min_membership_value..=defaults.max_membership_value,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_value_range(mut self, range: RangeInclusive<i64>) -> Self {
        self.value_range = range;
        self
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn begin(&self, caller: &'static str) -> Result<Tx> {
        Tx::begin(&self.pool, self.clock.as_ref(), caller).await
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let code = e.code();
            self.metrics.record_error(code);
            if code == wtf_common::ErrorCode::Internal {
                tracing::error!(error = %e, source = ?std::error::Error::source(e), "Dial operation failed");
            } else {
                tracing::debug!(error = %e, code = %code, "Dial operation rejected");
            }
        }
        result
    }

    /// Value given to new memberships: 0, pulled into the allowed range
    fn initial_value(&self) -> i64 {
        0i64.clamp(*self.value_range.start(), *self.value_range.end())
    }

    fn validate_value(&self, value: i64) -> Result<()> {
        if !self.value_range.contains(&value) {
            return Err(Error::InvalidInput(format!(
                "Membership value must be between {} and {}.",
                self.value_range.start(),
                self.value_range.end()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pipeline entry points
    // ------------------------------------------------------------------

    /// Set `user_id`'s value on a dial, then refresh the dial
    ///
    /// Creates the membership if it does not exist yet.
    pub async fn set_membership_value(
        &self,
        dial_id: DialId,
        user_id: UserId,
        value: i64,
    ) -> Result<DialMembership> {
        let result: Result<DialMembership> = async {
            self.validate_value(value)?;

            let mut tx = self.begin("set_membership_value").await?;
            require_dial(&mut tx, dial_id).await?;
            let membership = memberships::upsert_membership(&mut tx, dial_id, user_id, value).await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), dial_id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            Ok(membership)
        }
        .await;
        self.observe(result)
    }

    /// Remove a membership, then refresh the dial
    pub async fn delete_membership(&self, dial_id: DialId, user_id: UserId) -> Result<()> {
        let result: Result<()> = async {
            let mut tx = self.begin("delete_membership").await?;
            require_dial(&mut tx, dial_id).await?;
            memberships::delete_membership(&mut tx, dial_id, user_id).await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), dial_id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            Ok(())
        }
        .await;
        self.observe(result)
    }

    /// Re-sync a dial's value with its memberships
    ///
    /// A missing dial is reported as [`RefreshOutcome::NotFound`], not an
    /// error. Repeated calls without membership changes write nothing.
    pub async fn recompute_dial_value(&self, dial_id: DialId) -> Result<RefreshOutcome> {
        let result: Result<RefreshOutcome> = async {
            let mut tx = self.begin("recompute_dial_value").await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), dial_id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            Ok(outcome)
        }
        .await;
        self.observe(result)
    }

    // ------------------------------------------------------------------
    // Caller-scoped operations
    // ------------------------------------------------------------------

    /// Create a dial owned by the caller, who becomes its first member
    pub async fn create_dial(&self, ctx: &RequestContext, name: &str) -> Result<Dial> {
        let result: Result<Dial> = async {
            let user_id = ctx.require_user()?;
            validate_name(name)?;

            let initial_value = self.initial_value();

            let mut tx = self.begin("create_dial").await?;
            let dial = dials::create_dial(&mut tx, user_id, name).await?;
            memberships::insert_membership(&mut tx, dial.id, user_id, initial_value).await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), dial.id).await?;
            let dial = dials::get_dial(&mut tx, dial.id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            tracing::info!(dial_id = dial.id, user_id, "Dial created");
            Ok(dial)
        }
        .await;
        self.observe(result)
    }

    /// Find a dial the caller is a member of
    pub async fn find_dial_by_id(&self, ctx: &RequestContext, id: DialId) -> Result<Dial> {
        let result: Result<Dial> = async {
            let mut tx = self.begin("find_dial_by_id").await?;
            let dial = dials::find_dial_by_id(&mut tx, ctx.user_id(), id).await?;
            tx.commit().await?;
            Ok(dial)
        }
        .await;
        self.observe(result)
    }

    /// Find dials visible to the caller, plus the total matching count
    pub async fn find_dials(
        &self,
        ctx: &RequestContext,
        filter: &DialFilter,
    ) -> Result<(Vec<Dial>, i64)> {
        let result: Result<(Vec<Dial>, i64)> = async {
            let mut tx = self.begin("find_dials").await?;
            let found = dials::find_dials(&mut tx, ctx.user_id(), filter).await?;
            tx.commit().await?;
            Ok(found)
        }
        .await;
        self.observe(result)
    }

    /// Rename a dial; owner only
    pub async fn update_dial(
        &self,
        ctx: &RequestContext,
        id: DialId,
        upd: &DialUpdate,
    ) -> Result<Dial> {
        let result: Result<Dial> = async {
            let user_id = ctx.require_user()?;
            if let Some(name) = &upd.name {
                validate_name(name)?;
            }

            let mut tx = self.begin("update_dial").await?;
            let locked = require_dial(&mut tx, id).await?;
            if locked.user_id != user_id {
                return Err(Error::Unauthorized(
                    "You must be the owner to update this dial.".to_string(),
                ));
            }
            if let Some(name) = &upd.name {
                dials::update_dial_name(&mut tx, id, name).await?;
            }
            let dial = dials::get_dial(&mut tx, id).await?;
            tx.commit().await?;
            Ok(dial)
        }
        .await;
        self.observe(result)
    }

    /// Delete a dial with its memberships and history; owner only
    pub async fn delete_dial(&self, ctx: &RequestContext, id: DialId) -> Result<()> {
        let result: Result<()> = async {
            let user_id = ctx.require_user()?;

            let mut tx = self.begin("delete_dial").await?;
            let locked = require_dial(&mut tx, id).await?;
            if locked.user_id != user_id {
                return Err(Error::Unauthorized(
                    "You must be the owner to delete this dial.".to_string(),
                ));
            }
            dials::delete_dial(&mut tx, id).await?;
            tx.commit().await?;

            tracing::info!(dial_id = id, user_id, "Dial deleted");
            Ok(())
        }
        .await;
        self.observe(result)
    }

    /// Join the dial with `invite_code` as the caller
    pub async fn join_dial(
        &self,
        ctx: &RequestContext,
        invite_code: &str,
    ) -> Result<DialMembership> {
        let result: Result<DialMembership> = async {
            let user_id = ctx.require_user()?;
            let initial_value = self.initial_value();

            let mut tx = self.begin("join_dial").await?;
            let locked = dials::lock_dial_by_invite_code(&mut tx, invite_code)
                .await?
                .ok_or_else(|| Error::NotFound("Dial not found.".to_string()))?;
            let membership =
                memberships::insert_membership(&mut tx, locked.id, user_id, initial_value).await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), locked.id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            tracing::info!(dial_id = locked.id, user_id, "Joined dial");
            Ok(membership)
        }
        .await;
        self.observe(result)
    }

    /// Set the caller's value on a dial they already belong to
    pub async fn set_my_membership_value(
        &self,
        ctx: &RequestContext,
        dial_id: DialId,
        value: i64,
    ) -> Result<DialMembership> {
        let result: Result<DialMembership> = async {
            let user_id = ctx.require_user()?;
            self.validate_value(value)?;

            let mut tx = self.begin("set_my_membership_value").await?;
            require_dial(&mut tx, dial_id).await?;
            memberships::find_membership_by_id(&mut tx, dial_id, user_id).await?;
            let membership = memberships::upsert_membership(&mut tx, dial_id, user_id, value).await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), dial_id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            Ok(membership)
        }
        .await;
        self.observe(result)
    }

    /// Remove the caller from a dial; owners cannot leave their own dial
    pub async fn leave_dial(&self, ctx: &RequestContext, dial_id: DialId) -> Result<()> {
        let result: Result<()> = async {
            let user_id = ctx.require_user()?;

            let mut tx = self.begin("leave_dial").await?;
            let locked = require_dial(&mut tx, dial_id).await?;
            if locked.user_id == user_id {
                return Err(Error::InvalidInput(
                    "Dial owner cannot leave their own dial.".to_string(),
                ));
            }
            memberships::delete_membership(&mut tx, dial_id, user_id).await?;
            let outcome = refresh_dial_value(&mut tx, self.publisher.as_ref(), dial_id).await?;
            tx.commit().await?;

            self.metrics.record_refresh(&outcome);
            tracing::info!(dial_id, user_id, "Left dial");
            Ok(())
        }
        .await;
        self.observe(result)
    }

    /// Find a membership on a dial visible to the caller
    pub async fn find_membership_by_id(
        &self,
        ctx: &RequestContext,
        dial_id: DialId,
        user_id: UserId,
    ) -> Result<DialMembership> {
        let result: Result<DialMembership> = async {
            let mut tx = self.begin("find_membership_by_id").await?;
            dials::find_dial_by_id(&mut tx, ctx.user_id(), dial_id).await?;
            let membership = memberships::find_membership_by_id(&mut tx, dial_id, user_id).await?;
            tx.commit().await?;
            Ok(membership)
        }
        .await;
        self.observe(result)
    }

    /// List memberships visible to the caller
    ///
    /// With a dial id the caller must be a member of that dial; without one
    /// the listing is restricted to the caller's own memberships.
    pub async fn find_memberships(
        &self,
        ctx: &RequestContext,
        filter: &DialMembershipFilter,
    ) -> Result<(Vec<DialMembership>, i64)> {
        let result: Result<(Vec<DialMembership>, i64)> = async {
            let user_id = ctx.require_user()?;

            let mut tx = self.begin("find_memberships").await?;
            let mut filter = filter.clone();
            match filter.dial_id {
                Some(dial_id) => {
                    dials::find_dial_by_id(&mut tx, Some(user_id), dial_id).await?;
                }
                None => filter.user_id = Some(user_id),
            }
            let found = memberships::find_memberships(&mut tx, &filter).await?;
            tx.commit().await?;
            Ok(found)
        }
        .await;
        self.observe(result)
    }

    /// Value history of a dial visible to the caller
    pub async fn dial_history(
        &self,
        ctx: &RequestContext,
        dial_id: DialId,
        filter: &DialValueFilter,
    ) -> Result<Vec<DialValue>> {
        let result: Result<Vec<DialValue>> = async {
            let mut tx = self.begin("dial_history").await?;
            dials::find_dial_by_id(&mut tx, ctx.user_id(), dial_id).await?;
            let samples = history::find_samples(&mut tx, dial_id, filter).await?;
            tx.commit().await?;
            Ok(samples)
        }
        .await;
        self.observe(result)
    }
}

/// Lock a dial or fail with `NotFound`
async fn require_dial(tx: &mut Tx, dial_id: DialId) -> Result<dials::LockedDial> {
    dials::lock_dial(tx, dial_id)
        .await?
        .ok_or_else(|| Error::NotFound("Dial not found.".to_string()))
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Dial name required.".to_string()));
    }
    if name.chars().count() > MAX_DIAL_NAME_LEN {
        return Err(Error::InvalidInput("Dial name too long.".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Team mood").is_ok());
        assert!(matches!(validate_name(""), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_name("   "), Err(Error::InvalidInput(_))));
        assert!(validate_name(&"x".repeat(MAX_DIAL_NAME_LEN)).is_ok());
        assert!(matches!(
            validate_name(&"x".repeat(MAX_DIAL_NAME_LEN + 1)),
            Err(Error::InvalidInput(_))
        ));
    }
}
