//! Caller identity

use wtf_common::{Error, Result, UserId};

/// Identity of the caller for one request
///
/// Only list scoping and owner checks consult it; the aggregation pipeline
/// itself is identity-agnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    user_id: Option<UserId>,
}

impl RequestContext {
    /// Context for an authenticated user
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Context with no known user
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// Acting user, if any
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Acting user, or `Unauthorized`
    pub fn require_user(&self) -> Result<UserId> {
        self.user_id
            .ok_or_else(|| Error::Unauthorized("You must be logged in.".to_string()))
    }
}
