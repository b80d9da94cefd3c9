//! Database models

use crate::{DialId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shared dial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dial {
    pub id: DialId,
    /// Owner
    pub user_id: UserId,
    pub name: String,
    /// Rounded mean of current membership values
    pub value: i64,
    /// Opaque join-by-link code
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a dial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DialMembership {
    pub dial_id: DialId,
    pub user_id: UserId,
    pub value: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One history sample: the dial's value within a minute bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DialValue {
    pub dial_id: DialId,
    pub timestamp: DateTime<Utc>,
    pub value: i64,
}

/// Dial search filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialFilter {
    pub id: Option<DialId>,
    /// When set, bypasses membership scoping
    pub invite_code: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Fields that may change on an existing dial
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialUpdate {
    pub name: Option<String>,
}

/// Membership search filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialMembershipFilter {
    pub dial_id: Option<DialId>,
    pub user_id: Option<UserId>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// History search filter (bounds are inclusive)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialValueFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}
