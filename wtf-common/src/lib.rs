//! # WTF Common Library
//!
//! Shared code for the WTF Dial service and its tools:
//! - Error taxonomy with stable classification codes
//! - Event types (WtfEvent enum) and the per-user EventBus
//! - Logical clock and history bucketing
//! - Bootstrap configuration loading
//! - Database initialization and row models

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, ErrorCode, Result};
pub use events::{EventBus, EventPublisher, WtfEvent};
pub use time::{Clock, FixedClock, SystemClock};

/// Dial identifier (server-assigned, `dials.id`)
pub type DialId = i64;

/// User identifier
pub type UserId = i64;
