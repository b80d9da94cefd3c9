//! wtf-dial library - shared dial tracking service
//!
//! Users create dials, other users join them and set a personal value, and
//! each dial's value is the rounded mean of its members' values. Every
//! change to a dial's value is stored, sampled into per-minute history and
//! broadcast to the dial's members, all inside one transaction.
//!
//! Layering, leaf to root:
//! - [`db`]: membership, dial and history storage
//! - [`aggregator`]: recompute a dial's value
//! - [`notifier`]: fan an event out to members
//! - [`orchestrator`]: the transactional refresh sequence
//! - [`service`]: [`DialService`], the entry point for callers

pub mod aggregator;
pub mod context;
pub mod db;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod pagination;
pub mod service;
pub mod tx;

pub use context::RequestContext;
pub use metrics::{MetricsSnapshot, ServiceMetrics};
pub use orchestrator::RefreshOutcome;
pub use service::DialService;
