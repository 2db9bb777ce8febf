//! Certwatch - certification watchlist and change-monitoring service
//!
//! Watches externally certified payment-terminal model records, detects when
//! their authoritative attributes change or disappear, and reports changes
//! through an outbound webhook.
//!
//! ## Services
//!
//! - **Resolver**: turns short text commands plus registry lookups into
//!   replies, with two-step confirmation via pending-action tokens
//! - **Store**: durable, insertion-ordered watchlist with atomic persistence
//! - **Monitor**: periodic re-query, field-level diffing and notification
//! - **Server**: hyper HTTP surface for commands, callbacks and probes

pub mod config;
pub mod lookup;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod pending;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CertwatchError, Result};
