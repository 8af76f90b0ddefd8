//! Core building blocks for the biogate device gateway.
//!
//! This crate holds everything the other gateway crates share:
//! - **Events** ([`event`]): the normalized domain events a biometric
//!   terminal produces (attendance punches, connectivity transitions,
//!   command completions).
//! - **Event bus** ([`bus`]): an in-process publish/subscribe hub with
//!   bounded per-subscriber backlogs and drop-oldest backpressure.
//! - **Errors** ([`error`]): the gateway-wide error taxonomy.
//! - **Configuration** ([`config`]): environment-driven settings, read
//!   once at startup.

pub mod bus;
pub mod config;
pub mod error;
pub mod event;

pub use bus::{EventBus, SubscriberId, Subscription};
pub use config::GatewayConfig;
pub use error::{GatewayError, IngestError, Result};
pub use event::{
    AttendanceEvent, CommandOutcome, CommandResult, ConnectionState, GatewayEvent, VerifyMethod,
};
