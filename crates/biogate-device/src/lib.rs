//! Device-side plumbing for the biogate gateway.
//!
//! Three concerns live here:
//! - [`link`]: the persistent TCP connection to one biometric terminal,
//!   with explicit connection state and bounded request/response
//!   exchanges.
//! - [`protocol`]: translation between typed commands (enroll, delete,
//!   sync time) and newline-framed JSON wire payloads, plus response
//!   parsing.
//! - [`health`]: the periodic reachability probe that drives
//!   connectivity transitions.

pub mod health;
pub mod link;
pub mod protocol;

pub use health::{HealthMonitor, ProbeAction, ProbeTracker};
pub use link::{DeviceEndpoint, DeviceLink};
pub use protocol::{EnrollCommand, WireCommand};
