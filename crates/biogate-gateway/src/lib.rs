//! Gateway facade for one biometric terminal.
//!
//! Composes the device link, command translator, event bus and health
//! monitor behind a single entry point: submit commands, ingest device
//! pushes, subscribe to live events, and read link status.

pub mod gateway;
pub mod ingest;

pub use gateway::{Gateway, LinkStatus};
pub use ingest::Ingestor;
