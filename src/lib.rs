//! billgate: bill validator session controller
//!
//! This library drives a bill validator over a serial link with a byte-level
//! escrow handshake, accumulates accepted bills into a payment session, and
//! signals a relay to unlock the service once the target amount is paid.
//! Idle sessions time out and relock; an operator can reset at any time.
pub mod core;

pub mod actuator;
pub mod app;
pub mod control;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export commonly used items
pub use crate::core::{Config, Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
