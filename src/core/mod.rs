//! Core types and traits for billgate
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{Config, Denomination, DenominationTable};

/// Default validator port
pub const DEFAULT_VALIDATOR_PORT: &str = "COM3";

/// Validator link baud rate
pub const VALIDATOR_BAUD: u32 = 9600;

/// Relay actuator baud rate
pub const ACTUATOR_BAUD: u32 = 115_200;
