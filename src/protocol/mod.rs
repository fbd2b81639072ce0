//! Protocol implementation module
//!
//! This module defines the validator handshake bytes, frame decoding and
//! response encoding, and the validator state machine.

pub mod codec;
pub mod state;

pub use self::codec::{decode_next, ProtocolEvent, ProtocolResponse};
pub use self::state::{ValidatorMachine, ValidatorState};

// Host to device
/// Acknowledge power-up / accept bill in escrow
pub const ACCEPT: u8 = 0x02;
/// Reject bill in escrow
pub const REJECT: u8 = 0x0F;
/// Keep-alive status request
pub const POLL: u8 = 0x0C;

// Device to host
/// Power-up announcement
pub const POWER1: u8 = 0x80;
/// Alternate power-up announcement
pub const POWER2: u8 = 0x8F;
/// Bill held in escrow, denomination byte follows
pub const ESCROW: u8 = 0x81;
