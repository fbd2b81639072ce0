use std::time::Instant;

use crate::core::DenominationTable;
use crate::session::SessionHandle;
use super::codec::{ProtocolEvent, ProtocolResponse};

/// Handshake state of the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    /// No power-up seen yet
    Uninitialized,
    /// Power-up acknowledged, bills expected
    Armed,
}

/// Validator state machine.
///
/// Turns decoded events into responses and session credits. Owned by the
/// control loop; the session it credits is shared.
pub struct ValidatorMachine {
    state: ValidatorState,
    table: DenominationTable,
    session: SessionHandle,
}

impl ValidatorMachine {
    /// Creates a machine waiting for power-up
    pub fn new(table: DenominationTable, session: SessionHandle) -> Self {
        ValidatorMachine {
            state: ValidatorState::Uninitialized,
            table,
            session,
        }
    }

    /// Current handshake state
    pub fn state(&self) -> ValidatorState {
        self.state
    }

    /// Session this machine credits
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Handles one event and returns the response to send, if any
    pub fn handle_event(&mut self, event: ProtocolEvent, now: Instant) -> Option<ProtocolResponse> {
        match event {
            ProtocolEvent::PowerUp => {
                tracing::info!("validator power-up detected, acknowledging");
                self.state = ValidatorState::Armed;
                Some(ProtocolResponse::AcknowledgePower)
            }

            ProtocolEvent::EscrowPresented(code) => Some(self.handle_escrow(code, now)),

            ProtocolEvent::Unrecognized(byte) => {
                tracing::trace!(byte = %format!("0x{:02X}", byte), "ignoring unrecognized byte");
                None
            }
        }
    }

    fn handle_escrow(&mut self, code: u8, now: Instant) -> ProtocolResponse {
        if self.state == ValidatorState::Uninitialized {
            tracing::warn!(
                code = %format!("0x{:02X}", code),
                "bill presented before validator power-up"
            );
        }

        match self.table.value_of(code) {
            Some(value) => {
                tracing::debug!(code = %format!("0x{:02X}", code), value, "escrow");
                self.session.credit(value, now);
                ProtocolResponse::AcceptBill
            }
            None => {
                tracing::info!(code = %format!("0x{:02X}", code), "rejected unknown bill");
                ProtocolResponse::RejectBill
            }
        }
    }
}
