use crate::core::Result;
use crate::transport::ValidatorLink;
use super::{ACCEPT, ESCROW, POLL, POWER1, POWER2, REJECT};

/// Event decoded from the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Validator powered up and waits for acknowledgement
    PowerUp,
    /// Bill in escrow with its denomination code
    EscrowPresented(u8),
    /// Byte outside the protocol
    Unrecognized(u8),
}

/// Host response written back to the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolResponse {
    AcknowledgePower,
    AcceptBill,
    RejectBill,
    Poll,
}

impl ProtocolResponse {
    /// Wire byte for this response
    pub fn as_byte(self) -> u8 {
        match self {
            ProtocolResponse::AcknowledgePower | ProtocolResponse::AcceptBill => ACCEPT,
            ProtocolResponse::RejectBill => REJECT,
            ProtocolResponse::Poll => POLL,
        }
    }

    /// Writes the response; the validator sends nothing back for it
    pub fn send<L: ValidatorLink + ?Sized>(self, link: &mut L) -> Result<()> {
        link.write_byte(self.as_byte())
    }
}

/// Decodes the next event from the link.
///
/// Returns `Ok(None)` when no byte arrives within the read timeout, and also
/// when an ESCROW byte is not followed by its denomination byte in time. The
/// incomplete frame is dropped; the validator resends on its own schedule.
pub fn decode_next<L: ValidatorLink + ?Sized>(link: &mut L) -> Result<Option<ProtocolEvent>> {
    let byte = match link.read_byte()? {
        Some(byte) => byte,
        None => return Ok(None),
    };

    let event = match byte {
        POWER1 | POWER2 => ProtocolEvent::PowerUp,
        ESCROW => match link.read_byte()? {
            Some(code) => ProtocolEvent::EscrowPresented(code),
            None => {
                tracing::debug!("escrow frame without denomination byte, dropped");
                return Ok(None);
            }
        },
        other => ProtocolEvent::Unrecognized(other),
    };

    Ok(Some(event))
}
