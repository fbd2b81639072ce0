//! Relay actuator gateway
//!
//! Unlock and lock are advisory signals to the service hardware. They are
//! best-effort: a failing relay is logged and never reaches the validator loop.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::core::{Error, Result};
use crate::transport::open_port;

/// Command that releases the service
pub const UNLOCK_COMMAND: &[u8] = b"UNLOCK\n";
/// Command that locks the service
pub const LOCK_COMMAND: &[u8] = b"LOCK\n";

/// Write timeout for the relay port
const ACTUATOR_WRITE_TIMEOUT: Duration = Duration::from_millis(200);

/// Receiver of unlock/lock signals
pub trait Actuator: Send + Sync {
    fn unlock(&self);
    fn lock(&self);
}

/// Actuator used when no relay is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActuator;

impl Actuator for NoActuator {
    fn unlock(&self) {
        tracing::debug!("no actuator configured, unlock not sent");
    }

    fn lock(&self) {
        tracing::debug!("no actuator configured, lock not sent");
    }
}

/// Actuator writing text commands to a byte sink, normally a serial port
pub struct RelayActuator {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl RelayActuator {
    /// Creates an actuator over any writer
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        RelayActuator {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Opens the relay serial port
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = open_port(path, baud_rate, ACTUATOR_WRITE_TIMEOUT)
            .map_err(|e| Error::actuator(e.to_string()))?;
        tracing::info!(port = path, baud = baud_rate, "actuator link open");
        Ok(RelayActuator::new(port))
    }

    fn send(&self, command: &[u8]) -> Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(command)?;
        sink.flush()?;
        Ok(())
    }

    fn send_logged(&self, command: &[u8]) {
        if let Err(e) = self.send(command) {
            tracing::warn!(
                command = %String::from_utf8_lossy(command).trim_end(),
                error = %e,
                "actuator write failed"
            );
        }
    }
}

impl Actuator for RelayActuator {
    fn unlock(&self) {
        self.send_logged(UNLOCK_COMMAND);
    }

    fn lock(&self) {
        self.send_logged(LOCK_COMMAND);
    }
}

/// Opens the configured actuator, falling back to `NoActuator`.
///
/// An actuator that cannot be opened is logged and treated as absent.
pub fn connect(port: Option<&str>, baud_rate: u32) -> Arc<dyn Actuator> {
    match port {
        Some(path) => match RelayActuator::open(path, baud_rate) {
            Ok(relay) => Arc::new(relay),
            Err(e) => {
                tracing::warn!(error = %e, "continuing without actuator");
                Arc::new(NoActuator)
            }
        },
        None => Arc::new(NoActuator),
    }
}
