use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::core::{Error, Result};
use super::StreamLink;

/// Validator link over a hardware serial port
pub type SerialLink = StreamLink<Box<dyn SerialPort>>;

/// Opens a serial port with 8 data bits, even parity and one stop bit
pub fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::Even)
        .stop_bits(StopBits::One)
        .timeout(timeout)
        .open()
        .map_err(|e| Error::transport(format!("Failed to open {}: {}", path, e)))
}

/// Opens the validator link
pub fn open_validator_link(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<SerialLink> {
    let port = open_port(path, baud_rate, read_timeout)?;
    tracing::info!(port = path, baud = baud_rate, "validator link open");
    Ok(StreamLink::new(port))
}
