//! Validator link transport
//!
//! The control loop only needs a duplex byte channel whose reads give up after
//! a bounded wait. `StreamLink` provides that over any blocking stream with a
//! read timeout, which is how serial ports behave.

mod serial;

pub use self::serial::{open_port, open_validator_link, SerialLink};

use std::io::{self, Read, Write};

use crate::core::{Error, Result};

/// Duplex byte channel to the bill validator
pub trait ValidatorLink: Send {
    /// Reads one byte, waiting at most the link's read timeout.
    ///
    /// `Ok(None)` means nothing arrived in time.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Writes one byte; no acknowledgement is expected
    fn write_byte(&mut self, byte: u8) -> Result<()>;
}

/// `ValidatorLink` over a blocking stream with a read timeout
pub struct StreamLink<T> {
    inner: T,
}

impl<T: Read + Write + Send> StreamLink<T> {
    /// Wraps a stream
    pub fn new(inner: T) -> Self {
        StreamLink { inner }
    }

    /// Returns the wrapped stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + Send> ValidatorLink for StreamLink<T> {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Err(Error::transport("Validator link closed")),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.inner.write_all(&[byte])?;
        self.inner.flush()?;
        Ok(())
    }
}
