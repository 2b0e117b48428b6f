//! Byte-level transport abstraction between the frame codec and the
//! underlying serial connection.

use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::ErrorKind as IoErrorKind;
use std::time::{Duration, Instant};

/// Minimal blocking byte transport the frame codec drives directly.
///
/// Kept deliberately thin (two methods) so that both the real serial
/// connection and the in-memory scripted transport used by tests
/// implement it trivially.
pub trait Transport: std::fmt::Debug {
    /// Writes `data`, optionally flushing the underlying connection's
    /// output buffer once the write completes.
    fn write(&mut self, data: &[u8], flush: bool, timeout: Duration) -> Result<()>;

    /// Reads at least one byte into `buf`, blocking up to `timeout`.
    /// Returns the number of bytes read; `0` means the peer timed out
    /// without sending anything.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// Adapts a `serialport::SerialPort` to [`Transport`].
#[derive(Debug)]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Opens `path` with the standard hakomari serial configuration:
    /// 8 data bits, no parity, 1 stop bit, hardware RTS/CTS flow
    /// control.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Hardware)
            .timeout(timeout)
            .open()?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8], flush: bool, timeout: Duration) -> Result<()> {
        self.port.set_timeout(timeout)?;
        self.port.write_all(data)?;
        if flush {
            self.port.flush()?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        let deadline = Instant::now() + timeout;
        loop {
            match self.port.read(buf) {
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == IoErrorKind::TimedOut => {
                    if Instant::now() >= deadline {
                        return Err(Error::timed_out());
                    }
                    continue;
                }
                Err(ref e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
