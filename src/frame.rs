//! Adapts [`SlipCodec`] to `std::io::{Read, Write}` so the MessagePack
//! codec (`rmp`) can operate directly on framed messages.

use crate::error::Result;
use crate::slip::SlipCodec;
use crate::transport::Transport;
use std::io;
use std::time::Duration;

/// A write-half adapter bound to one outgoing frame and a fixed
/// per-call timeout.
pub struct FrameWriter<'a, T> {
    codec: &'a mut SlipCodec<T>,
    timeout: Duration,
}

impl<'a, T: Transport> FrameWriter<'a, T> {
    pub fn new(codec: &'a mut SlipCodec<T>, timeout: Duration) -> Self {
        Self { codec, timeout }
    }
}

impl<'a, T: Transport> io::Write for FrameWriter<'a, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.codec
            .write(buf, self.timeout)
            .map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.codec.flush(self.timeout).map_err(io::Error::other)
    }
}

/// A read-half adapter bound to one incoming frame and a fixed
/// per-call timeout.
pub struct FrameReader<'a, T> {
    codec: &'a mut SlipCodec<T>,
    timeout: Duration,
}

impl<'a, T: Transport> FrameReader<'a, T> {
    pub fn new(codec: &'a mut SlipCodec<T>, timeout: Duration) -> Self {
        Self { codec, timeout }
    }

    /// Discards any unread remainder of the current frame.
    pub fn discard_rest(&mut self) -> Result<()> {
        self.codec.end_read(self.timeout)
    }
}

impl<'a, T: Transport> io::Read for FrameReader<'a, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.codec
            .read(buf, self.timeout)
            .map_err(io::Error::other)
    }
}
