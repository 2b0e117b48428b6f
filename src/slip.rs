//! Byte-stuffed (SLIP-style) frame codec.
//!
//! A direct, idiomatic-Rust port of `slipper.h` from the original C
//! implementation: same embedded scratch buffer, same cursor/read-limit
//! bookkeeping, same "sticky end" trick so that reads past a message
//! boundary keep returning zero bytes until `end_read` is called.

use crate::error::{Error, Result};
use crate::transport::Transport;
use std::time::Duration;

const END: u8 = 0xC0;
const ESC: u8 = 0xDB;
const ESC_END: u8 = 0xDC;
const ESC_ESC: u8 = 0xDD;

/// Default size of the embedded read/write scratch buffer.
pub const BUF_SIZE: usize = 1024;

/// Wraps a [`Transport`] with SLIP framing, bidirectional.
#[derive(Debug)]
pub struct SlipCodec<T> {
    transport: T,
    buf: [u8; BUF_SIZE],
    /// write cursor: next free byte in `buf`
    cursor: usize,
    /// read cursor: next unread byte in `buf`
    read_cursor: usize,
    /// read limit: one past the last valid byte in `buf`
    read_limit: usize,
}

impl<T: Transport> SlipCodec<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buf: [0u8; BUF_SIZE],
            cursor: 0,
            read_cursor: 0,
            read_limit: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ---- writer ----

    /// Resets the output cursor and emits one leading END byte.
    pub fn begin_write(&mut self, timeout: Duration) -> Result<()> {
        self.cursor = 0;
        self.write_delimiter(timeout)
    }

    /// Escapes and buffers `data`, draining through the transport
    /// whenever the scratch buffer fills.
    pub fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        for &byte in data {
            let (bytes, len): (&[u8], usize) = match byte {
                ESC => (&[ESC, ESC_ESC], 2),
                END => (&[ESC, ESC_END], 2),
                _ => (std::slice::from_ref(&byte), 1),
            };
            self.write_escaped(&bytes[..len], timeout)?;
        }
        Ok(())
    }

    fn write_delimiter(&mut self, timeout: Duration) -> Result<()> {
        self.write_escaped(&[END], timeout)
    }

    fn write_escaped(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let mut data = data;
        while !data.is_empty() {
            if self.cursor == 0 && data.len() > self.buf.len() {
                self.transport.write(data, true, timeout)?;
                return Ok(());
            }

            let space_left = self.buf.len() - self.cursor;
            let write_size = data.len().min(space_left);
            self.buf[self.cursor..self.cursor + write_size].copy_from_slice(&data[..write_size]);
            self.cursor += write_size;
            data = &data[write_size..];

            if self.cursor == self.buf.len() {
                self.flush(timeout)?;
            }
        }
        Ok(())
    }

    /// Emits a trailing END byte and flushes the buffer with a drained
    /// transport write.
    pub fn end_write(&mut self, timeout: Duration) -> Result<()> {
        self.write_delimiter(timeout)?;
        self.flush(timeout)
    }

    /// Empties the internal write buffer via a blocking, drained
    /// transport write.
    pub fn flush(&mut self, timeout: Duration) -> Result<()> {
        let num_bytes = self.cursor;
        self.cursor = 0;
        self.transport.write(&self.buf[..num_bytes], true, timeout)
    }

    // ---- reader ----

    fn ensure_read_buf(&mut self, timeout: Duration) -> Result<()> {
        if self.read_cursor < self.read_limit {
            return Ok(());
        }

        self.read_cursor = 0;
        let n = self.transport.read(&mut self.buf, timeout)?;
        self.read_limit = n;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<u8> {
        self.ensure_read_buf(timeout)?;
        let byte = self.buf[self.read_cursor];
        self.read_cursor += 1;
        Ok(byte)
    }

    /// Consumes bytes until the next non-END byte is observed, then
    /// un-consumes that byte so the first `read()` sees it. Tolerates
    /// any number of leading stray END bytes from aborted messages.
    ///
    /// Does not reset the read buffer: a single transport read can
    /// return several back-to-back messages, and the unread tail of
    /// that read must survive into the next `begin_read` rather than
    /// being discarded in favor of a fresh physical read.
    pub fn begin_read(&mut self, timeout: Duration) -> Result<()> {
        self.end_read(timeout)?;

        let mut byte;
        loop {
            byte = self.read_byte(timeout)?;
            if byte != END {
                break;
            }
        }
        self.read_cursor -= 1;

        Ok(())
    }

    /// Fills up to `buf.len()` bytes, decoding ESC sequences.
    /// Encountering an END byte terminates the message early: the byte
    /// is un-consumed so repeated reads return zero bytes ("sticky
    /// end") until `end_read` is called.
    pub fn read(&mut self, out: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut bytes_read = 0;

        while bytes_read < out.len() {
            let mut byte = self.read_byte(timeout)?;

            match byte {
                END => {
                    self.read_cursor -= 1;
                    return Ok(bytes_read);
                }
                ESC => {
                    byte = match self.read_byte(timeout)? {
                        ESC_END => END,
                        ESC_ESC => ESC,
                        _ => return Err(Error::io("Encoding error")),
                    };
                }
                _ => {}
            }

            out[bytes_read] = byte;
            bytes_read += 1;
        }

        Ok(bytes_read)
    }

    /// Drains and discards bytes until (and including) the next END.
    /// Idempotent: a just-seen END satisfies it immediately.
    pub fn end_read(&mut self, timeout: Duration) -> Result<()> {
        loop {
            if self.read_byte(timeout)? == END {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{slip_encode as encode, ScriptedTransport};

    fn decode_via_codec(wire: &[u8]) -> Vec<u8> {
        let mut codec = SlipCodec::new(ScriptedTransport::new(wire.to_vec()));
        let timeout = Duration::from_millis(100);
        codec.begin_read(timeout).unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 16];
        loop {
            let n = codec.read(&mut chunk, timeout).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        for len in [0usize, 1, 2, 3, 31, 255, 300] {
            let data: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let wire = encode(&data);
            assert_eq!(wire[0], END);
            assert_eq!(*wire.last().unwrap(), END);
            assert!(!wire[1..wire.len() - 1].contains(&END));
            assert_eq!(decode_via_codec(&wire), data);
        }
    }

    #[test]
    fn decodes_two_messages_separated_by_stray_ends() {
        let a = b"hello".to_vec();
        let b = b"world".to_vec();
        for k in 0..3 {
            let mut wire = encode(&a);
            wire.extend(std::iter::repeat(END).take(k));
            wire.extend(encode(&b));

            let mut codec = SlipCodec::new(ScriptedTransport::new(wire));
            let timeout = Duration::from_millis(100);

            codec.begin_read(timeout).unwrap();
            let mut got_a = vec![0u8; a.len()];
            let n = codec.read(&mut got_a, timeout).unwrap();
            assert_eq!(&got_a[..n], &a[..]);
            codec.end_read(timeout).unwrap();

            codec.begin_read(timeout).unwrap();
            let mut got_b = vec![0u8; b.len()];
            let n = codec.read(&mut got_b, timeout).unwrap();
            assert_eq!(&got_b[..n], &b[..]);
        }
    }

    #[test]
    fn malformed_escape_is_an_encoding_error() {
        let wire = vec![END, ESC, 0x42, END];
        let mut codec = SlipCodec::new(ScriptedTransport::new(wire));
        let timeout = Duration::from_millis(100);
        codec.begin_read(timeout).unwrap();
        let mut out = [0u8; 4];
        let err = codec.read(&mut out, timeout).unwrap_err();
        assert_eq!(err.message, "Encoding error");
    }

    #[test]
    fn reading_past_end_is_sticky_until_end_read() {
        let wire = encode(b"ab");
        let mut codec = SlipCodec::new(ScriptedTransport::new(wire));
        let timeout = Duration::from_millis(100);
        codec.begin_read(timeout).unwrap();

        let mut out = [0u8; 2];
        assert_eq!(codec.read(&mut out, timeout).unwrap(), 2);
        assert_eq!(&out, b"ab");

        // Past the message: sticky end, repeated reads return 0 without
        // consuming further input.
        assert_eq!(codec.read(&mut out, timeout).unwrap(), 0);
        assert_eq!(codec.read(&mut out, timeout).unwrap(), 0);

        codec.end_read(timeout).unwrap();
    }

    #[test]
    fn interior_unescaped_end_terminates_message_and_resyncs() {
        // A reply body containing an unescaped END byte in the middle:
        // decoder treats it as message end.
        let mut wire = vec![END];
        wire.extend_from_slice(b"abc");
        wire.push(END); // interior end: terminates early
        wire.extend_from_slice(b"def");
        wire.push(END);

        let mut codec = SlipCodec::new(ScriptedTransport::new(wire));
        let timeout = Duration::from_millis(100);

        codec.begin_read(timeout).unwrap();
        let mut out = [0u8; 8];
        let n = codec.read(&mut out, timeout).unwrap();
        assert_eq!(&out[..n], b"abc");
        assert_eq!(codec.read(&mut out, timeout).unwrap(), 0);

        // Resync on the following frame.
        codec.begin_read(timeout).unwrap();
        let n = codec.read(&mut out, timeout).unwrap();
        assert_eq!(&out[..n], b"def");
    }
}
