//! Request/reply engine: frames requests, assigns transaction IDs,
//! matches replies, and exposes reply bodies as a stream.

use crate::endpoint::EndpointDescriptor;
use crate::error::{Error, ErrorKind, Result};
use crate::frame::{FrameReader, FrameWriter};
use crate::slip::SlipCodec;
use crate::transport::Transport;
use crate::wire::{self, FRAME_REPLY, FRAME_REQUEST};
use std::time::Duration;
use tracing::{debug, trace};

/// Default chunk size used when streaming a caller-supplied payload.
pub const PAYLOAD_CHUNK_SIZE: usize = 1024;

pub struct Engine<T> {
    codec: SlipCodec<T>,
    timeout: Duration,
    next_txid: u32,
    replay: Vec<u8>,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            codec: SlipCodec::new(transport),
            timeout,
            next_txid: 0,
            replay: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        self.codec.transport()
    }

    /// Opens a fresh write frame and writes the 4-element request
    /// header, returning the txid just assigned.
    pub fn begin_query(&mut self, endpoint: Option<&EndpointDescriptor>, verb: &str) -> Result<u32> {
        self.codec.begin_write(self.timeout)?;

        let txid = self.next_txid;
        self.next_txid = self.next_txid.wrapping_add(1);

        let mut w = FrameWriter::new(&mut self.codec, self.timeout);
        wire::write_array_len(&mut w, 4)?;
        wire::write_u8(&mut w, FRAME_REQUEST)?;
        wire::write_u32(&mut w, txid)?;
        wire::write_str(&mut w, verb)?;
        wire::write_addressing(&mut w, endpoint)?;

        trace!(txid, verb, "begin_query");
        Ok(txid)
    }

    /// Pushes the header out now, without closing the frame. Used by
    /// the authenticator so the device can start drawing the
    /// passphrase prompt while the host waits on the auth handler.
    pub fn flush_header(&mut self) -> Result<()> {
        self.codec.flush(self.timeout)
    }

    /// Writes one raw chunk of payload into the still-open frame. On
    /// first transmission the chunk is also appended to the replay
    /// buffer so it can be resent verbatim after an authentication
    /// round.
    pub fn write_payload_chunk(&mut self, chunk: &[u8], first_time: bool) -> Result<()> {
        self.codec.write(chunk, self.timeout)?;
        if first_time {
            self.replay.extend_from_slice(chunk);
        }
        Ok(())
    }

    /// Writes one pointer-event array `[x, y, down]` into the
    /// still-open frame and flushes it immediately.
    pub fn write_pointer_event(&mut self, x: u32, y: u32, down: bool) -> Result<()> {
        let mut w = FrameWriter::new(&mut self.codec, self.timeout);
        wire::write_array_len(&mut w, 3)?;
        wire::write_u32(&mut w, x)?;
        wire::write_u32(&mut w, y)?;
        wire::write_bool(&mut w, down)?;
        self.codec.flush(self.timeout)
    }

    /// Writes the `nil` terminator closing an `@input-passphrase`
    /// payload stream.
    pub fn write_stream_terminator(&mut self) -> Result<()> {
        let mut w = FrameWriter::new(&mut self.codec, self.timeout);
        wire::write_nil(&mut w)
    }

    pub fn replay_buffer(&self) -> &[u8] {
        &self.replay
    }

    pub fn clear_replay_buffer(&mut self) {
        self.replay.clear();
    }

    /// Closes the write frame and drains replies until one matching
    /// `txid` is found, discarding stale ones.
    pub fn end_query(&mut self, txid: u32) -> Result<ErrorKind> {
        self.codec.end_write(self.timeout)?;

        loop {
            self.codec.begin_read(self.timeout)?;

            let mut r = FrameReader::new(&mut self.codec, self.timeout);
            let len = wire::read_array_len(&mut r)?;
            if len != 3 {
                return Err(Error::io("Format error"));
            }

            let frame_type = wire::read_u8(&mut r)?;
            if frame_type != FRAME_REPLY {
                return Err(Error::io("Format error"));
            }

            let reply_txid = wire::read_u32(&mut r)?;
            if reply_txid != txid {
                debug!(reply_txid, txid, "discarding stale reply");
                r.discard_rest()?;
                continue;
            }

            let status_byte = wire::read_u8(&mut r)?;
            let kind =
                ErrorKind::from_wire(status_byte).ok_or_else(|| Error::io("Format error"))?;
            trace!(txid, ?kind, "end_query");
            return Ok(kind);
        }
    }

    /// Borrows a reader over whatever remains of the current reply
    /// frame (the reply body). Valid only until the next request.
    pub fn reply_reader(&mut self) -> FrameReader<'_, T> {
        FrameReader::new(&mut self.codec, self.timeout)
    }

    /// Borrows a writer into the still-open request frame, for
    /// encoding structured bodies (e.g. the `@create`/`@destroy`
    /// `{type, name}` map) directly rather than through the raw
    /// payload-chunk path.
    pub fn writer(&mut self) -> FrameWriter<'_, T> {
        FrameWriter::new(&mut self.codec, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_reply_frame, ScriptedTransport};
    use std::io::Read;

    fn engine_with(input: Vec<u8>) -> Engine<ScriptedTransport> {
        Engine::new(ScriptedTransport::new(input), Duration::from_millis(100))
    }

    #[test]
    fn txids_are_assigned_monotonically_starting_at_zero() {
        let mut engine = engine_with(Vec::new());
        assert_eq!(engine.begin_query(None, "@enumerate").unwrap(), 0);
        assert_eq!(engine.begin_query(None, "@enumerate").unwrap(), 1);
        assert_eq!(engine.begin_query(None, "@enumerate").unwrap(), 2);
    }

    #[test]
    fn skips_stale_replies_and_returns_the_matching_one() {
        let mut wire = build_reply_frame(0, ErrorKind::Ok as u8, &[]);
        wire.extend(build_reply_frame(1, ErrorKind::Ok as u8, &[]));
        wire.extend(build_reply_frame(2, ErrorKind::Ok as u8, &[]));

        let mut engine = engine_with(wire);
        let txid = engine.begin_query(None, "@enumerate").unwrap();
        assert_eq!(txid, 0);
        // Reply stream has stale replies for txid 0 and 1 staged ahead
        // of the real one for txid 2; the engine must skip both.
        let status = engine.end_query(2).unwrap();
        assert_eq!(status, ErrorKind::Ok);
    }

    #[test]
    fn non_reply_frame_type_is_a_format_error() {
        let mut msg = Vec::new();
        rmp::encode::write_array_len(&mut msg, 3).unwrap();
        rmp::encode::write_uint(&mut msg, 0).unwrap(); // FRAME_REQUEST, not REPLY
        rmp::encode::write_u32(&mut msg, 0).unwrap();
        rmp::encode::write_uint(&mut msg, 0).unwrap();
        let wire = crate::test_support::slip_encode(&msg);

        let mut engine = engine_with(wire);
        let txid = engine.begin_query(None, "@enumerate").unwrap();
        let err = engine.end_query(txid).unwrap_err();
        assert_eq!(err.message, "Format error");
    }

    #[test]
    fn wrong_array_length_is_a_format_error() {
        let mut msg = Vec::new();
        rmp::encode::write_array_len(&mut msg, 2).unwrap();
        rmp::encode::write_uint(&mut msg, 1).unwrap();
        rmp::encode::write_u32(&mut msg, 0).unwrap();
        let wire = crate::test_support::slip_encode(&msg);

        let mut engine = engine_with(wire);
        let txid = engine.begin_query(None, "@enumerate").unwrap();
        let err = engine.end_query(txid).unwrap_err();
        assert_eq!(err.message, "Format error");
    }

    #[test]
    fn reply_body_is_readable_after_ok_status() {
        let wire = build_reply_frame(0, ErrorKind::Ok as u8, b"hello");
        let mut engine = engine_with(wire);
        let txid = engine.begin_query(None, "@enumerate").unwrap();
        assert_eq!(engine.end_query(txid).unwrap(), ErrorKind::Ok);

        let mut body = Vec::new();
        engine.reply_reader().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hello");
    }
}
