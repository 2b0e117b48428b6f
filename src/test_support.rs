//! In-memory [`Transport`] used by unit and integration tests. Not part
//! of the public API.

use crate::error::{Error, Result};
use crate::transport::Transport;
use std::collections::VecDeque;
use std::time::Duration;

/// Plays back a fixed byte stream on `read()` and records everything
/// passed to `write()`. A `read()` against an exhausted stream behaves
/// like a real port timing out, rather than returning stale bytes.
#[derive(Debug)]
pub struct ScriptedTransport {
    input: VecDeque<u8>,
    pub written: Vec<u8>,
}

impl ScriptedTransport {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: input.into(),
            written: Vec::new(),
        }
    }

    /// Appends more bytes to the read queue, e.g. to stage a reply
    /// after asserting on what was written for the request.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8], _flush: bool, _timeout: Duration) -> Result<()> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.input.is_empty() {
            return Err(Error::timed_out());
        }
        let mut n = 0;
        while n < buf.len() {
            match self.input.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

const END: u8 = 0xC0;
const ESC: u8 = 0xDB;
const ESC_END: u8 = 0xDC;
const ESC_ESC: u8 = 0xDD;

/// SLIP-encodes an already-built message, for staging scripted replies.
pub fn slip_encode(msg: &[u8]) -> Vec<u8> {
    let mut out = vec![END];
    for &b in msg {
        match b {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            _ => out.push(b),
        }
    }
    out.push(END);
    out
}

/// Builds a MessagePack `[Reply, txid, status]` header followed by raw
/// `body` bytes, SLIP-framed as a single message.
pub fn build_reply_frame(txid: u32, status: u8, body: &[u8]) -> Vec<u8> {
    let mut msg = Vec::new();
    rmp::encode::write_array_len(&mut msg, 3).unwrap();
    rmp::encode::write_uint(&mut msg, 1).unwrap(); // FRAME_REPLY
    rmp::encode::write_u32(&mut msg, txid).unwrap();
    rmp::encode::write_uint(&mut msg, status as u64).unwrap();
    msg.extend_from_slice(body);
    slip_encode(&msg)
}
