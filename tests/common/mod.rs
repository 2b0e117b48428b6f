//! Shared scaffolding for the integration tests: an in-memory
//! `Transport` impl and raw SLIP/MessagePack frame builders. Separate
//! from `src/test_support.rs` since integration tests link against the
//! crate as an external user and can't reach `pub(crate)` items.

use hakomari::Transport;
use std::collections::VecDeque;
use std::time::Duration;

const END: u8 = 0xC0;
const ESC: u8 = 0xDB;
const ESC_END: u8 = 0xDC;
const ESC_ESC: u8 = 0xDD;

/// Plays back a fixed byte stream on `read()`, recording everything
/// passed to `write()`. More input can be staged mid-test with
/// `push_input`, to script a reply after inspecting what was sent.
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

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8], _flush: bool, _timeout: Duration) -> hakomari::Result<()> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> hakomari::Result<usize> {
        if self.input.is_empty() {
            return Err(hakomari::Error::io("Device timed out"));
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

/// SLIP-encodes an already-built message.
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

/// Builds a `[Reply, txid, status]` header followed by raw `body`
/// bytes, SLIP-framed as a single message.
pub fn build_reply_frame(txid: u32, status: u8, body: &[u8]) -> Vec<u8> {
    let mut msg = Vec::new();
    rmp::encode::write_array_len(&mut msg, 3).unwrap();
    rmp::encode::write_uint(&mut msg, 1).unwrap(); // FRAME_REPLY
    rmp::encode::write_u32(&mut msg, txid).unwrap();
    rmp::encode::write_uint(&mut msg, status as u64).unwrap();
    msg.extend_from_slice(body);
    slip_encode(&msg)
}

/// Builds the body of an `@enumerate` reply: an array of `{type, name}`
/// maps.
pub fn build_endpoint_list_body(endpoints: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    rmp::encode::write_array_len(&mut body, endpoints.len() as u32).unwrap();
    for (kind, name) in endpoints {
        rmp::encode::write_map_len(&mut body, 2).unwrap();
        rmp::encode::write_str(&mut body, "type").unwrap();
        rmp::encode::write_str(&mut body, kind).unwrap();
        rmp::encode::write_str(&mut body, "name").unwrap();
        rmp::encode::write_str(&mut body, name).unwrap();
    }
    body
}

/// Builds the body of a `@get-passphrase-screen` reply: a `{width,
/// height, image_data}` map with an all-zero bitmap.
pub fn build_passphrase_screen_body(width: u32, height: u32) -> Vec<u8> {
    let bits = ((width as u64 * height as u64) + 7) / 8;
    let image = vec![0u8; bits as usize];

    let mut body = Vec::new();
    rmp::encode::write_map_len(&mut body, 3).unwrap();
    rmp::encode::write_str(&mut body, "width").unwrap();
    rmp::encode::write_u32(&mut body, width).unwrap();
    rmp::encode::write_str(&mut body, "height").unwrap();
    rmp::encode::write_u32(&mut body, height).unwrap();
    rmp::encode::write_str(&mut body, "image_data").unwrap();
    rmp::encode::write_bin(&mut body, &image).unwrap();
    body
}
