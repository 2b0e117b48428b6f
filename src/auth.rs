//! Re-entrant passphrase authentication.
//!
//! When a query comes back `AuthRequired`, the driving loop in
//! `device.rs` calls [`authenticate`], which runs the
//! `@get-passphrase-screen` + `@input-passphrase` sub-dialogue against
//! the same engine and hands a narrow [`AuthContext`] to the
//! host-supplied handler. The handler only ever sees that narrow
//! capability, not the engine or device themselves, so the borrow
//! checker rules out the handler starting another operation on the
//! same device while one is already mid-flight.

use crate::endpoint::EndpointDescriptor;
use crate::engine::Engine;
use crate::error::{Error, ErrorKind, Result};
use crate::transport::Transport;
use crate::wire;
use tracing::trace;

/// A monochrome bitmap rendered by the host to prompt a passphrase,
/// packed one bit per pixel in row-major, x-then-y order.
#[derive(Debug, Clone)]
pub struct PassphraseScreen {
    pub width: u32,
    pub height: u32,
    image_bits: Vec<u8>,
}

impl PassphraseScreen {
    fn new(width: u32, height: u32, image_bits: Vec<u8>) -> Result<Self> {
        let expected_len = ((width as u64 * height as u64) + 7) / 8;
        if image_bits.len() as u64 != expected_len {
            return Err(Error::io("Format error"));
        }
        Ok(Self {
            width,
            height,
            image_bits,
        })
    }

    /// Reads the bit at (x, y): true means the pixel is set.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        let bit_index = (x as u64) + (y as u64) * (self.width as u64);
        let byte = self.image_bits[(bit_index / 8) as usize];
        (byte >> (bit_index % 8)) & 1 == 1
    }

    pub fn image_bits(&self) -> &[u8] {
        &self.image_bits
    }
}

/// Capability handed to the auth handler. Deliberately exposes nothing
/// beyond inspecting the screen and reporting pointer events.
pub struct AuthContext<'a, T> {
    screen: &'a PassphraseScreen,
    engine: &'a mut Engine<T>,
    passphrase_entered: &'a mut bool,
}

impl<'a, T: Transport> AuthContext<'a, T> {
    pub fn inspect_passphrase_screen(&self) -> &PassphraseScreen {
        self.screen
    }

    /// Reports a pointer event to the device. Any `down = true` event
    /// latches `passphrase_entered`.
    pub fn input_pointer(&mut self, x: u32, y: u32, down: bool) -> Result<()> {
        self.engine.write_pointer_event(x, y, down)?;
        *self.passphrase_entered |= down;
        Ok(())
    }
}

/// Host-supplied collaborator that drives the passphrase prompt.
pub trait AuthHandler<T> {
    fn ask_passphrase(&mut self, ctx: &mut AuthContext<'_, T>) -> Result<()>;
}

/// Blanket impl so a plain closure can serve as a handler.
impl<T, F> AuthHandler<T> for F
where
    F: FnMut(&mut AuthContext<'_, T>) -> Result<()>,
{
    fn ask_passphrase(&mut self, ctx: &mut AuthContext<'_, T>) -> Result<()> {
        self(ctx)
    }
}

fn read_passphrase_screen<T: Transport>(engine: &mut Engine<T>) -> Result<PassphraseScreen> {
    let mut r = engine.reply_reader();
    let map_len = wire::read_map_len(&mut r)?;
    if map_len != 3 {
        return Err(Error::io("Format error"));
    }

    let (mut width, mut height, mut image_data) = (None, None, None);
    for _ in 0..3 {
        let key = wire::read_string(&mut r)?;
        match key.as_str() {
            "width" if width.is_none() => width = Some(wire::read_u32(&mut r)?),
            "height" if height.is_none() => height = Some(wire::read_u32(&mut r)?),
            "image_data" if image_data.is_none() => image_data = Some(wire::read_bin(&mut r)?),
            _ => return Err(Error::io("Format error")),
        }
    }

    let (width, height, image_data) = match (width, height, image_data) {
        (Some(w), Some(h), Some(d)) => (w, h, d),
        _ => return Err(Error::io("Format error")),
    };

    PassphraseScreen::new(width, height, image_data)
}

/// Runs one authentication round: fetches the passphrase screen, drives
/// the handler, and reports the resulting status. `Ok` with no
/// down-event observed is reported back as `AuthRequired` (the handler
/// cancelled), per the outer retry contract in `device.rs`. The fetched
/// screen is stashed in `screen_cache` regardless of outcome, so the
/// device can hold onto (and later release) the bitmap it last showed.
pub fn authenticate<T: Transport>(
    engine: &mut Engine<T>,
    endpoint: &EndpointDescriptor,
    handler: &mut dyn AuthHandler<T>,
    screen_cache: &mut Option<PassphraseScreen>,
) -> Result<ErrorKind> {
    let txid = engine.begin_query(Some(endpoint), "@get-passphrase-screen")?;
    let status = engine.end_query(txid)?;
    if status != ErrorKind::Ok {
        return Ok(status);
    }
    let screen = read_passphrase_screen(engine)?;
    *screen_cache = Some(screen.clone());

    let txid = engine.begin_query(Some(endpoint), "@input-passphrase")?;
    engine.flush_header()?;

    let mut passphrase_entered = false;
    {
        let mut ctx = AuthContext {
            screen: &screen,
            engine,
            passphrase_entered: &mut passphrase_entered,
        };
        handler.ask_passphrase(&mut ctx)?;
    }
    engine.write_stream_terminator()?;
    let status = engine.end_query(txid)?;

    trace!(?status, passphrase_entered, "authenticate");

    match (status, passphrase_entered) {
        (ErrorKind::Ok, true) => Ok(ErrorKind::Ok),
        (ErrorKind::Ok, false) => Ok(ErrorKind::AuthRequired),
        (other, _) => Ok(other),
    }
}
