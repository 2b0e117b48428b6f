//! An open device: the serial engine, its endpoint cache, and the RPC
//! surface built on top of them.

use crate::auth::{authenticate, AuthHandler, PassphraseScreen};
use crate::endpoint::{EndpointCache, EndpointDescriptor};
use crate::engine::{Engine, PAYLOAD_CHUNK_SIZE};
use crate::error::{Error, ErrorKind, Result};
use crate::frame::FrameReader;
use crate::shortname::ShortName;
use crate::transport::Transport;
use crate::wire;
use std::io::Read;
use std::time::Duration;

/// Coarse protocol state, asserted on entry to every public operation.
/// The real enforcement that the auth handler cannot start a second
/// operation comes from `AuthContext` not exposing the device at all;
/// this enum only catches a caller re-entering a `Device` it still
/// holds a borrow into, which the borrow checker otherwise already
/// prevents for `&mut Device` callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    Idle,
    Busy,
}

pub struct Device<T> {
    engine: Engine<T>,
    endpoints: EndpointCache,
    last_passphrase_screen: Option<PassphraseScreen>,
    state: DeviceState,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            engine: Engine::new(transport, timeout),
            endpoints: EndpointCache::new(),
            last_passphrase_screen: None,
            state: DeviceState::Idle,
        }
    }

    /// The passphrase screen bitmap from the most recent authentication
    /// round on this device, if one has happened yet.
    pub fn last_passphrase_screen(&self) -> Option<&PassphraseScreen> {
        self.last_passphrase_screen.as_ref()
    }

    /// Releases the device's resources in the fixed order: endpoint
    /// cache, passphrase screen bitmap, replay buffer, serial port.
    pub fn close(mut self) {
        self.endpoints = EndpointCache::new();
        self.last_passphrase_screen = None;
        self.engine.clear_replay_buffer();
        drop(self.engine);
    }

    fn enter(&mut self) {
        debug_assert_eq!(self.state, DeviceState::Idle, "device re-entered while busy");
        self.state = DeviceState::Busy;
    }

    fn leave(&mut self) {
        self.state = DeviceState::Idle;
    }

    /// Re-fills the endpoint cache from the device and returns its new
    /// length. Indices returned by `inspect_endpoint` are stable until
    /// the next call.
    pub fn enumerate_endpoints(&mut self) -> Result<usize> {
        self.enter();
        let result = self.enumerate_endpoints_inner();
        self.leave();
        result
    }

    fn enumerate_endpoints_inner(&mut self) -> Result<usize> {
        let txid = self.engine.begin_query(None, "@enumerate")?;
        let status = self.engine.end_query(txid)?;
        if status != ErrorKind::Ok {
            return Err(Error::from_kind(status));
        }

        let mut r = self.engine.reply_reader();
        let len = wire::read_array_len(&mut r)?;
        let mut entries = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let map_len = wire::read_map_len(&mut r)?;
            if map_len != 2 {
                return Err(Error::io("Format error"));
            }
            let (mut kind, mut name) = (None, None);
            for _ in 0..2 {
                let key = wire::read_string(&mut r)?;
                match key.as_str() {
                    "type" if kind.is_none() => kind = Some(wire::read_short_name(&mut r)?),
                    "name" if name.is_none() => name = Some(wire::read_short_name(&mut r)?),
                    _ => return Err(Error::io("Format error")),
                }
            }
            match (kind, name) {
                (Some(kind), Some(name)) => entries.push(EndpointDescriptor { kind, name }),
                _ => return Err(Error::io("Format error")),
            }
        }

        let count = entries.len();
        self.endpoints.refill(entries);
        Ok(count)
    }

    pub fn inspect_endpoint(&self, index: usize) -> Result<&EndpointDescriptor> {
        self.endpoints.get(index)
    }

    pub fn create_endpoint(&mut self, desc: &EndpointDescriptor) -> Result<()> {
        self.enter();
        let result = self.create_or_destroy("@create", desc);
        self.leave();
        result
    }

    pub fn destroy_endpoint(&mut self, desc: &EndpointDescriptor) -> Result<()> {
        self.enter();
        let result = self.create_or_destroy("@destroy", desc);
        self.leave();
        result
    }

    fn create_or_destroy(&mut self, verb: &str, desc: &EndpointDescriptor) -> Result<()> {
        let txid = self.engine.begin_query(None, verb)?;
        {
            let mut w = self.engine.writer();
            wire::write_map_len(&mut w, 2)?;
            wire::write_str(&mut w, "type")?;
            wire::write_str(&mut w, desc.kind.as_str())?;
            wire::write_str(&mut w, "name")?;
            wire::write_str(&mut w, desc.name.as_str())?;
        }
        let status = self.engine.end_query(txid)?;
        if status == ErrorKind::Ok {
            Ok(())
        } else {
            Err(Error::from_kind(status))
        }
    }

    /// Issues `verb` on `endpoint`, optionally streaming `payload`, and
    /// retrying through an authentication round on `AuthRequired` when
    /// `auth_handler` is supplied. Returns a reader over the reply body
    /// on success.
    ///
    /// Not exposed outside the crate: the auth handler that matters is
    /// the one registered on `Context`, so the public entry point is
    /// `Context::query_endpoint`, which calls through to this with its
    /// own registered handler.
    pub(crate) fn query_endpoint<'a>(
        &'a mut self,
        endpoint: &EndpointDescriptor,
        verb: &str,
        mut payload: Option<&mut dyn Read>,
        mut auth_handler: Option<&mut dyn AuthHandler<T>>,
    ) -> Result<FrameReader<'a, T>> {
        self.enter();
        let outcome = (|| {
            self.engine.clear_replay_buffer();
            let mut first = true;
            loop {
                let status = self.perform_once(endpoint, verb, payload.as_deref_mut(), first)?;
                if status != ErrorKind::AuthRequired {
                    return Ok(status);
                }
                match auth_handler.as_deref_mut() {
                    None => return Err(Error::from_kind(ErrorKind::AuthRequired)),
                    Some(handler) => {
                        let auth_status = authenticate(
                            &mut self.engine,
                            endpoint,
                            handler,
                            &mut self.last_passphrase_screen,
                        )?;
                        if auth_status != ErrorKind::Ok {
                            return Err(Error::from_kind(ErrorKind::AuthRequired));
                        }
                    }
                }
                first = false;
            }
        })();
        self.leave();

        match outcome {
            Ok(ErrorKind::Ok) => Ok(self.engine.reply_reader()),
            Ok(other) => Err(Error::from_kind(other)),
            Err(e) => Err(e),
        }
    }

    fn perform_once(
        &mut self,
        endpoint: &EndpointDescriptor,
        verb: &str,
        payload: Option<&mut dyn Read>,
        first_time: bool,
    ) -> Result<ErrorKind> {
        let txid = self.engine.begin_query(Some(endpoint), verb)?;

        if first_time {
            if let Some(src) = payload {
                let mut buf = [0u8; PAYLOAD_CHUNK_SIZE];
                loop {
                    let n = src.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    self.engine.write_payload_chunk(&buf[..n], true)?;
                }
            }
        } else {
            let replay = self.engine.replay_buffer().to_vec();
            self.engine.write_payload_chunk(&replay, false)?;
        }

        self.engine.end_query(txid)
    }
}

/// A newly created endpoint descriptor, used by `create_endpoint` and
/// `destroy_endpoint` callers that have plain strings rather than
/// pre-validated [`ShortName`]s.
pub fn endpoint(kind: &str, name: &str) -> Result<EndpointDescriptor> {
    Ok(EndpointDescriptor {
        kind: ShortName::new(kind)?,
        name: ShortName::new(name)?,
    })
}
