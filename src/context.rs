//! Process-local scope owning device discovery results, the serial
//! port configuration template, and the registered auth handler.

use crate::auth::AuthHandler;
use crate::device::Device;
use crate::discovery;
use crate::endpoint::{DeviceDescriptor, EndpointDescriptor};
use crate::error::{Error, Result};
use crate::frame::FrameReader;
use crate::transport::{SerialTransport, Transport};
use std::io::Read;
use std::time::Duration;

/// Serial configuration applied on every `open_device`: 115200 baud, 8
/// data bits, no parity, 1 stop bit, hardware RTS/CTS flow control.
pub const BAUD_RATE: u32 = 115_200;

/// Per-transport-call timeout.
pub const DEVICE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Owns device discovery results, the auth handler, and the latched
/// last-error message. Single-threaded; independent contexts don't
/// interact.
pub struct Context<T = SerialTransport> {
    devices: Vec<DeviceDescriptor>,
    auth_handler: Option<Box<dyn AuthHandler<T>>>,
    last_error: Option<String>,
    timeout: Duration,
}

impl<T: Transport> Context<T> {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            auth_handler: None,
            last_error: None,
            timeout: DEVICE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers the handler consulted by every subsequent
    /// `query_endpoint` call on this context whenever a request comes
    /// back `AuthRequired`. Replaces any previously registered handler.
    pub fn set_auth_handler(&mut self, handler: impl AuthHandler<T> + 'static) {
        self.auth_handler = Some(Box::new(handler));
    }

    /// Removes any registered auth handler; subsequent `AuthRequired`
    /// replies are returned to the caller instead of triggering a
    /// passphrase round.
    pub fn clear_auth_handler(&mut self) {
        self.auth_handler = None;
    }

    /// Returns the most recently latched error message. Cleared by the
    /// next successful operation; not cleared by the next failing one
    /// (it simply replaces the message).
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<R>(&mut self, result: Result<R>) -> Result<R> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Ok(v)
            }
            Err(e) => {
                self.last_error = Some(e.message.clone());
                Err(e)
            }
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// An index `>= count` is `Invalid`, not a panic.
    pub fn inspect_device(&self, index: usize) -> Result<&DeviceDescriptor> {
        self.devices
            .get(index)
            .ok_or_else(|| Error::invalid(format!("device index {index} out of range")))
    }

    /// Opens an already-constructed transport as device `index`'s
    /// connection. Used directly by tests and by any caller supplying
    /// a non-serial transport; `Context<SerialTransport>::open_device`
    /// is the convenience entry point for real hardware.
    pub fn open_device_with(&mut self, index: usize, transport: T) -> Result<Device<T>> {
        let result = self.inspect_device(index).map(|_| ());
        self.record(result)?;
        Ok(Device::new(transport, self.timeout))
    }

    /// Issues `verb` on `endpoint` of `device`, optionally streaming
    /// `payload`, consulting whatever handler is registered via
    /// `set_auth_handler` when the device reports `AuthRequired`.
    /// Returns a reader over the reply body on success.
    pub fn query_endpoint<'a>(
        &mut self,
        device: &'a mut Device<T>,
        endpoint: &EndpointDescriptor,
        verb: &str,
        payload: Option<&mut dyn Read>,
    ) -> Result<FrameReader<'a, T>> {
        let result = device.query_endpoint(endpoint, verb, payload, self.auth_handler.as_deref_mut());
        self.record(result)
    }

    /// Closes `device`, releasing its resources in the fixed order
    /// documented on `Device::close`.
    pub fn close_device(&mut self, device: Device<T>) {
        device.close();
    }

    /// Releases the context's own discovery cache. Any devices already
    /// opened from it are unaffected and must be closed separately via
    /// `close_device`.
    pub fn close(mut self) {
        self.devices.clear();
    }
}

impl<T: Transport> Default for Context<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Context<SerialTransport> {
    /// Enumerates serial ports, filters to USB devices whose product
    /// string begins with `"Hakomari"`, and refills the device table.
    pub fn enumerate_devices(&mut self) -> Result<usize> {
        let result = discovery::enumerate();
        let result = result.map(|devices| {
            let count = devices.len();
            self.devices = devices;
            count
        });
        self.record(result)
    }

    /// Opens device `index` over its discovered serial port, applying
    /// the standard 115200 8N1 hardware-flow-control configuration.
    pub fn open_device(&mut self, index: usize) -> Result<Device<SerialTransport>> {
        let path = self.inspect_device(index)?.system_name.as_str().to_string();
        let timeout = self.timeout;
        let result = SerialTransport::open(&path, BAUD_RATE, timeout);
        let transport = self.record(result)?;
        Ok(Device::new(transport, timeout))
    }
}
