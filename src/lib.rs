//! Host-side client library for hakomari USB devices.
//!
//! A hakomari device exposes a small set of named endpoints (keys,
//! signers, and the like) over a USB virtual serial port. This crate
//! speaks the wire protocol end to end: a SLIP-style byte-stuffed
//! frame layer, a MessagePack request/reply codec on top of it, and
//! the re-entrant passphrase authentication flow a device can demand
//! mid-request.
//!
//! # Example
//! ```no_run
//! use hakomari::Context;
//!
//! # fn example() -> hakomari::error::Result<()> {
//! let mut ctx = Context::new();
//! let count = ctx.enumerate_devices()?;
//! if count == 0 {
//!     return Ok(());
//! }
//! let mut device = ctx.open_device(0)?;
//! let num_endpoints = device.enumerate_endpoints()?;
//! for i in 0..num_endpoints {
//!     let endpoint = device.inspect_endpoint(i)?;
//!     println!("{}: {}", endpoint.kind, endpoint.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod context;
pub mod device;
pub mod discovery;
pub mod endpoint;
pub mod error;
mod frame;
pub mod shortname;
mod slip;
#[cfg(test)]
pub(crate) mod test_support;
pub mod transport;
mod wire;

pub use auth::{AuthContext, AuthHandler, PassphraseScreen};
pub use context::Context;
pub use device::Device;
pub use endpoint::{DeviceDescriptor, EndpointDescriptor};
pub use error::{Error, ErrorKind, Result};
pub use shortname::ShortName;
pub use transport::{SerialTransport, Transport};
