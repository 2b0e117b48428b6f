//! MessagePack encode/decode helpers for the request/reply wire format.
//!
//! Thin wrappers around `rmp`'s low-level streaming functions; every
//! decode failure collapses to a single `Io` "Format error", matching
//! the wire contract (no partial-failure reporting beyond the status
//! byte).

use crate::endpoint::EndpointDescriptor;
use crate::error::{Error, Result};
use crate::shortname::ShortName;
use std::io::{Read, Write};

pub const FRAME_REQUEST: u8 = 0;
pub const FRAME_REPLY: u8 = 1;

fn fmt_err<E>(_e: E) -> Error {
    Error::format_error()
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    rmp::encode::write_u32(w, v).map_err(fmt_err)
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    rmp::decode::read_u32(r).map_err(fmt_err)
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    rmp::encode::write_uint(w, v as u64).map_err(fmt_err)?;
    Ok(())
}

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    rmp::decode::read_u8(r).map_err(fmt_err)
}

pub fn write_bool<W: Write>(w: &mut W, v: bool) -> Result<()> {
    rmp::encode::write_bool(w, v).map_err(fmt_err)
}

pub fn read_bool<R: Read>(r: &mut R) -> Result<bool> {
    rmp::decode::read_bool(r).map_err(fmt_err)
}

pub fn write_array_len<W: Write>(w: &mut W, len: u32) -> Result<()> {
    rmp::encode::write_array_len(w, len).map_err(fmt_err)?;
    Ok(())
}

pub fn read_array_len<R: Read>(r: &mut R) -> Result<u32> {
    rmp::decode::read_array_len(r).map_err(fmt_err)
}

pub fn write_map_len<W: Write>(w: &mut W, len: u32) -> Result<()> {
    rmp::encode::write_map_len(w, len).map_err(fmt_err)?;
    Ok(())
}

pub fn read_map_len<R: Read>(r: &mut R) -> Result<u32> {
    rmp::decode::read_map_len(r).map_err(fmt_err)
}

pub fn write_nil<W: Write>(w: &mut W) -> Result<()> {
    rmp::encode::write_nil(w).map_err(fmt_err)?;
    Ok(())
}

pub fn write_str<W: Write>(w: &mut W, s: &str) -> Result<()> {
    rmp::encode::write_str(w, s).map_err(fmt_err)?;
    Ok(())
}

/// Reads a string of any length into an owned `String`.
pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = rmp::decode::read_str_len(r).map_err(fmt_err)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(fmt_err)?;
    String::from_utf8(buf).map_err(|e| Error::invalid(e.to_string()))
}

/// Reads a string as a [`ShortName`], enforcing the length bound.
pub fn read_short_name<R: Read>(r: &mut R) -> Result<ShortName> {
    ShortName::new(read_string(r)?)
}

pub fn write_bin<W: Write>(w: &mut W, data: &[u8]) -> Result<()> {
    rmp::encode::write_bin(w, data).map_err(fmt_err)?;
    Ok(())
}

/// Reads a `bin` payload into an owned `Vec<u8>`.
pub fn read_bin<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = rmp::decode::read_bin_len(r).map_err(fmt_err)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(fmt_err)?;
    Ok(buf)
}

/// Addressing value in a request frame: `nil` for a device-global verb,
/// or `[type, name]` for an endpoint-scoped one.
pub fn write_addressing<W: Write>(w: &mut W, endpoint: Option<&EndpointDescriptor>) -> Result<()> {
    match endpoint {
        None => write_nil(w),
        Some(ep) => {
            write_array_len(w, 2)?;
            write_str(w, ep.kind.as_str())?;
            write_str(w, ep.name.as_str())
        }
    }
}
