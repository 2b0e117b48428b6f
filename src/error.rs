//! Error taxonomy for the hakomari protocol.

use thiserror::Error;

/// The closed, wire-compatible status taxonomy.
///
/// Numeric values are fixed by the wire format and must never be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    Ok = 0,
    Invalid = 1,
    OutOfMemory = 2,
    AuthRequired = 3,
    Denied = 4,
    Io = 5,
}

impl ErrorKind {
    /// Decode a reply status byte, rejecting unknown values.
    pub(crate) fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Ok),
            1 => Some(Self::Invalid),
            2 => Some(Self::OutOfMemory),
            3 => Some(Self::AuthRequired),
            4 => Some(Self::Denied),
            5 => Some(Self::Io),
            _ => None,
        }
    }

    fn static_message(self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Invalid => "Invalid argument",
            Self::OutOfMemory => "Out of memory",
            Self::AuthRequired => "Authentication required",
            Self::Denied => "Operation denied",
            Self::Io => "IO error",
        }
    }
}

/// Error carrying both the wire-compatible kind and a human-readable
/// message, replacing the "last-error string on the context" pattern of
/// the original C library.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error whose message is the kind's static description.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            message: kind.static_message().to_string(),
            kind,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub(crate) fn format_error() -> Self {
        Self::io("Format error")
    }

    pub(crate) fn timed_out() -> Self {
        Self::io("Device timed out")
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::invalid(e.to_string())
    }
}

impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        use serialport::ErrorKind as SpKind;
        match e.kind {
            SpKind::NoDevice => Self::new(ErrorKind::Invalid, "Device not found"),
            SpKind::InvalidInput => Self::invalid(e.description),
            SpKind::Unknown => Self::io(e.description),
            SpKind::Io(_) => Self::io(e.description),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
