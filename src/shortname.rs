//! Bounded text values used for device names, system names, endpoint
//! types/names, and verbs.

use crate::error::{Error, Result};
use std::fmt;

/// Maximum length in bytes, matching the C `hakomari_string_t`
/// (`char[128]`, 127 usable bytes plus a NUL terminator).
pub const SHORT_NAME_MAX_LEN: usize = 127;

/// A bounded text value, at most [`SHORT_NAME_MAX_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortName(String);

impl ShortName {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.len() > SHORT_NAME_MAX_LEN {
            return Err(Error::invalid(format!(
                "value exceeds {} bytes: {:?}",
                SHORT_NAME_MAX_LEN, s
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShortName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ShortName {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for ShortName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
