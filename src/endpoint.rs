//! Endpoint and device addressing types.

use crate::error::{Error, Result};
use crate::shortname::ShortName;

/// Addresses a logical service on a device: a (type, name) pair,
/// compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    pub kind: ShortName,
    pub name: ShortName,
}

impl EndpointDescriptor {
    pub fn new(kind: impl TryInto<ShortName, Error = Error>, name: impl TryInto<ShortName, Error = Error>) -> Result<Self> {
        Ok(Self {
            kind: kind.try_into()?,
            name: name.try_into()?,
        })
    }
}

/// A device as seen by enumeration: a human name and the underlying OS
/// port name. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub user_name: ShortName,
    pub system_name: ShortName,
}

/// Ordered set of endpoints on a device, refilled wholesale by
/// `enumerate_endpoints`. Indices are stable until the next refill.
#[derive(Debug, Clone, Default)]
pub struct EndpointCache {
    entries: Vec<EndpointDescriptor>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refill(&mut self, entries: Vec<EndpointDescriptor>) {
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `index >= count` is `Invalid`, matching `inspect_device`.
    pub fn get(&self, index: usize) -> Result<&EndpointDescriptor> {
        self.entries
            .get(index)
            .ok_or_else(|| Error::invalid(format!("endpoint index {index} out of range")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.entries.iter()
    }
}
