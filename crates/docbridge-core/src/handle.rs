//! Opaque handles for live document objects.
//!
//! Callers only ever see `range:<id>` / `table:<id>` strings; the registry maps
//! them back to host keys. Entries live until they are released or the session
//! that owns the registry ends.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use rand::Rng;
use serde::{Serialize, Serializer};

use crate::error::{BridgeError, BridgeResult};
use crate::host::{RangeRef, TableRef};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Range,
    Table,
}

impl HandleKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Table => "table",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "range" => Some(Self::Range),
            "table" => Some(Self::Table),
            _ => None,
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A key handed to callers in place of a live object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    raw: String,
    kind: HandleKind,
}

impl Handle {
    /// Parses a `<kind>:<id>` string. Only the shape is checked here; whether
    /// the handle was ever issued is the registry's business.
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        let (prefix, id) = raw
            .split_once(':')
            .ok_or_else(|| BridgeError::invalid(format!("malformed handle '{raw}'")))?;
        let kind = HandleKind::from_prefix(prefix).ok_or_else(|| {
            BridgeError::invalid(format!("unknown handle kind '{prefix}' in '{raw}'"))
        })?;
        if id.is_empty() {
            return Err(BridgeError::invalid(format!("handle '{raw}' has an empty id")));
        }
        Ok(Self {
            raw: raw.to_string(),
            kind,
        })
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Host key stored behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveRef {
    Range(RangeRef),
    Table(TableRef),
}

impl LiveRef {
    pub fn kind(&self) -> HandleKind {
        match self {
            Self::Range(_) => HandleKind::Range,
            Self::Table(_) => HandleKind::Table,
        }
    }
}

#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: HashMap<Handle, LiveRef>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, live: LiveRef) -> Handle {
        let kind = live.kind();
        loop {
            let handle = Handle {
                raw: format!("{}:{}", kind.prefix(), generate_id()),
                kind,
            };
            if !self.entries.contains_key(&handle) {
                self.entries.insert(handle.clone(), live);
                return handle;
            }
        }
    }

    pub fn register_range(&mut self, range: RangeRef) -> Handle {
        self.register(LiveRef::Range(range))
    }

    pub fn register_table(&mut self, table: TableRef) -> Handle {
        self.register(LiveRef::Table(table))
    }

    pub fn resolve(&self, handle: &Handle) -> BridgeResult<LiveRef> {
        self.entries
            .get(handle)
            .copied()
            .ok_or_else(|| BridgeError::NotFound(format!("handle '{handle}' is not registered")))
    }

    pub fn resolve_range(&self, handle: &Handle) -> BridgeResult<RangeRef> {
        match self.resolve(handle)? {
            LiveRef::Range(range) => Ok(range),
            LiveRef::Table(_) => Err(BridgeError::invalid(format!(
                "handle '{handle}' refers to a table, expected a range"
            ))),
        }
    }

    pub fn resolve_table(&self, handle: &Handle) -> BridgeResult<TableRef> {
        match self.resolve(handle)? {
            LiveRef::Table(table) => Ok(table),
            LiveRef::Range(_) => Err(BridgeError::invalid(format!(
                "handle '{handle}' refers to a range, expected a table"
            ))),
        }
    }

    /// Removes the entry if present and returns the key it pointed to.
    pub fn release(&mut self, handle: &Handle) -> Option<LiveRef> {
        self.entries.remove(handle)
    }

    /// Drops every entry, returning the keys that were still registered.
    pub fn clear(&mut self) -> Vec<LiveRef> {
        self.entries.drain().map(|(_, live)| live).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{suffix}", to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ID_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn issued_handles_resolve_until_released() {
        let mut registry = HandleRegistry::new();
        let handle = registry.register_range(RangeRef(7));
        assert!(handle.as_str().starts_with("range:"));
        assert_eq!(registry.resolve(&handle).unwrap(), LiveRef::Range(RangeRef(7)));

        assert_eq!(registry.release(&handle), Some(LiveRef::Range(RangeRef(7))));
        assert_eq!(registry.release(&handle), None);
        let err = registry.resolve(&handle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn never_issued_handle_is_not_found() {
        let registry = HandleRegistry::new();
        let handle = Handle::parse("table:abc-123").unwrap();
        assert_eq!(registry.resolve(&handle).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn kind_mismatch_is_invalid_argument() {
        let mut registry = HandleRegistry::new();
        let handle = registry.register_table(TableRef(1));
        let err = registry.resolve_range(&handle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn ids_are_unique() {
        let mut registry = HandleRegistry::new();
        let handles: Vec<_> = (0..500).map(|n| registry.register_range(RangeRef(n))).collect();
        assert_eq!(registry.len(), 500);
        let mut raw: Vec<_> = handles.iter().map(|h| h.as_str().to_string()).collect();
        raw.sort();
        raw.dedup();
        assert_eq!(raw.len(), 500);
    }

    #[test]
    fn rejects_malformed_handles() {
        assert!(Handle::parse("range").is_err());
        assert!(Handle::parse("shape:1").is_err());
        assert!(Handle::parse("range:").is_err());
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
