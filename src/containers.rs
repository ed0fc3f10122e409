//! Value containers used by message storage.
//!
//! The interesting one is [`ProtoString`]: protobuf `string` fields are
//! length-delimited bytes that are *supposed* to be UTF-8, but the decoder
//! stores whatever arrived and reports the classification separately. A
//! `ProtoString` therefore owns raw bytes and exposes checked `str` views.
//!
//! # Example
//!
//! ```
//! use protoflect::containers::ProtoString;
//!
//! let s = ProtoString::from("hello");
//! assert_eq!(s.as_str(), Some("hello"));
//! assert_eq!(s, *"hello");
//!
//! let raw = ProtoString::from_bytes(vec![0xff, 0xfe]);
//! assert_eq!(raw.as_str(), None);
//! assert_eq!(raw.as_bytes(), [0xff, 0xfe]);
//! ```

use std::borrow::Cow;

/// A byte-backed string value. Ordering and hashing are byte-wise, which is
/// also the order deterministic map serialization uses for string keys.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtoString(Vec<u8>);

impl ProtoString {
    pub const fn new() -> Self {
        ProtoString(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ProtoString(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The UTF-8 view, or `None` when the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn is_valid_utf8(&self) -> bool {
        self.as_str().is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn assign_bytes(&mut self, bytes: &[u8]) {
        self.0.clear();
        self.0.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for ProtoString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl From<&str> for ProtoString {
    fn from(s: &str) -> Self {
        ProtoString(s.as_bytes().to_vec())
    }
}

impl From<String> for ProtoString {
    fn from(s: String) -> Self {
        ProtoString(s.into_bytes())
    }
}

impl From<ProtoString> for Vec<u8> {
    fn from(s: ProtoString) -> Self {
        s.0
    }
}

impl PartialEq<str> for ProtoString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for ProtoString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_views() {
        let s = ProtoString::from("grüß");
        assert_eq!(s.as_str(), Some("grüß"));
        assert_eq!(s, "grüß");
        assert!(s.is_valid_utf8());
        assert_eq!(s.len(), "grüß".len());
    }

    #[test]
    fn test_invalid_utf8_is_stored() {
        let s = ProtoString::from_bytes(vec![b'a', 0xff, b'b']);
        assert_eq!(s.as_str(), None);
        assert_eq!(s.as_bytes(), [b'a', 0xff, b'b']);
        assert_eq!(s.to_string_lossy(), "a\u{fffd}b");
        assert_eq!(format!("{s:?}"), "\"a\u{fffd}b\"");
    }

    #[test]
    fn test_byte_order() {
        let a = ProtoString::from("abc");
        let b = ProtoString::from("abd");
        let high = ProtoString::from_bytes(vec![0xff]);
        assert!(a < b);
        assert!(b < high);
    }
}
