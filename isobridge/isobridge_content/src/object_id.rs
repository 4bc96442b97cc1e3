//! Content object identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use isobridge_core::error::ContentError;

/// A 16-byte content object identifier.
///
/// Crosses the native boundary as a raw 16-byte buffer and is written as 32
/// lowercase hex digits everywhere else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 16]);

impl ObjectId {
    /// The all-zero id, never assigned to an object.
    pub const NIL: ObjectId = ObjectId([0; 16]);

    /// Create an id from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Derive a stable id from an object url.
    pub fn for_url(url: &str) -> Self {
        Self(*Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).as_bytes())
    }

    /// Whether this is the nil id.
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ContentError::InvalidBundle(format!("invalid object id '{}'", s));
        if s.len() != 32 || !s.is_ascii() {
            return Err(invalid());
        }

        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_format() {
        let id = ObjectId::from_bytes([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ]);
        assert_eq!(id.to_string(), "00112233445566778899aabbccddeeff");
        assert_eq!("00112233445566778899AABBCCDDEEFF".parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn test_invalid_hex() {
        assert!("abc".parse::<ObjectId>().is_err());
        assert!("zz112233445566778899aabbccddeeff".parse::<ObjectId>().is_err());
    }

    #[test]
    fn test_url_ids_are_stable() {
        let a = ObjectId::for_url("textures/logo.png");
        assert_eq!(a, ObjectId::for_url("textures/logo.png"));
        assert_ne!(a, ObjectId::for_url("textures/other.png"));
        assert!(!a.is_nil());
        assert!(ObjectId::NIL.is_nil());
    }
}
