//! Identifiers for domains and capability handles.
//!
//! Both identifiers cross the native boundary as plain integers, so they are
//! thin newtypes over the integer representation used by the C ABI.
//!
//! # Examples
//!
//! ```
//! use isobridge_core::id::{DomainId, HandleToken};
//!
//! assert!(DomainId::ROOT.is_root());
//! assert_eq!(DomainId::new(4).as_raw(), 4);
//!
//! assert!(HandleToken::NULL.is_null());
//! assert_eq!(HandleToken::from_raw(9).as_raw(), 9);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an isolation domain.
///
/// `0` is reserved for the root domain. Isolated domains receive positive
/// ids from the root domain's counter. Negative values never identify a
/// domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(i32);

impl DomainId {
    /// The root domain.
    pub const ROOT: DomainId = DomainId(0);

    /// Create a domain id from its raw value.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Check if this is the root domain id.
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Check if this id can name a domain at all.
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl From<i32> for DomainId {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl From<DomainId> for i32 {
    fn from(id: DomainId) -> Self {
        id.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An opaque capability handle token.
///
/// Tokens are handed out by the handle table and are never reused for a
/// different target. `0` is the null token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleToken(usize);

impl HandleToken {
    /// The null token.
    pub const NULL: HandleToken = HandleToken(0);

    /// Create a token from its raw value.
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Check if this is the null token.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Create a token from the pointer-sized signed integer used at the
    /// native boundary.
    pub const fn from_native(raw: isize) -> Self {
        Self(raw as usize)
    }

    /// Convert into the pointer-sized signed integer used at the native
    /// boundary.
    pub const fn to_native(self) -> isize {
        self.0 as isize
    }
}

impl fmt::Display for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_id() {
        assert!(DomainId::ROOT.is_root());
        assert!(DomainId::ROOT.is_valid());
        assert!(!DomainId::new(-1).is_valid());
        assert_eq!(DomainId::from(7).to_string(), "#7");
        assert_eq!(i32::from(DomainId::new(12)), 12);
    }

    #[test]
    fn test_handle_token_native_round_trip() {
        let token = HandleToken::from_raw(0x2a);
        assert_eq!(HandleToken::from_native(token.to_native()), token);
        assert_eq!(token.to_string(), "0x2a");
        assert!(!token.is_null());
    }
}
