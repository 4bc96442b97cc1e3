//! Error types for the isobridge system.
//!
//! The errors are organized by subsystem, with each subsystem having its own
//! error type. The root error type, `Error`, wraps any of the
//! subsystem-specific errors so the boundary layer can capture every failure
//! uniformly.

use crate::id::{DomainId, HandleToken};
use thiserror::Error;

/// Root error type for the isobridge system.
#[derive(Debug, Error)]
pub enum Error {
    /// Isolation domain errors
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Capability handle errors
    #[error("Handle error: {0}")]
    Handle(#[from] HandleError),

    /// Export resolution errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Cross-domain redirection errors
    #[error("Redirect error: {0}")]
    Redirect(#[from] RedirectError),

    /// Component activation errors
    #[error("Activation error: {0}")]
    Activation(#[from] ActivationError),

    /// Content engine errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An argument received across the boundary was malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A panic caught at the native boundary
    #[error("Panic: {0}")]
    Panic(String),
}

/// Errors related to isolation domains.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No live domain is registered under the given id
    #[error("Domain not found: {0}")]
    NotFound(DomainId),

    /// The domain exists but is unloading or already gone
    #[error("Domain unavailable: {0}")]
    Unavailable(String),

    /// The operation may only run in the root domain
    #[error("Operation requires the root domain")]
    RootOnly,

    /// Loading a domain image failed
    #[error("Failed to load domain image: {0}")]
    LoadFailed(String),

    /// The id allocation counter cannot produce another positive id
    #[error("Domain id space exhausted")]
    IdSpaceExhausted,

    /// Self-registration could not discover the calling domain
    #[error("Could not determine the calling domain: {0}")]
    RegistrationFailed(String),

    /// The runtime that owns the domain has been dropped
    #[error("Isolation runtime is no longer available")]
    RuntimeGone,
}

/// Errors related to capability handles.
#[derive(Debug, Error)]
pub enum HandleError {
    /// The token is null
    #[error("Null handle")]
    Null,

    /// The token is not currently allocated (never allocated or already released)
    #[error("Handle not allocated: {0}")]
    NotAllocated(HandleToken),

    /// The handle target is not of the expected kind
    #[error("Handle {token} does not refer to a {expected}")]
    TypeMismatch {
        /// The offending token
        token: HandleToken,

        /// The expected target kind
        expected: &'static str,
    },
}

/// Errors related to export resolution.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The operation is not published by the domain
    #[error("Export not found: {name} in domain {domain}")]
    NotFound {
        /// The domain that was searched
        domain: DomainId,

        /// The requested operation name
        name: String,
    },

    /// A domain id that can never be valid
    #[error("Invalid domain id: {0}")]
    InvalidDomain(i32),

    /// Two exports were published under the same name
    #[error("Duplicate export: {0}")]
    Duplicate(String),
}

/// Errors related to cross-domain redirection.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// Redirection nested deeper than the configured bound
    #[error("Redirection of '{operation}' exceeded depth {max_depth}")]
    DepthExceeded {
        /// The operation being redirected
        operation: String,

        /// The configured bound
        max_depth: u32,
    },
}

/// Errors related to component activation.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// A required pointer argument was null
    #[error("Null argument: {0}")]
    NullArgument(&'static str),

    /// The reserved argument was not null
    #[error("Reserved argument must be null")]
    ReservedNotNull,

    /// The component type is not known
    #[error("Could not load type '{0}'")]
    TypeLoad(String),

    /// The method is not exported by the component type
    #[error("Method not found: {type_name}.{method}")]
    MissingMethod {
        /// The component type
        type_name: String,

        /// The requested method
        method: String,
    },

    /// The export does not match the requested calling convention
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Errors reported by the content engine.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The bundle could not be found or read
    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    /// The bundle manifest is malformed
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    /// The object is not present in any loaded bundle
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// The engine has not been initialized
    #[error("Content engine not initialized")]
    NotInitialized,

    /// The image's pixel format cannot be encoded
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// The image holds fewer texel bytes than its mip chain needs
    #[error("Incomplete image data: {0}")]
    IncompleteImage(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration source
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    /// Failed to parse the configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration is semantically invalid
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Numeric codes reported by the component activation entry point.
pub mod hresult {
    /// Success.
    pub const S_OK: i32 = 0;

    /// Unspecified failure.
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

    /// Invalid pointer (null argument).
    pub const E_POINTER: i32 = 0x8000_4003_u32 as i32;

    /// One or more arguments are invalid.
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;

    /// Type could not be loaded.
    pub const COR_E_TYPELOAD: i32 = 0x8013_1522_u32 as i32;

    /// Method could not be found.
    pub const COR_E_MISSINGMETHOD: i32 = 0x8013_1513_u32 as i32;

    /// Operation is not valid for the target.
    pub const COR_E_INVALIDOPERATION: i32 = 0x8013_1509_u32 as i32;
}

impl Error {
    /// The numeric code reported for this error by the component activation
    /// entry point.
    pub fn hresult(&self) -> i32 {
        match self {
            Self::Activation(ActivationError::NullArgument(_)) => hresult::E_POINTER,
            Self::Activation(ActivationError::ReservedNotNull) => hresult::E_INVALIDARG,
            Self::Activation(ActivationError::TypeLoad(_)) => hresult::COR_E_TYPELOAD,
            Self::Activation(ActivationError::MissingMethod { .. }) => {
                hresult::COR_E_MISSINGMETHOD
            }
            Self::Activation(ActivationError::InvalidOperation(_)) => {
                hresult::COR_E_INVALIDOPERATION
            }
            Self::Export(ExportError::NotFound { .. }) => hresult::COR_E_MISSINGMETHOD,
            Self::InvalidArgument(_) => hresult::E_INVALIDARG,
            _ => hresult::E_FAIL,
        }
    }

    /// Whether the error means the target domain could not be reached.
    ///
    /// Such failures are reported through sentinel values instead of being
    /// captured as errors.
    pub fn is_domain_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Domain(
                DomainError::Unavailable(_) | DomainError::NotFound(_) | DomainError::RuntimeGone
            )
        )
    }
}

/// Result type for isobridge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: Error = DomainError::NotFound(DomainId::new(3)).into();
        assert_eq!(err.to_string(), "Domain error: Domain not found: #3");

        let err: Error = HandleError::NotAllocated(HandleToken::from_raw(17)).into();
        assert_eq!(err.to_string(), "Handle error: Handle not allocated: 0x11");
    }

    #[test]
    fn test_activation_codes() {
        let err: Error = ActivationError::NullArgument("type_name").into();
        assert_eq!(err.hresult(), hresult::E_POINTER);

        let err: Error = ActivationError::ReservedNotNull.into();
        assert_eq!(err.hresult(), hresult::E_INVALIDARG);

        let err: Error = ActivationError::MissingMethod {
            type_name: "isobridge::exports".into(),
            method: "nope".into(),
        }
        .into();
        assert_eq!(err.hresult(), hresult::COR_E_MISSINGMETHOD);
        assert!(err.hresult() < 0);

        let err = Error::Panic("boom".into());
        assert_eq!(err.hresult(), hresult::E_FAIL);
    }

    #[test]
    fn test_domain_unavailable_classification() {
        let err: Error = DomainError::Unavailable("unloading".into()).into();
        assert!(err.is_domain_unavailable());

        let err: Error = DomainError::IdSpaceExhausted.into();
        assert!(!err.is_domain_unavailable());
    }
}
