//! # Isobridge Core
//!
//! `isobridge_core` provides the building blocks shared by every isobridge
//! crate: the error hierarchy, identifier types, the trait implemented by
//! everything that can sit behind a capability handle, and the configuration
//! and logging utilities.
//!
//! ## Core Principles
//!
//! 1. **Isolation domains**: several independent copies of the content engine
//!    live in one process. Each copy is a domain with its own loaded image and
//!    its own lifetime. Domain `0` is the root domain and is never unloaded.
//!
//! 2. **Opaque capability handles**: objects cross the native boundary only
//!    as integer tokens. A token wraps exactly one target until it is
//!    released.
//!
//! 3. **Tagged dispatch**: every handle target carries the domain that
//!    produced it, so a call arriving in the wrong domain can be re-invoked
//!    where the object actually lives.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all isobridge components
//! - **id**: Domain and handle identifiers
//! - **traits**: The `HandleTarget` trait
//! - **utils**: Configuration and logging

pub mod error;
pub mod id;
pub mod traits;
pub mod utils;

pub use error::{Error, Result};
pub use id::{DomainId, HandleToken};
pub use traits::HandleTarget;
pub use utils::{init_logging, BridgeConfig, LogLevel};
