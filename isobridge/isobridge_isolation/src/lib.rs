//! # Isobridge Isolation
//!
//! `isobridge_isolation` runs several independent copies of a component in one
//! process and dispatches calls between them.
//!
//! Key concepts:
//!
//! 1. **Domain**: an isolated unit hosting one loaded image, with its own
//!    export table and services. Domain `0` is the root domain.
//!
//! 2. **Registry**: the root domain's id counter and id-to-domain map.
//!
//! 3. **Handle table**: opaque tokens wrapping objects tagged with the domain
//!    that produced them.
//!
//! 4. **Export resolver**: maps `(domain id, operation)` to an entry point
//!    that runs in that domain, with per-domain caches.
//!
//! 5. **Redirector**: re-invokes a handle operation inside the handle's
//!    owning domain when it is called from elsewhere.
//!
//! 6. **Teardown pool**: finishes unloading domains in the background.

pub mod domain;
pub mod export;
pub mod handle;
pub mod loader;
pub mod pool;
pub mod redirect;
pub mod registry;
pub mod runtime;

pub use domain::{Domain, DomainLifecycle, DomainState};
pub use export::{resolve_export, EntryPoint, Export, ExportTable, Signature};
pub use handle::{Affinity, HandleTable, ObjectRef};
pub use loader::{DomainImage, DomainLoader, FnLoader};
pub use pool::{PoolError, TeardownPool, TeardownStats};
pub use redirect::{Redirector, Route};
pub use registry::DomainRegistry;
pub use runtime::IsolationRuntime;
