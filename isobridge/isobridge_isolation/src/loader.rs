//! Loading domain images.
//!
//! A domain image is whatever a freshly created domain starts with: the export
//! table it publishes and its private services (for the bridge, its own copy
//! of the content engine). The runtime asks a [`DomainLoader`] for a new image
//! every time it creates a domain, so no state is shared between domains
//! unless the loader shares it deliberately.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use isobridge_core::Result;

use crate::domain::Domain;
use crate::export::ExportTable;

/// A loaded domain image.
pub struct DomainImage {
    /// The operations the image publishes.
    pub exports: ExportTable,

    /// Private per-domain state.
    pub services: Option<Arc<dyn Any + Send + Sync>>,
}

impl DomainImage {
    /// Create an image without services.
    pub fn new(exports: ExportTable) -> Self {
        Self {
            exports,
            services: None,
        }
    }

    /// Attach per-domain services.
    pub fn with_services<S: Any + Send + Sync>(mut self, services: S) -> Self {
        self.services = Some(Arc::new(services));
        self
    }
}

/// Produces domain images.
pub trait DomainLoader: Send + Sync {
    /// Load a fresh image.
    ///
    /// Called once for the root domain and once for every isolated domain.
    /// Each call must produce independent services.
    fn load(&self, image: &Path) -> Result<DomainImage>;

    /// Bring up a freshly created isolated domain.
    ///
    /// Runs inside `domain` once it has an id and before the id is returned
    /// to the caller. A failure unloads the domain again.
    fn started(&self, _domain: &Arc<Domain>) -> Result<()> {
        Ok(())
    }
}

/// A loader backed by a function.
pub struct FnLoader<F>(F);

impl<F> FnLoader<F>
where
    F: Fn(&Path) -> Result<DomainImage> + Send + Sync,
{
    /// Wrap a function as a loader.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DomainLoader for FnLoader<F>
where
    F: Fn(&Path) -> Result<DomainImage> + Send + Sync,
{
    fn load(&self, image: &Path) -> Result<DomainImage> {
        (self.0)(image)
    }
}
