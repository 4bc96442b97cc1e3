//! Isolation domains.
//!
//! A domain hosts one loaded image: its export table and its private
//! services. Exactly one domain per runtime is the root domain, which also
//! owns the registry of isolated domains.

pub mod context;
pub mod lifecycle;

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use isobridge_core::error::{DomainError, Result};
use isobridge_core::DomainId;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use uuid::Uuid;

pub use lifecycle::{DomainLifecycle, DomainState};

use crate::export::{EntryPoint, ExportTable};
use crate::handle::ObjectRef;
use crate::loader::DomainImage;
use crate::registry::RootState;

/// Marker object a domain hands to the root domain to identify itself.
struct RegistrationMarker;

impl fmt::Display for RegistrationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("registration marker")
    }
}

/// An isolation domain.
pub struct Domain {
    name: String,
    image: PathBuf,
    instance: Uuid,
    id: OnceCell<DomainId>,
    lifecycle: RwLock<DomainLifecycle>,
    exports: ExportTable,
    services: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
    export_cache: DashMap<(DomainId, String), EntryPoint>,
    root: Weak<Domain>,
    root_state: Option<RootState>,
}

impl Domain {
    pub(crate) fn new_root(image: &Path, loaded: DomainImage, state: RootState) -> Arc<Self> {
        let domain = Self::build("root".to_string(), image, loaded, Weak::new(), Some(state));
        // Root never registers; its id is fixed.
        let _ = domain.id.set(DomainId::ROOT);
        Arc::new(domain)
    }

    pub(crate) fn new_isolated(root: &Arc<Domain>, image: &Path, loaded: DomainImage) -> Arc<Self> {
        let instance = Uuid::new_v4();
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "domain".to_string());
        let name = format!("{}-{}", stem, &instance.simple().to_string()[..8]);
        let mut domain = Self::build(name, image, loaded, Arc::downgrade(root), None);
        domain.instance = instance;
        Arc::new(domain)
    }

    #[cfg(test)]
    pub(crate) fn detached(name: &str, loaded: DomainImage) -> Arc<Self> {
        Arc::new(Self::build(
            name.to_string(),
            Path::new(name),
            loaded,
            Weak::new(),
            None,
        ))
    }

    fn build(
        name: String,
        image: &Path,
        loaded: DomainImage,
        root: Weak<Domain>,
        root_state: Option<RootState>,
    ) -> Self {
        Self {
            name,
            image: image.to_path_buf(),
            instance: Uuid::new_v4(),
            id: OnceCell::new(),
            lifecycle: RwLock::new(DomainLifecycle::new()),
            exports: loaded.exports,
            services: RwLock::new(loaded.services),
            export_cache: DashMap::new(),
            root,
            root_state,
        }
    }

    /// The domain's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The image the domain was loaded from.
    pub fn image(&self) -> &Path {
        &self.image
    }

    /// A tag unique to this domain instance.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Whether this is the root domain.
    pub fn is_root(&self) -> bool {
        self.root_state.is_some()
    }

    /// The id of this domain, if it has one yet.
    pub fn id(&self) -> Option<DomainId> {
        self.id.get().copied()
    }

    /// The id of this domain, registering with the root domain on first use.
    ///
    /// Registration happens at most once. The domain enters the root domain
    /// carrying a marker object tagged with itself; root recovers the caller
    /// from the marker and allocates the id.
    pub fn self_id(self: &Arc<Self>) -> Result<DomainId> {
        self.id
            .get_or_try_init(|| {
                let root = self.root_domain()?;
                let marker = ObjectRef::owned(self, Arc::new(RegistrationMarker));
                root.enter(|| root.register_caller(&marker))
            })
            .copied()
    }

    /// Register the domain that produced `marker`.
    fn register_caller(&self, marker: &ObjectRef) -> Result<DomainId> {
        let state = self.root_state()?;
        let caller = marker.owning_domain().ok_or_else(|| {
            DomainError::RegistrationFailed("marker carries no live domain".to_string())
        })?;
        state.registry.register(&caller)
    }

    /// The root domain of this domain's runtime.
    pub fn root_domain(self: &Arc<Self>) -> Result<Arc<Domain>> {
        if self.is_root() {
            return Ok(Arc::clone(self));
        }
        self.root
            .upgrade()
            .ok_or_else(|| DomainError::RuntimeGone.into())
    }

    /// Whether this domain belongs to the runtime rooted at `root`.
    pub fn belongs_to(self: &Arc<Self>, root: &Arc<Domain>) -> bool {
        if self.is_root() {
            Arc::ptr_eq(self, root)
        } else {
            std::ptr::eq(self.root.as_ptr(), Arc::as_ptr(root))
        }
    }

    pub(crate) fn root_state(&self) -> Result<&RootState> {
        self.root_state
            .as_ref()
            .ok_or_else(|| DomainError::RootOnly.into())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> DomainState {
        self.lifecycle.read().state()
    }

    /// Whether the domain accepts calls.
    pub fn is_active(&self) -> bool {
        self.lifecycle.read().can_accept_calls()
    }

    /// A snapshot of the lifecycle.
    pub fn lifecycle(&self) -> DomainLifecycle {
        self.lifecycle.read().clone()
    }

    pub(crate) fn transition_to(&self, state: DomainState) -> bool {
        self.lifecycle.write().transition_to(state)
    }

    pub(crate) fn record_call(&self) {
        self.lifecycle.write().increment_calls();
    }

    /// The exports published by the domain's image.
    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    /// The domain's services downcast to `T`.
    ///
    /// `None` if the domain has no services, they are of another type, or
    /// the domain has been torn down.
    pub fn services<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let services = self.services.read().as_ref().map(Arc::clone)?;
        services.downcast::<T>().ok()
    }

    pub(crate) fn export_cache(&self) -> &DashMap<(DomainId, String), EntryPoint> {
        &self.export_cache
    }

    /// Finish tearing the domain down.
    pub(crate) fn teardown(&self) {
        self.transition_to(DomainState::Unloaded);
        let services = self.services.write().take();
        self.export_cache.clear();
        drop(services);
        tracing::debug!(domain = %self.name, "Domain torn down");
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.name)
            .field("id", &self.id.get())
            .field("state", &self.state())
            .field("image", &self.image)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> DomainImage {
        DomainImage::new(ExportTable::new("test::exports")).with_services(String::from("engine"))
    }

    #[test]
    fn test_enter_nests_and_restores() {
        let a = Domain::detached("a", image());
        let b = Domain::detached("b", image());

        assert!(context::entered().is_none());
        a.enter(|| {
            assert!(Arc::ptr_eq(&context::entered().unwrap(), &a));
            b.enter(|| {
                assert!(Arc::ptr_eq(&context::entered().unwrap(), &b));
            });
            assert!(Arc::ptr_eq(&context::entered().unwrap(), &a));
        });
        assert!(context::entered().is_none());
    }

    #[test]
    fn test_enter_restores_after_panic() {
        let a = Domain::detached("a", image());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            a.enter(|| panic!("inside"));
        }));
        assert!(result.is_err());
        assert!(context::entered().is_none());
    }

    #[test]
    fn test_services_and_teardown() {
        let a = Domain::detached("a", image());
        assert_eq!(a.services::<String>().unwrap().as_str(), "engine");
        assert!(a.services::<u32>().is_none());
        assert!(a.is_active());

        a.transition_to(DomainState::Unloading);
        assert!(!a.is_active());
        a.teardown();
        assert_eq!(a.state(), DomainState::Unloaded);
        assert!(a.services::<String>().is_none());
    }

    #[test]
    fn test_detached_domain_cannot_register() {
        let a = Domain::detached("a", image());
        let err = a.self_id().unwrap_err();
        assert!(err.to_string().contains("no longer available"));
        assert!(a.id().is_none());
    }
}
