//! The isolation runtime.
//!
//! [`IsolationRuntime`] ties the pieces together: it owns the root domain,
//! the handle table and the redirector, and implements the domain operations
//! exposed across the native boundary.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use isobridge_core::{BridgeConfig, DomainId, HandleTarget, HandleToken, Result};
use tracing::{error, info, warn};

use crate::domain::{context, Domain, DomainState};
use crate::export::resolver::flush_cache_for;
use crate::export::{resolve_export, EntryPoint};
use crate::handle::{HandleTable, ObjectRef};
use crate::loader::DomainLoader;
use crate::pool::TeardownStats;
use crate::redirect::Redirector;
use crate::registry::RootState;

/// The isolation runtime.
pub struct IsolationRuntime {
    config: BridgeConfig,
    loader: Arc<dyn DomainLoader>,
    root: Arc<Domain>,
    handles: HandleTable,
    redirector: Redirector,
}

impl IsolationRuntime {
    /// Create a runtime, loading the configured component image into the
    /// root domain.
    ///
    /// # Arguments
    ///
    /// * `config` - The bridge configuration.
    /// * `loader` - Produces the image for every domain.
    pub fn new(config: BridgeConfig, loader: Arc<dyn DomainLoader>) -> Result<Self> {
        config.validate()?;

        let image = loader.load(&config.component_image)?;
        let state = RootState::new(&config.teardown)?;
        let root = Domain::new_root(&config.component_image, image, state);
        let redirector = Redirector::new(config.redirect.max_depth);

        info!(
            image = %config.component_image.display(),
            exports = root.exports().len(),
            "Isolation runtime started"
        );

        Ok(Self {
            config,
            loader,
            root,
            handles: HandleTable::new(),
            redirector,
        })
    }

    /// The configuration the runtime was created with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The root domain.
    pub fn root(&self) -> &Arc<Domain> {
        &self.root
    }

    /// The domain the calling thread is executing in.
    ///
    /// Threads that have not entered one of this runtime's domains execute in
    /// the root domain.
    pub fn current(&self) -> Arc<Domain> {
        match context::entered() {
            Some(domain) if domain.belongs_to(&self.root) => domain,
            _ => Arc::clone(&self.root),
        }
    }

    /// Whether the calling thread is executing in the root domain.
    pub fn in_root(&self) -> bool {
        self.current().is_root()
    }

    /// The id of the current domain.
    pub fn current_id(&self) -> Result<DomainId> {
        self.current().self_id()
    }

    /// The handle table.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// The redirector.
    pub fn redirector(&self) -> &Redirector {
        &self.redirector
    }

    /// The current domain's services downcast to `T`.
    pub fn services<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.current().services::<T>()
    }

    /// Create an isolated domain from the configured component image.
    pub fn create_domain(&self) -> Result<DomainId> {
        let image = self.config.component_image.clone();
        self.create_domain_from(&image)
    }

    /// Create an isolated domain from `image`.
    ///
    /// Domains are always created by the root domain; a call from an isolated
    /// domain is re-entered in root first.
    pub fn create_domain_from(&self, image: &Path) -> Result<DomainId> {
        if !self.in_root() {
            return self.root.enter(|| self.create_domain_from(image));
        }

        let state = self.root.root_state()?;
        let loaded = self.loader.load(image)?;
        let domain = Domain::new_isolated(&self.root, image, loaded);
        let id = domain.enter(|| domain.self_id())?;

        if id.is_root() {
            error!(name = domain.name(), "Isolated domain registered with the root domain id");
            std::process::abort();
        }

        state.hosted.insert(id, Arc::clone(&domain));
        if let Err(e) = domain.enter(|| self.loader.started(&domain)) {
            warn!(domain = %id, error = %e, "Domain failed to start");
            self.unload_domain(id);
            return Err(e);
        }

        info!(domain = %id, name = domain.name(), "Created isolation domain");
        Ok(id)
    }

    /// Unload an isolated domain.
    ///
    /// Returns `false` for the root domain and for ids that are not
    /// registered, including ids that were already unloaded. The domain stops
    /// accepting calls immediately; its teardown finishes in the background.
    pub fn unload_domain(&self, id: DomainId) -> bool {
        if id.is_root() || !id.is_valid() {
            return false;
        }

        if !self.in_root() {
            return self.root.enter(|| self.unload_domain(id));
        }

        let Ok(state) = self.root.root_state() else {
            return false;
        };

        if state.registry.remove(id).is_none() {
            return false;
        }

        flush_cache_for(&self.root, id);

        let Some((_, domain)) = state.hosted.remove(&id) else {
            return true;
        };

        domain.transition_to(DomainState::Unloading);
        info!(domain = %id, name = domain.name(), "Unloading isolation domain");

        if let Err(e) = state.teardown.execute(move || domain.teardown()) {
            error!(domain = %id, error = %e, "Teardown pool unavailable, domain is released on last drop");
        }
        true
    }

    /// Ids of the live isolated domains, in ascending order.
    pub fn domain_ids(&self) -> Vec<DomainId> {
        self.root
            .root_state()
            .map(|state| state.registry.ids())
            .unwrap_or_default()
    }

    /// Look up a domain by id.
    pub fn lookup(&self, id: DomainId) -> Option<Arc<Domain>> {
        if id.is_root() {
            return Some(Arc::clone(&self.root));
        }
        self.root.root_state().ok()?.registry.lookup(id)
    }

    /// Resolve an operation in a domain, as seen from the current domain.
    pub fn resolve_export(&self, domain_id: DomainId, name: &str) -> Result<Option<EntryPoint>> {
        resolve_export(&self.current(), domain_id, name)
    }

    /// Place a target produced by the current domain in the handle table.
    pub fn alloc_local(&self, target: Arc<dyn HandleTarget>) -> HandleToken {
        let current = self.current();
        self.handles.alloc(ObjectRef::owned(&current, target))
    }

    /// Place a target usable from any domain in the handle table.
    pub fn alloc_agnostic(&self, target: Arc<dyn HandleTarget>) -> HandleToken {
        self.handles.alloc(ObjectRef::agnostic(target))
    }

    /// Run a handle operation in the domain that owns the handle.
    ///
    /// See [`Redirector::dispatch`].
    pub fn dispatch<R>(
        &self,
        token: HandleToken,
        operation: &str,
        local: impl FnOnce(&ObjectRef) -> Result<R>,
        again: impl FnOnce(&EntryPoint) -> R,
    ) -> Result<Option<R>> {
        self.redirector
            .dispatch(&self.current(), &self.handles, token, operation, local, again)
    }

    /// Run an operation in the domain named by `domain_id`.
    ///
    /// See [`Redirector::qualified`].
    pub fn qualified<R>(
        &self,
        domain_id: DomainId,
        operation: &str,
        local: impl FnOnce() -> Result<R>,
        again: impl FnOnce(&EntryPoint) -> R,
    ) -> Result<Option<R>> {
        self.redirector
            .qualified(&self.current(), domain_id, operation, local, again)
    }

    /// Drop every cached entry point.
    pub fn reset_caches(&self) {
        self.root.export_cache().clear();
        if let Ok(state) = self.root.root_state() {
            for entry in state.hosted.iter() {
                entry.value().export_cache().clear();
            }
        }
    }

    /// Wait for queued teardown jobs to finish.
    ///
    /// Returns `true` if no teardown is pending.
    pub fn drain_teardown(&self, timeout: Duration) -> bool {
        match self.root.root_state() {
            Ok(state) => state.teardown.wait_idle(timeout),
            Err(_) => true,
        }
    }

    /// Teardown pool statistics.
    pub fn teardown_stats(&self) -> TeardownStats {
        self.root
            .root_state()
            .map(|state| state.teardown.stats())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for IsolationRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationRuntime")
            .field("root", &self.root)
            .field("domains", &self.domain_ids())
            .field("handles", &self.handles.len())
            .finish()
    }
}
