//! Cross-domain invocation redirection.
//!
//! An operation that receives a handle may be called in a domain that did
//! not produce the object behind it. The redirector resolves the handle,
//! decides where the operation has to run and, for a foreign owner, re-invokes
//! the same operation inside that domain through its published entry point.
//!
//! Redirection is bounded per thread: once `max_depth` nested hops are in
//! flight, a further hop fails instead of recursing.

use std::cell::Cell;
use std::sync::Arc;

use isobridge_core::error::{RedirectError, Result};
use isobridge_core::{DomainId, HandleToken};
use tracing::{debug, warn};

use crate::domain::Domain;
use crate::export::{resolve_export, EntryPoint};
use crate::handle::{Affinity, HandleTable, ObjectRef};

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Where an operation on a handle has to run.
#[derive(Debug)]
pub enum Route {
    /// The token does not refer to a live handle.
    NotFound,

    /// The object is agnostic or belongs to the current domain.
    Local(ObjectRef),

    /// The object belongs to another live domain.
    Foreign {
        /// The resolved object.
        object: ObjectRef,

        /// The owning domain.
        owner: Arc<Domain>,
    },

    /// The object's owner is gone.
    Unresolvable(ObjectRef),
}

/// Routes handle operations to the domain that owns the handle.
#[derive(Debug, Clone)]
pub struct Redirector {
    max_depth: u32,
}

impl Redirector {
    /// Create a redirector allowing `max_depth` nested hops per thread.
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// The configured hop bound.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// The number of hops in flight on the calling thread.
    pub fn current_depth() -> u32 {
        DEPTH.with(Cell::get)
    }

    /// Decide where an operation on `token` has to run.
    pub fn route(&self, current: &Arc<Domain>, handles: &HandleTable, token: HandleToken) -> Route {
        let Some(object) = handles.resolve(token) else {
            return Route::NotFound;
        };

        let owner = match object.affinity() {
            Affinity::Agnostic => None,
            Affinity::Domain(owner) => Some(owner.upgrade()),
        };

        match owner {
            None => Route::Local(object),
            Some(Some(owner)) if Arc::ptr_eq(&owner, current) => Route::Local(object),
            Some(Some(owner)) => Route::Foreign { object, owner },
            Some(None) => Route::Unresolvable(object),
        }
    }

    /// Run `operation` on `token`.
    ///
    /// `local` runs the operation in the current domain. `again` re-invokes
    /// the operation through the owner's entry point and runs inside the
    /// owner. Returns `Ok(None)` when the token is unknown or its owner
    /// cannot be reached.
    ///
    /// # Arguments
    ///
    /// * `current` - The domain the call arrived in.
    /// * `handles` - The handle table the token belongs to.
    /// * `token` - The handle argument.
    /// * `operation` - The export name of the operation.
    /// * `local` - The operation body.
    /// * `again` - Re-invocation through the owner's entry point.
    pub fn dispatch<R>(
        &self,
        current: &Arc<Domain>,
        handles: &HandleTable,
        token: HandleToken,
        operation: &str,
        local: impl FnOnce(&ObjectRef) -> Result<R>,
        again: impl FnOnce(&EntryPoint) -> R,
    ) -> Result<Option<R>> {
        match self.route(current, handles, token) {
            Route::NotFound => {
                debug!(%token, operation, "Handle not found");
                Ok(None)
            }
            Route::Local(object) => local(&object).map(Some),
            Route::Foreign { owner, .. } => match owner.id() {
                Some(owner_id) => self.hop(current, owner_id, operation, again),
                None => {
                    warn!(%token, operation, owner = owner.name(), "Owning domain has no id");
                    Ok(None)
                }
            },
            Route::Unresolvable(_) => {
                warn!(%token, operation, "Owning domain is gone");
                Ok(None)
            }
        }
    }

    /// Run an operation that names its target domain explicitly.
    ///
    /// If `domain_id` is the current domain `local` runs here, otherwise the
    /// operation is re-invoked inside the named domain.
    pub fn qualified<R>(
        &self,
        current: &Arc<Domain>,
        domain_id: DomainId,
        operation: &str,
        local: impl FnOnce() -> Result<R>,
        again: impl FnOnce(&EntryPoint) -> R,
    ) -> Result<Option<R>> {
        if domain_id == current.self_id()? {
            return local().map(Some);
        }
        self.hop(current, domain_id, operation, again)
    }

    fn hop<R>(
        &self,
        current: &Arc<Domain>,
        target: DomainId,
        operation: &str,
        again: impl FnOnce(&EntryPoint) -> R,
    ) -> Result<Option<R>> {
        let entry = match resolve_export(current, target, operation) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                warn!(domain = %target, operation, "No entry point to redirect to");
                return Ok(None);
            }
            Err(e) if e.is_domain_unavailable() => {
                warn!(domain = %target, operation, error = %e, "Redirect target unavailable");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if Self::current_depth() >= self.max_depth {
            return Err(RedirectError::DepthExceeded {
                operation: operation.to_string(),
                max_depth: self.max_depth,
            }
            .into());
        }

        let _depth = DepthGuard::enter();
        debug!(from = current.name(), to = %target, operation, "Redirecting call");

        match entry.invoke(|| again(&entry)) {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.is_domain_unavailable() => {
                warn!(domain = %target, operation, error = %e, "Redirect target unavailable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for Redirector {
    fn default() -> Self {
        Self::new(1)
    }
}
