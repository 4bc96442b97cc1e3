//! The capability handle table.
//!
//! Objects never cross the native boundary directly. They are placed in the
//! [`HandleTable`] and the caller receives an opaque [`HandleToken`]. Each
//! entry remembers which domain produced the object so a call arriving in a
//! different domain can be redirected to the owner.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use isobridge_core::error::{HandleError, Result};
use isobridge_core::traits::target::downcast_arc;
use isobridge_core::{HandleTarget, HandleToken};

use crate::domain::Domain;

/// The domain an object belongs to.
#[derive(Clone)]
pub enum Affinity {
    /// The object may be used from any domain.
    Agnostic,

    /// The object was produced by the given domain.
    Domain(Weak<Domain>),
}

impl fmt::Debug for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agnostic => f.write_str("Agnostic"),
            Self::Domain(domain) => match domain.upgrade() {
                Some(domain) => write!(f, "Domain({})", domain.name()),
                None => f.write_str("Domain(<dropped>)"),
            },
        }
    }
}

/// What a handle token refers to.
#[derive(Clone)]
pub struct ObjectRef {
    affinity: Affinity,
    target: Arc<dyn HandleTarget>,
}

impl ObjectRef {
    /// Wrap a target that belongs to no domain.
    pub fn agnostic(target: Arc<dyn HandleTarget>) -> Self {
        Self {
            affinity: Affinity::Agnostic,
            target,
        }
    }

    /// Wrap a target produced by `domain`.
    pub fn owned(domain: &Arc<Domain>, target: Arc<dyn HandleTarget>) -> Self {
        Self {
            affinity: Affinity::Domain(Arc::downgrade(domain)),
            target,
        }
    }

    /// The affinity tag.
    pub fn affinity(&self) -> &Affinity {
        &self.affinity
    }

    /// The wrapped target.
    pub fn target(&self) -> &Arc<dyn HandleTarget> {
        &self.target
    }

    /// The domain that produced the target.
    ///
    /// `None` for agnostic targets and for owners that no longer exist.
    pub fn owning_domain(&self) -> Option<Arc<Domain>> {
        match &self.affinity {
            Affinity::Agnostic => None,
            Affinity::Domain(domain) => domain.upgrade(),
        }
    }

    /// Borrow the target as `T`.
    pub fn downcast_ref<T: HandleTarget>(&self) -> Option<&T> {
        self.target.as_ref().downcast_ref::<T>()
    }

    /// Get a shared `T` out of the target.
    pub fn downcast<T: HandleTarget>(&self) -> Option<Arc<T>> {
        downcast_arc::<T>(Arc::clone(&self.target))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("affinity", &self.affinity)
            .field("kind", &self.target.as_ref().kind())
            .finish()
    }
}

/// Thread-safe table of live handles.
pub struct HandleTable {
    entries: DashMap<usize, ObjectRef>,
    next_token: AtomicUsize,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_token: AtomicUsize::new(1),
        }
    }

    /// Place an object in the table and return its token.
    pub fn alloc(&self, object: ObjectRef) -> HandleToken {
        let raw = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(raw, object);
        let token = HandleToken::from_raw(raw);
        tracing::trace!(%token, "Allocated handle");
        token
    }

    /// Look up a token.
    ///
    /// Returns `None` for the null token and for tokens that were never
    /// allocated or have been released.
    pub fn resolve(&self, token: HandleToken) -> Option<ObjectRef> {
        if token.is_null() {
            return None;
        }
        self.entries.get(&token.as_raw()).map(|entry| entry.value().clone())
    }

    /// Release a token.
    ///
    /// Releasing a token that is not currently allocated is an error.
    pub fn release(&self, token: HandleToken) -> Result<ObjectRef> {
        if token.is_null() {
            return Err(HandleError::Null.into());
        }
        match self.entries.remove(&token.as_raw()) {
            Some((_, object)) => {
                tracing::trace!(%token, "Released handle");
                Ok(object)
            }
            None => Err(HandleError::NotAllocated(token).into()),
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handles are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn text(value: &str) -> ObjectRef {
        ObjectRef::agnostic(Arc::new(value.to_string()))
    }

    #[test]
    fn test_alloc_resolve_release() {
        let table = HandleTable::new();
        let token = table.alloc(text("hello"));
        assert!(!token.is_null());

        let object = table.resolve(token).unwrap();
        assert_eq!(object.target().to_string(), "hello");
        assert!(object.owning_domain().is_none());

        table.release(token).unwrap();
        assert!(table.resolve(token).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_double_release_is_error() {
        let table = HandleTable::new();
        let token = table.alloc(text("x"));
        table.release(token).unwrap();

        let err = table.release(token).unwrap_err();
        assert!(err.to_string().contains("not allocated"));
        assert!(table.release(HandleToken::NULL).is_err());
    }

    #[test]
    fn test_tokens_are_not_reused() {
        let table = HandleTable::new();
        let first = table.alloc(text("a"));
        table.release(first).unwrap();
        let second = table.alloc(text("b"));
        assert_ne!(first, second);
        assert!(table.resolve(HandleToken::NULL).is_none());
    }

    #[test]
    fn test_concurrent_alloc() {
        let table = Arc::new(HandleTable::new());
        let mut workers = Vec::new();

        for t in 0..8 {
            let table = Arc::clone(&table);
            workers.push(thread::spawn(move || {
                (0..250)
                    .map(|i| table.alloc(text(&format!("{t}-{i}"))))
                    .collect::<Vec<_>>()
            }));
        }

        let tokens: HashSet<HandleToken> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        assert_eq!(tokens.len(), 2000);
        assert_eq!(table.len(), 2000);
    }
}
