//! The root domain's registry of isolated domains.
//!
//! Only the root domain owns a registry. It hands out domain ids from a
//! single counter and maps them to weak references, so the registry itself
//! never keeps a domain alive. The strong reference that does is kept in the
//! root's host set until the domain is unloaded.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use isobridge_core::error::{DomainError, Result};
use isobridge_core::utils::TeardownConfig;
use isobridge_core::DomainId;

use crate::domain::Domain;
use crate::pool::TeardownPool;

/// Id allocation and lookup for isolated domains.
pub struct DomainRegistry {
    counter: AtomicI32,
    domains: DashMap<DomainId, Weak<Domain>>,
}

impl DomainRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            counter: AtomicI32::new(0),
            domains: DashMap::new(),
        }
    }

    /// Allocate the next id for `domain` and record it.
    ///
    /// Id 0 and ids that are still registered are skipped. Fails once the
    /// counter cannot produce another positive id.
    pub fn register(&self, domain: &Arc<Domain>) -> Result<DomainId> {
        loop {
            let previous = self
                .counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
                .map_err(|_| DomainError::IdSpaceExhausted)?;
            let id = DomainId::new(previous + 1);
            if id.is_root() || !id.is_valid() {
                continue;
            }

            match self.domains.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::downgrade(domain));
                    tracing::debug!(domain = %id, name = domain.name(), "Registered domain");
                    return Ok(id);
                }
                Entry::Occupied(_) => continue,
            }
        }
    }

    /// Look up a live domain.
    pub fn lookup(&self, id: DomainId) -> Option<Arc<Domain>> {
        self.domains.get(&id).and_then(|entry| entry.value().upgrade())
    }

    /// Remove an id, returning the weak reference it mapped to.
    pub fn remove(&self, id: DomainId) -> Option<Weak<Domain>> {
        self.domains.remove(&id).map(|(_, domain)| domain)
    }

    /// Ids of registered domains that are still alive, in ascending order.
    pub fn ids(&self) -> Vec<DomainId> {
        let mut ids: Vec<DomainId> = self
            .domains
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether no ids are registered.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn with_counter(value: i32) -> Self {
        Self {
            counter: AtomicI32::new(value),
            domains: DashMap::new(),
        }
    }
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// State that only the root domain holds.
pub(crate) struct RootState {
    pub(crate) registry: DomainRegistry,

    /// The strong references keeping loaded domains alive.
    pub(crate) hosted: DashMap<DomainId, Arc<Domain>>,

    pub(crate) teardown: TeardownPool,
}

impl RootState {
    pub(crate) fn new(teardown: &TeardownConfig) -> Result<Self> {
        let teardown = TeardownPool::new(teardown)
            .map_err(|e| DomainError::LoadFailed(format!("teardown pool: {}", e)))?;
        Ok(Self {
            registry: DomainRegistry::new(),
            hosted: DashMap::new(),
            teardown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::export::ExportTable;
    use crate::loader::DomainImage;

    fn detached(name: &str) -> Arc<Domain> {
        Domain::detached(name, DomainImage::new(ExportTable::new("test::exports")))
    }

    #[test]
    fn test_register_assigns_positive_ids() {
        let registry = DomainRegistry::new();
        let a = detached("a");
        let b = detached("b");

        let id_a = registry.register(&a).unwrap();
        let id_b = registry.register(&b).unwrap();
        assert_eq!(id_a, DomainId::new(1));
        assert_eq!(id_b, DomainId::new(2));
        assert!(Arc::ptr_eq(&registry.lookup(id_a).unwrap(), &a));
        assert_eq!(registry.ids(), vec![id_a, id_b]);
    }

    #[test]
    fn test_dropped_domains_are_not_listed() {
        let registry = DomainRegistry::new();
        let a = detached("a");
        let id = registry.register(&a).unwrap();
        drop(a);

        assert!(registry.lookup(id).is_none());
        assert!(registry.ids().is_empty());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_collisions_are_skipped() {
        let registry = DomainRegistry::with_counter(0);
        let a = detached("a");
        registry.domains.insert(DomainId::new(1), Arc::downgrade(&a));

        let b = detached("b");
        assert_eq!(registry.register(&b).unwrap(), DomainId::new(2));
    }

    #[test]
    fn test_exhaustion() {
        let registry = DomainRegistry::with_counter(i32::MAX - 1);
        let a = detached("a");
        assert_eq!(registry.register(&a).unwrap(), DomainId::new(i32::MAX));

        let err = registry.register(&a).unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }
}
