//! Resolving operation names to entry points in a given domain.

use std::sync::Arc;

use isobridge_core::{DomainId, Result};
use tracing::{debug, trace};

use super::table::EntryPoint;
use crate::domain::Domain;

/// Resolve `name` in domain `domain_id`, as seen from `caller`.
///
/// - A negative id never resolves.
/// - The caller's own id is looked up in its own export table.
/// - The root domain resolves isolated ids through its registry and caches
///   the result.
/// - An isolated caller asking for the root domain forwards into root and
///   caches the result under `(0, name)`.
/// - An isolated caller asking for another isolated domain always asks root
///   and keeps no cache of its own.
pub fn resolve_export(
    caller: &Arc<Domain>,
    domain_id: DomainId,
    name: &str,
) -> Result<Option<EntryPoint>> {
    if !domain_id.is_valid() {
        debug!(domain = %domain_id, name, "Rejected export lookup for invalid domain id");
        return Ok(None);
    }

    let own_id = caller.self_id()?;
    if domain_id == own_id {
        return Ok(local_entry(caller, own_id, name));
    }

    if caller.is_root() {
        return Ok(resolve_from_root(caller, domain_id, name));
    }

    let root = caller.root_domain()?;
    if domain_id.is_root() {
        let key = (DomainId::ROOT, name.to_string());
        if let Some(cached) = caller.export_cache().get(&key) {
            return Ok(Some(cached.value().clone()));
        }

        let resolved = root.enter(|| resolve_export(&root, DomainId::ROOT, name))?;
        if let Some(entry) = &resolved {
            caller.export_cache().insert(key, entry.clone());
        }
        return Ok(resolved);
    }

    trace!(from = %own_id, to = %domain_id, name, "Forwarding export lookup to root");
    root.enter(|| resolve_export(&root, domain_id, name))
}

fn local_entry(domain: &Arc<Domain>, id: DomainId, name: &str) -> Option<EntryPoint> {
    domain
        .exports()
        .get(name)
        .map(|export| EntryPoint::new(id, domain, export.clone()))
}

fn resolve_from_root(root: &Arc<Domain>, domain_id: DomainId, name: &str) -> Option<EntryPoint> {
    let key = (domain_id, name.to_string());
    if let Some(cached) = root.export_cache().get(&key) {
        return Some(cached.value().clone());
    }

    let state = root.root_state().ok()?;
    let target = state.registry.lookup(domain_id)?;
    let entry = local_entry(&target, domain_id, name)?;

    trace!(domain = %domain_id, name, "Caching export");
    root.export_cache().insert(key.clone(), entry.clone());

    // An unload after the lookup may have flushed before this insert.
    if state.registry.lookup(domain_id).is_none() {
        root.export_cache().remove(&key);
        return None;
    }
    Some(entry)
}

/// Drop every cached entry point into `domain_id` held by `domain`.
pub(crate) fn flush_cache_for(domain: &Domain, domain_id: DomainId) {
    domain
        .export_cache()
        .retain(|(cached_id, _), _| *cached_id != domain_id);
}
