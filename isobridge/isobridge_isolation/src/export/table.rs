//! Export tables and resolved entry points.
//!
//! Every loaded domain image publishes an [`ExportTable`]: the operations it
//! makes callable across the native boundary, keyed by name. Resolving a
//! name against a particular domain yields an [`EntryPoint`], which pairs the
//! export with the domain it must run in.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, Weak};

use isobridge_core::error::{DomainError, ExportError, Result};
use isobridge_core::DomainId;

use crate::domain::Domain;

/// The calling convention an export is published with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    /// A plain C-callable function with its own parameter list.
    Unmanaged,

    /// The host's default component entry signature, `(args, size) -> i32`.
    ComponentEntryPoint,

    /// A function matching the named delegate type.
    Named(&'static str),
}

/// A single published operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    name: String,
    addr: usize,
    signature: Signature,
}

impl Export {
    /// Create an export.
    ///
    /// # Arguments
    ///
    /// * `name` - The operation name.
    /// * `addr` - The address of the function implementing it.
    /// * `signature` - The calling convention of that function.
    pub fn new(name: impl Into<String>, addr: usize, signature: Signature) -> Self {
        Self {
            name: name.into(),
            addr,
            signature,
        }
    }

    /// Get the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the function address.
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Get the calling convention.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// The function address as a raw pointer.
    pub fn as_ptr(&self) -> *const c_void {
        self.addr as *const c_void
    }
}

/// The exports published by one loaded image.
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    component_type: String,
    exports: HashMap<String, Export>,
}

impl ExportTable {
    /// Create an empty table for a component type.
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            exports: HashMap::new(),
        }
    }

    /// The type name the exports are published under.
    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    /// Publish an export.
    ///
    /// # Returns
    ///
    /// `Err(ExportError::Duplicate)` if the name is already published.
    pub fn publish(&mut self, export: Export) -> Result<()> {
        if self.exports.contains_key(export.name()) {
            return Err(ExportError::Duplicate(export.name).into());
        }
        self.exports.insert(export.name.clone(), export);
        Ok(())
    }

    /// Publish an export, consuming and returning the table.
    pub fn with(mut self, export: Export) -> Result<Self> {
        self.publish(export)?;
        Ok(self)
    }

    /// Look up an export by name.
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    /// The published names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of published exports.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

/// An export bound to the domain it runs in.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    domain_id: DomainId,
    domain: Weak<Domain>,
    export: Export,
}

impl EntryPoint {
    pub(crate) fn new(domain_id: DomainId, domain: &Arc<Domain>, export: Export) -> Self {
        Self {
            domain_id,
            domain: Arc::downgrade(domain),
            export,
        }
    }

    /// The domain the entry point runs in.
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    /// The resolved export.
    pub fn export(&self) -> &Export {
        &self.export
    }

    /// The raw function pointer handed across the native boundary.
    pub fn as_ptr(&self) -> *const c_void {
        self.export.as_ptr()
    }

    /// The domain, if it is still alive.
    pub fn domain(&self) -> Option<Arc<Domain>> {
        self.domain.upgrade()
    }

    /// Run `f` inside the entry point's domain.
    ///
    /// Fails with `DomainError::Unavailable` when the domain has been dropped
    /// or is no longer active.
    pub fn invoke<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let domain = self.domain.upgrade().ok_or_else(|| {
            DomainError::Unavailable(format!("domain {} has been dropped", self.domain_id))
        })?;

        if !domain.is_active() {
            return Err(DomainError::Unavailable(format!(
                "domain {} is {}",
                self.domain_id,
                domain.state()
            ))
            .into());
        }

        domain.record_call();
        tracing::trace!(domain = %self.domain_id, export = %self.export.name, "Invoking entry point");
        Ok(domain.enter(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop() {}

    #[test]
    fn test_publish_and_lookup() {
        let table = ExportTable::new("demo::exports")
            .with(Export::new("noop", noop as usize, Signature::Unmanaged))
            .unwrap()
            .with(Export::new("main", noop as usize, Signature::ComponentEntryPoint))
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), vec!["main", "noop"]);
        assert_eq!(table.component_type(), "demo::exports");

        let export = table.get("noop").unwrap();
        assert_eq!(export.signature(), Signature::Unmanaged);
        assert_eq!(export.as_ptr() as usize, noop as usize);
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut table = ExportTable::new("demo::exports");
        table
            .publish(Export::new("noop", noop as usize, Signature::Unmanaged))
            .unwrap();
        let err = table
            .publish(Export::new("noop", 0, Signature::Named("Other")))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate export: noop"));
    }
}
