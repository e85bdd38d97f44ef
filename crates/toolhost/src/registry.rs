//! Capability registry: the set of tools and resources a server exposes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::capability::Capability;
use crate::types::{CapabilityKind, CapabilitySummary, RegistryError};

/// Registration-ordered collection of capabilities with unique names.
///
/// Populated during startup, then sealed when a session becomes ready.
/// After sealing the registry is only read, so lookups take no lock.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: Vec<Capability>,
    index: HashMap<String, usize>,
    sealed: AtomicBool,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list, failing on the first rejected entry.
    pub fn from_capabilities<I>(capabilities: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Capability>,
    {
        let mut registry = Self::new();
        for capability in capabilities {
            registry.register(capability)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        if *self.sealed.get_mut() {
            return Err(RegistryError::Sealed(capability.name().to_string()));
        }
        if self.index.contains_key(capability.name()) {
            return Err(RegistryError::DuplicateName(capability.name().to_string()));
        }

        tracing::debug!("Registered {} {}", capability.kind(), capability.name());
        self.index
            .insert(capability.name().to_string(), self.entries.len());
        self.entries.push(capability);
        Ok(())
    }

    /// Refuse any further registration. Returns `true` if this call did the sealing.
    pub fn seal(&self) -> bool {
        let newly_sealed = !self.sealed.swap(true, Ordering::SeqCst);
        if newly_sealed {
            tracing::info!("Capability registry sealed with {} entries", self.entries.len());
        }
        newly_sealed
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    pub fn lookup(&self, name: &str) -> Result<&Capability, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Lookup restricted to one kind; a name registered under the other kind is not found.
    pub fn lookup_kind(&self, name: &str, kind: CapabilityKind) -> Result<&Capability, RegistryError> {
        self.lookup(name)
            .ok()
            .filter(|c| c.kind() == kind)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Summaries of every capability, in registration order.
    pub fn list(&self) -> Vec<CapabilitySummary> {
        self.entries.iter().map(Capability::summary).collect()
    }

    pub fn list_kind(&self, kind: CapabilityKind) -> Vec<CapabilitySummary> {
        self.iter_kind(kind).map(Capability::summary).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.entries.iter()
    }

    pub fn iter_kind(&self, kind: CapabilityKind) -> impl Iterator<Item = &Capability> {
        self.entries.iter().filter(move |c| c.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
