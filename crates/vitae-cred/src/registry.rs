//! Claim type registry.
//!
//! An explicit value handed to builders and validators. Nothing global:
//! two registries in one process never see each other's registrations.

use std::collections::BTreeSet;

use vitae_core::ClaimType;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimTypeRegistry {
    types: BTreeSet<ClaimType>,
}

impl ClaimTypeRegistry {
    /// An empty registry. Nothing validates until types are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the built-in claim shapes.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(ClaimType::bloodwork_range());
        registry.register(ClaimType::protocol_adherence());
        registry.register(ClaimType::biometric_percentile());
        registry.register(ClaimType::age_over());
        registry
    }

    /// Register a type. Returns `false` if it was already present or empty.
    pub fn register(&mut self, claim_type: ClaimType) -> bool {
        if claim_type.is_empty() {
            return false;
        }
        let inserted = self.types.insert(claim_type.clone());
        if inserted {
            tracing::debug!(claim_type = %claim_type, "claim type registered");
        }
        inserted
    }

    pub fn is_registered(&self, claim_type: &ClaimType) -> bool {
        self.types.contains(claim_type)
    }

    /// Registered types, sorted by name.
    pub fn types(&self) -> Vec<ClaimType> {
        self.types.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
