//! # In-memory type catalog.
//!
//! [`InMemoryCatalog`] keeps descriptors in a `source_id → name → descriptor`
//! map behind a `RwLock`. Listing order is deterministic (sorted by source id,
//! then name).
//!
//! ## Rules
//! - Source ids and names must be non-empty and URL-safe (`A-Z a-z 0-9 . _ ~ -`).
//! - The heartbeat source id is reserved and cannot be registered.
//! - Re-registering a pair replaces its property list.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::error::CatalogError;
use crate::messages::HEARTBEAT_SOURCE_ID;

use super::{TypeCatalog, TypeDescriptor};

type TypeMap = BTreeMap<String, BTreeMap<String, TypeDescriptor>>;

/// Thread-safe catalog backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    types: RwLock<TypeMap>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TypeCatalog for InMemoryCatalog {
    fn register_type(&self, descriptor: TypeDescriptor) -> Result<TypeDescriptor, CatalogError> {
        check_identifier("source_id", &descriptor.source_id)?;
        check_identifier("name", &descriptor.name)?;
        if descriptor.source_id == HEARTBEAT_SOURCE_ID {
            return Err(CatalogError::ReservedSource(descriptor.source_id));
        }

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        types
            .entry(descriptor.source_id.clone())
            .or_default()
            .insert(descriptor.name.clone(), descriptor.clone());

        tracing::debug!(
            source_id = %descriptor.source_id,
            name = %descriptor.name,
            properties = descriptor.property_type_list.len(),
            "type registered"
        );
        Ok(descriptor)
    }

    fn get_types(&self) -> Result<Vec<TypeDescriptor>, CatalogError> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        Ok(types.values().flat_map(|by_name| by_name.values().cloned()).collect())
    }

    fn get_types_by_source(&self, source_id: &str) -> Result<Vec<TypeDescriptor>, CatalogError> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        Ok(types
            .get(source_id)
            .map(|by_name| by_name.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_type(&self, source_id: &str, name: &str) -> Result<Option<TypeDescriptor>, CatalogError> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        Ok(types.get(source_id).and_then(|by_name| by_name.get(name)).cloned())
    }
}

fn check_identifier(field: &'static str, value: &str) -> Result<(), CatalogError> {
    let url_safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
    if value.is_empty() || !value.chars().all(url_safe) {
        return Err(CatalogError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
