//! # Type catalog trait.
//!
//! Provides [`TypeCatalog`] the lookup/validation oracle an engine consults
//! before it accepts a subscription (and, optionally, a publish).
//!
//! ## Rules
//! - Calls are **synchronous** and made from the caller's task, never from the dispatcher.
//! - `get_type` returns `Ok(None)` for an unknown pair; `Err` is reserved for backend failures.
//! - Durable storage is the implementor's concern.

use std::sync::Arc;

use crate::error::CatalogError;

use super::descriptor::TypeDescriptor;

/// Registry of known `(source_id, name)` message types.
pub trait TypeCatalog: Send + Sync + 'static {
    /// Registers (or replaces) a type and returns the stored descriptor.
    fn register_type(&self, descriptor: TypeDescriptor) -> Result<TypeDescriptor, CatalogError>;

    /// Returns every registered type.
    fn get_types(&self) -> Result<Vec<TypeDescriptor>, CatalogError>;

    /// Returns the types registered under `source_id` (empty if none).
    fn get_types_by_source(&self, source_id: &str) -> Result<Vec<TypeDescriptor>, CatalogError>;

    /// Looks up a single type.
    fn get_type(&self, source_id: &str, name: &str) -> Result<Option<TypeDescriptor>, CatalogError>;
}

impl<T: TypeCatalog + ?Sized> TypeCatalog for Arc<T> {
    fn register_type(&self, descriptor: TypeDescriptor) -> Result<TypeDescriptor, CatalogError> {
        (**self).register_type(descriptor)
    }

    fn get_types(&self) -> Result<Vec<TypeDescriptor>, CatalogError> {
        (**self).get_types()
    }

    fn get_types_by_source(&self, source_id: &str) -> Result<Vec<TypeDescriptor>, CatalogError> {
        (**self).get_types_by_source(source_id)
    }

    fn get_type(&self, source_id: &str, name: &str) -> Result<Option<TypeDescriptor>, CatalogError> {
        (**self).get_type(source_id, name)
    }
}
