//! Type catalog: the registered `(source_id, name)` schemas.
//!
//! ## Contents
//! - [`TypeCatalog`] lookup/validation trait consumed by the engine
//! - [`TypeDescriptor`], [`PropertyType`] schema types
//! - [`InMemoryCatalog`] process-local implementation

mod descriptor;
mod memory;
mod type_catalog;

pub use descriptor::{ActionType, EventType, PropertyType, TypeDescriptor};
pub use memory::InMemoryCatalog;
pub use type_catalog::TypeCatalog;
