//! Error types used by the message bus engine and its type catalog.
//!
//! This module defines three error enums:
//!
//! - [`BusError`]: errors returned by the public engine operations.
//! - [`ValidationError`]: a subscription or publish referenced a type the catalog rejects.
//! - [`CatalogError`]: failures raised by a [`TypeCatalog`](crate::TypeCatalog) implementation.
//!
//! All of them provide `as_label` for logs/metrics. Dropped messages are **not**
//! errors: "no subscribers" and "subscriber full" are counted in [`Stats`](crate::Stats), never returned.

use thiserror::Error;

/// # Errors produced by engine operations.
///
/// Every error is returned to the immediate caller; the engine never retries.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// Operation attempted before [`Engine::start`](crate::Engine::start).
    #[error("engine not started")]
    EngineNotStarted,

    /// Cancellation was observed, or the engine has already been torn down.
    #[error("engine stopped")]
    EngineStopped,

    /// [`Engine::start`](crate::Engine::start) called on an engine that already ran.
    #[error("engine already started")]
    AlreadyStarted,

    /// Unsubscribe referenced a source id with no registered subscriptions.
    #[error("source id not found: {source_id}")]
    UnknownSourceId {
        /// The source id that was looked up.
        source_id: String,
    },

    /// Unsubscribe referenced a name with no registered subscriptions under its source.
    #[error("name not found: {source_id}/{name}")]
    UnknownName {
        /// The source id that was looked up.
        source_id: String,
        /// The name that was looked up.
        name: String,
    },

    /// The subscriber registry does not exist (engine never started or already stopped).
    #[error("subscriber registry not initialized")]
    RegistryNotInitialized,

    /// The referenced type failed catalog validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use messagebus::BusError;
    ///
    /// assert_eq!(BusError::EngineStopped.as_label(), "bus_engine_stopped");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::EngineNotStarted => "bus_engine_not_started",
            BusError::EngineStopped => "bus_engine_stopped",
            BusError::AlreadyStarted => "bus_already_started",
            BusError::UnknownSourceId { .. } => "bus_unknown_source_id",
            BusError::UnknownName { .. } => "bus_unknown_name",
            BusError::RegistryNotInitialized => "bus_registry_not_initialized",
            BusError::Validation(e) => e.as_label(),
        }
    }

    /// Indicates whether the error means the engine is not (or no longer) running.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            BusError::EngineNotStarted | BusError::EngineStopped | BusError::RegistryNotInitialized
        )
    }
}

/// # Type validation failures.
///
/// Raised by subscribe (every requested name must be a registered type) and,
/// when [`Config::validate_on_publish`](crate::Config::validate_on_publish) is set, by publish.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The catalog lookup itself failed.
    #[error("unknown source or name {source_id}/{name}: {source}")]
    Catalog {
        /// Requested source id.
        source_id: String,
        /// Requested name.
        name: String,
        /// Underlying catalog failure.
        #[source]
        source: CatalogError,
    },

    /// The catalog has no type registered under this pair.
    #[error("{kind} name not found: {source_id}/{name}")]
    NameNotFound {
        /// Payload vocabulary (`"event"` or `"action"`).
        kind: &'static str,
        /// Requested source id.
        source_id: String,
        /// Requested name.
        name: String,
    },

    /// Subscribe without names, but the source has no registered types.
    #[error("no types registered for source {source_id}")]
    NoRegisteredTypes {
        /// Requested source id.
        source_id: String,
    },

    /// A published property is not declared by the type.
    #[error("property {property:?} is not declared by {source_id}/{name}")]
    UnknownProperty {
        /// Message source id.
        source_id: String,
        /// Message name.
        name: String,
        /// Offending property name.
        property: String,
    },

    /// A property declared by the type is absent from the published message.
    #[error("property {property:?} required by {source_id}/{name} is missing")]
    MissingProperty {
        /// Message source id.
        source_id: String,
        /// Message name.
        name: String,
        /// Missing property name.
        property: String,
    },
}

impl ValidationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationError::Catalog { .. } => "validation_unknown_source_or_name",
            ValidationError::NameNotFound { kind: "action", .. } => {
                "validation_action_name_not_found"
            }
            ValidationError::NameNotFound { .. } => "validation_event_name_not_found",
            ValidationError::NoRegisteredTypes { .. } => "validation_no_registered_types",
            ValidationError::UnknownProperty { .. } => "validation_unknown_property",
            ValidationError::MissingProperty { .. } => "validation_missing_property",
        }
    }
}

/// # Errors produced by a type catalog.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Source id or name is empty or contains characters that are not URL-safe.
    #[error("invalid {field}: {value:?} (allowed: A-Z a-z 0-9 . _ ~ -)")]
    InvalidIdentifier {
        /// Which field was rejected (`"source_id"` or `"name"`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The source id is reserved for engine heartbeats.
    #[error("source id {0:?} is reserved")]
    ReservedSource(String),

    /// Storage backend failure (external catalog implementations).
    #[error("catalog backend error: {0}")]
    Backend(String),
}

impl CatalogError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CatalogError::InvalidIdentifier { .. } => "catalog_invalid_identifier",
            CatalogError::ReservedSource(_) => "catalog_reserved_source",
            CatalogError::Backend(_) => "catalog_backend",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_converts_into_bus_error() {
        let err: BusError = ValidationError::NoRegisteredTypes {
            source_id: "Foo".into(),
        }
        .into();
        assert!(matches!(err, BusError::Validation(_)));
        assert_eq!(err.as_label(), "validation_no_registered_types");
        assert_eq!(err.to_string(), "no types registered for source Foo");
    }

    #[test]
    fn test_name_not_found_label_follows_kind() {
        let action = ValidationError::NameNotFound {
            kind: "action",
            source_id: "Foo".into(),
            name: "Bar".into(),
        };
        let event = ValidationError::NameNotFound {
            kind: "event",
            source_id: "Foo".into(),
            name: "Bar".into(),
        };
        assert_eq!(action.as_label(), "validation_action_name_not_found");
        assert_eq!(event.as_label(), "validation_event_name_not_found");
        assert_eq!(action.to_string(), "action name not found: Foo/Bar");
    }

    #[test]
    fn test_catalog_error_is_exposed_as_source() {
        use std::error::Error as _;

        let err = ValidationError::Catalog {
            source_id: "Foo".into(),
            name: "Bar".into(),
            source: CatalogError::Backend("disk gone".into()),
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("catalog backend error: disk gone"));
    }

    #[test]
    fn test_lifecycle_errors() {
        assert!(BusError::EngineNotStarted.is_lifecycle());
        assert!(BusError::RegistryNotInitialized.is_lifecycle());
        assert!(
            !BusError::UnknownSourceId {
                source_id: "x".into()
            }
            .is_lifecycle()
        );
    }
}
