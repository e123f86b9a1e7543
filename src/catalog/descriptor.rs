use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::messages::Message;

/// Declared property of a message type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyType {
    /// Property name.
    pub name: String,
}

/// Registered `(source_id, name)` schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    /// Producer that owns the type.
    pub source_id: String,
    /// Type name within the source.
    pub name: String,
    /// Property names a message of this type carries.
    #[serde(default)]
    pub property_type_list: Vec<PropertyType>,
}

/// Event type descriptor.
pub type EventType = TypeDescriptor;
/// Action type descriptor.
pub type ActionType = TypeDescriptor;

impl TypeDescriptor {
    /// Creates a descriptor without declared properties.
    pub fn new(source_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            property_type_list: Vec::new(),
        }
    }

    /// Declares one more property.
    #[inline]
    pub fn with_property_type(mut self, name: impl Into<String>) -> Self {
        self.property_type_list.push(PropertyType { name: name.into() });
        self
    }

    /// Returns true if `property` is declared by this type.
    pub fn declares(&self, property: &str) -> bool {
        self.property_type_list.iter().any(|p| p.name == property)
    }

    /// Checks that `msg` carries exactly the declared properties (any order).
    pub(crate) fn check_properties<M: Message>(&self, msg: &M) -> Result<(), ValidationError> {
        if let Some(extra) = msg.properties().iter().find(|p| !self.declares(&p.name)) {
            return Err(ValidationError::UnknownProperty {
                source_id: self.source_id.clone(),
                name: self.name.clone(),
                property: extra.name.clone(),
            });
        }

        let missing = self
            .property_type_list
            .iter()
            .find(|pt| !msg.properties().iter().any(|p| p.name == pt.name));
        if let Some(pt) = missing {
            return Err(ValidationError::MissingProperty {
                source_id: self.source_id.clone(),
                name: self.name.clone(),
                property: pt.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new("Foo", "Bar")
            .with_property_type("Property1")
            .with_property_type("Property2")
    }

    #[test]
    fn test_matching_properties_pass_in_any_order() {
        let ev = Event::new("Foo", "Bar")
            .with_property("Property2", "b")
            .with_property("Property1", "a");
        assert!(descriptor().check_properties(&ev).is_ok());
    }

    #[test]
    fn test_undeclared_property_is_rejected() {
        let ev = Event::new("Foo", "Bar")
            .with_property("Property1", "a")
            .with_property("Property2", "b")
            .with_property("Other", "c");
        let err = descriptor().check_properties(&ev).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownProperty { ref property, .. } if property == "Other"));
    }

    #[test]
    fn test_missing_property_is_rejected() {
        let ev = Event::new("Foo", "Bar").with_property("Property1", "a");
        let err = descriptor().check_properties(&ev).unwrap_err();
        assert!(matches!(err, ValidationError::MissingProperty { ref property, .. } if property == "Property2"));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(descriptor()).unwrap();
        assert_eq!(json["sourceId"], "Foo");
        assert_eq!(json["propertyTypeList"][1]["name"], "Property2");
    }
}
