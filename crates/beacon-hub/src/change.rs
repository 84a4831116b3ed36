//! Change events delivered to listeners on commit

use crate::types::Type;
use beacon_core::{Instance, PropertyChange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The kind of mutation a [`Change`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeCategory {
    /// A type was created
    AddType,
    /// A type and all of its instances were removed
    RemoveType,
    /// An instance was added to a type
    AddInstance,
    /// An instance was replaced by a new value
    ModifyInstance,
    /// An instance was removed from a type
    RemoveInstance,
}

impl ChangeCategory {
    /// Whether the change targets a single instance
    pub fn is_instance_level(&self) -> bool {
        matches!(
            self,
            ChangeCategory::AddInstance
                | ChangeCategory::ModifyInstance
                | ChangeCategory::RemoveInstance
        )
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeCategory::AddType => "ADD_TYPE",
            ChangeCategory::RemoveType => "REMOVE_TYPE",
            ChangeCategory::AddInstance => "ADD_INSTANCE",
            ChangeCategory::ModifyInstance => "MODIFY_INSTANCE",
            ChangeCategory::RemoveInstance => "REMOVE_INSTANCE",
        };
        f.write_str(name)
    }
}

/// One committed mutation
///
/// Changes are handed to listeners as one ordered batch per commit, in the
/// order the mutations were staged. `change_type` is the type as it stands
/// after the commit; for a type removed by the commit it is the last state
/// the transaction saw before removing it.
#[derive(Debug, Clone)]
pub struct Change {
    category: ChangeCategory,
    change_type: Arc<Type>,
    instance_key: Option<String>,
    instance_value: Option<Instance>,
    modified_properties: Option<Vec<PropertyChange>>,
}

impl Change {
    /// Kind of mutation
    pub fn category(&self) -> ChangeCategory {
        self.category
    }

    /// The type this change applies to
    pub fn change_type(&self) -> &Arc<Type> {
        &self.change_type
    }

    /// Name of the type this change applies to
    pub fn type_name(&self) -> &str {
        self.change_type.name()
    }

    /// Key of the affected instance; `None` for type-level changes
    pub fn instance_key(&self) -> Option<&str> {
        self.instance_key.as_deref()
    }

    /// New value for add/modify, removed value for remove; `None` for
    /// type-level changes
    pub fn instance_value(&self) -> Option<&Instance> {
        self.instance_value.as_ref()
    }

    /// Property deltas; present only for [`ChangeCategory::ModifyInstance`]
    pub fn modified_properties(&self) -> Option<&[PropertyChange]> {
        self.modified_properties.as_deref()
    }
}

/// A change as recorded while staging, before the final type is known
///
/// `generation` identifies the incarnation of the type inside the
/// transaction: removing a type and adding it again starts a new one.
#[derive(Debug, Clone)]
pub(crate) struct StagedChange {
    pub category: ChangeCategory,
    pub type_name: String,
    pub generation: usize,
    pub instance_key: Option<String>,
    pub instance_value: Option<Instance>,
    pub modified_properties: Option<Vec<PropertyChange>>,
}

impl StagedChange {
    pub fn type_level(category: ChangeCategory, type_name: &str, generation: usize) -> Self {
        Self {
            category,
            type_name: type_name.to_string(),
            generation,
            instance_key: None,
            instance_value: None,
            modified_properties: None,
        }
    }

    pub fn instance_level(
        category: ChangeCategory,
        type_name: &str,
        generation: usize,
        key: &str,
        value: Instance,
    ) -> Self {
        Self {
            category,
            type_name: type_name.to_string(),
            generation,
            instance_key: Some(key.to_string()),
            instance_value: Some(value),
            modified_properties: None,
        }
    }

    pub fn with_modified_properties(mut self, properties: Vec<PropertyChange>) -> Self {
        self.modified_properties = Some(properties);
        self
    }

    /// Bind the change to the final state of its type
    pub fn resolve(self, change_type: Arc<Type>) -> Change {
        Change {
            category: self.category,
            change_type,
            instance_key: self.instance_key,
            instance_value: self.instance_value,
            modified_properties: self.modified_properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::Value;

    #[test]
    fn test_category_levels() {
        assert!(!ChangeCategory::AddType.is_instance_level());
        assert!(!ChangeCategory::RemoveType.is_instance_level());
        assert!(ChangeCategory::AddInstance.is_instance_level());
        assert!(ChangeCategory::ModifyInstance.is_instance_level());
        assert!(ChangeCategory::RemoveInstance.is_instance_level());
        assert_eq!(ChangeCategory::ModifyInstance.to_string(), "MODIFY_INSTANCE");
    }

    #[test]
    fn test_resolve_type_level() {
        let change = StagedChange::type_level(ChangeCategory::AddType, "EmptyType", 0)
            .resolve(Arc::new(Type::new("EmptyType")));

        assert_eq!(change.category(), ChangeCategory::AddType);
        assert_eq!(change.type_name(), "EmptyType");
        assert!(change.instance_key().is_none());
        assert!(change.instance_value().is_none());
        assert!(change.modified_properties().is_none());
    }

    #[test]
    fn test_resolve_modify() {
        let change = StagedChange::instance_level(
            ChangeCategory::ModifyInstance,
            "TypeTwo",
            0,
            "Alice",
            Instance::new(Value::from("value2")),
        )
        .with_modified_properties(vec![PropertyChange::new("value", "value1", "value2")])
        .resolve(Arc::new(Type::new("TypeTwo")));

        assert_eq!(change.instance_key(), Some("Alice"));
        assert_eq!(change.modified_properties().map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_category_ron_roundtrip() {
        let text = ron::to_string(&ChangeCategory::RemoveInstance).unwrap();
        let back: ChangeCategory = ron::from_str(&text).unwrap();
        assert_eq!(back, ChangeCategory::RemoveInstance);
    }
}
