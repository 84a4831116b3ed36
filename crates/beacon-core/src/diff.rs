//! Property-level diffing of stored records
//!
//! Two versions of a record are compared over their declared field sets
//! ([`Bean::properties`](crate::Bean::properties)). The result lists one
//! [`PropertyChange`] per property whose value differs, in the old record's
//! property order followed by properties only the new record declares. A
//! property declared on one side only compares as [`Value::Null`] on the
//! other.

use crate::{Instance, Value, ValueMap};
use serde::{Deserialize, Serialize};

/// One changed property of a modified instance
///
/// A descriptor does not point back at the record it describes; the new
/// record travels alongside it as the change's instance value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// Property name
    pub name: String,
    /// Value before the modification
    pub old_value: Value,
    /// Value after the modification
    pub new_value: Value,
}

impl PropertyChange {
    /// Create a new descriptor
    pub fn new(
        name: impl Into<String>,
        old_value: impl Into<Value>,
        new_value: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

/// Diff two property sets
pub fn diff_properties(old: &ValueMap, new: &ValueMap) -> Vec<PropertyChange> {
    let mut changes = Vec::new();

    for (name, old_value) in old {
        let new_value = match new.get(name) {
            Some(value) if value.structural_eq(old_value) => continue,
            Some(value) => value.clone(),
            None if old_value.is_null() => continue,
            None => Value::Null,
        };
        changes.push(PropertyChange::new(
            name.as_str(),
            old_value.clone(),
            new_value,
        ));
    }

    for (name, new_value) in new {
        if !old.contains_key(name) && !new_value.is_null() {
            changes.push(PropertyChange::new(
                name.as_str(),
                Value::Null,
                new_value.clone(),
            ));
        }
    }

    changes
}

/// Diff two versions of a stored record
pub fn diff_instances(old: &Instance, new: &Instance) -> Vec<PropertyChange> {
    if old.ptr_eq(new) {
        return Vec::new();
    }
    diff_properties(&old.properties(), &new.properties())
}
