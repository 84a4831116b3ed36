//! Type - an immutable, named collection of keyed instances

use beacon_core::{IndexMap, Instance};

/// An immutable set of instances published under one type name
///
/// Types are only ever created by the commit protocol (or by seeding a hub)
/// and shared through `Arc<Type>`; an instance set is never mutated after
/// publication. A type may hold zero instances.
#[derive(Debug, Clone)]
pub struct Type {
    name: String,
    instances: IndexMap<String, Instance>,
}

impl Type {
    /// Create an empty type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: IndexMap::new(),
        }
    }

    /// Create a type holding the given instances
    pub fn with_instances(name: impl Into<String>, instances: IndexMap<String, Instance>) -> Self {
        Self {
            name: name.into(),
            instances,
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up one instance
    pub fn get_instance(&self, key: &str) -> Option<&Instance> {
        self.instances.get(key)
    }

    /// All instances, in insertion order
    pub fn instances(&self) -> &IndexMap<String, Instance> {
        &self.instances
    }

    /// Instance keys, in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Check if an instance exists
    pub fn contains_instance(&self, key: &str) -> bool {
        self.instances.contains_key(key)
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the type holds no instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
