//! WriteableType - per-type staging view inside a transaction
//!
//! A [`TypeOverlay`] records instance edits on top of the type's base
//! instance map without copying it: each edited key maps to its new value,
//! or to a removal marker. Reads merge the edits over the base on the fly.
//! At commit the overlay is finalized into an immutable [`Type`]; an overlay
//! without edits finalizes to the very `Arc` it was seeded from.
//!
//! [`WriteableType`] is the borrowed, mutable face of an overlay handed out
//! by [`WriteableDatabase`](crate::WriteableDatabase). It appends to the
//! transaction's change log as it stages mutations.

use crate::change::{ChangeCategory, StagedChange};
use crate::error::{Error, Result};
use crate::types::Type;
use beacon_core::{diff_instances, IndexMap, Instance, PropertyChange};
use std::sync::Arc;
use tracing::trace;

/// Copy-on-write instance overlay for one type incarnation
#[derive(Debug, Clone)]
pub(crate) struct TypeOverlay {
    name: String,
    /// Incarnation number within the transaction
    generation: usize,
    /// Base instances; `None` for a type created in this transaction
    base: Option<Arc<Type>>,
    /// Edited keys: `Some` is the new value, `None` marks a removal
    edits: IndexMap<String, Option<Instance>>,
    /// Set once the transaction removes this incarnation
    removed: bool,
}

impl TypeOverlay {
    /// Overlay a type that exists in the base snapshot
    pub fn seeded(base: Arc<Type>, generation: usize) -> Self {
        Self {
            name: base.name().to_string(),
            generation,
            base: Some(base),
            edits: IndexMap::new(),
            removed: false,
        }
    }

    /// Overlay a type created in this transaction
    pub fn created(name: &str, generation: usize) -> Self {
        Self {
            name: name.to_string(),
            generation,
            base: None,
            edits: IndexMap::new(),
            removed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Whether committing this live overlay changes anything
    pub fn is_modified(&self) -> bool {
        self.base.is_none() || !self.edits.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Instance> {
        match self.edits.get(key) {
            Some(edit) => edit.as_ref(),
            None => self.base.as_ref().and_then(|b| b.get_instance(key)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Merged instance map: base order first, then keys added here
    pub fn merged(&self) -> IndexMap<String, Instance> {
        let mut merged = IndexMap::new();

        if let Some(base) = &self.base {
            for (key, instance) in base.instances() {
                match self.edits.get(key) {
                    Some(Some(edited)) => {
                        merged.insert(key.clone(), edited.clone());
                    }
                    Some(None) => {}
                    None => {
                        merged.insert(key.clone(), instance.clone());
                    }
                }
            }
        }

        for (key, edit) in &self.edits {
            if let Some(instance) = edit {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), instance.clone());
                }
            }
        }

        merged
    }

    pub fn len(&self) -> usize {
        if self.edits.is_empty() {
            return self.base.as_ref().map_or(0, |b| b.len());
        }
        self.merged().len()
    }

    /// Freeze the current merged view into an immutable type
    pub fn finalize(&self) -> Arc<Type> {
        match &self.base {
            Some(base) if self.edits.is_empty() => Arc::clone(base),
            _ => Arc::new(Type::with_instances(self.name.clone(), self.merged())),
        }
    }

    fn put(&mut self, key: &str, instance: Instance) {
        self.edits.insert(key.to_string(), Some(instance));
    }

    fn remove(&mut self, key: &str) {
        let in_base = self
            .base
            .as_ref()
            .is_some_and(|b| b.contains_instance(key));
        if in_base {
            self.edits.insert(key.to_string(), None);
        } else {
            self.edits.shift_remove(key);
        }
    }
}

/// Mutable view of one type inside a [`WriteableDatabase`](crate::WriteableDatabase)
///
/// Every successful mutation is visible to reads through the same
/// transaction immediately and appends one change to the transaction's log.
/// A failed mutation changes nothing.
pub struct WriteableType<'txn> {
    overlay: &'txn mut TypeOverlay,
    log: &'txn mut Vec<StagedChange>,
}

impl<'txn> WriteableType<'txn> {
    pub(crate) fn new(overlay: &'txn mut TypeOverlay, log: &'txn mut Vec<StagedChange>) -> Self {
        Self { overlay, log }
    }

    /// Type name
    pub fn name(&self) -> &str {
        self.overlay.name()
    }

    /// Add a new instance
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already present.
    pub fn add_instance(&mut self, key: &str, value: impl Into<Instance>) -> Result<()> {
        if self.overlay.contains(key) {
            return Err(Error::duplicate_key(self.overlay.name(), key));
        }

        let value = value.into();
        trace!(type_name = %self.overlay.name(), key, "staging instance add");
        self.overlay.put(key, value.clone());
        self.log.push(StagedChange::instance_level(
            ChangeCategory::AddInstance,
            self.overlay.name(),
            self.overlay.generation(),
            key,
            value,
        ));
        Ok(())
    }

    /// Replace an instance, diffing the old and new values property by
    /// property
    ///
    /// Fails with [`Error::KeyNotFound`] if the key is absent.
    pub fn modify_instance(&mut self, key: &str, value: impl Into<Instance>) -> Result<()> {
        let value = value.into();
        let properties = match self.overlay.get(key) {
            Some(old) => diff_instances(old, &value),
            None => return Err(Error::key_not_found(self.overlay.name(), key)),
        };
        self.stage_modify(key, value, properties);
        Ok(())
    }

    /// Replace an instance, recording the given property descriptors as-is
    ///
    /// An empty descriptor list is accepted. Fails with
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn modify_instance_with(
        &mut self,
        key: &str,
        value: impl Into<Instance>,
        properties: Vec<PropertyChange>,
    ) -> Result<()> {
        if !self.overlay.contains(key) {
            return Err(Error::key_not_found(self.overlay.name(), key));
        }
        self.stage_modify(key, value.into(), properties);
        Ok(())
    }

    fn stage_modify(&mut self, key: &str, value: Instance, properties: Vec<PropertyChange>) {
        trace!(
            type_name = %self.overlay.name(),
            key,
            changed = properties.len(),
            "staging instance modify"
        );
        self.overlay.put(key, value.clone());
        self.log.push(
            StagedChange::instance_level(
                ChangeCategory::ModifyInstance,
                self.overlay.name(),
                self.overlay.generation(),
                key,
                value,
            )
            .with_modified_properties(properties),
        );
    }

    /// Remove an instance, returning its value
    ///
    /// Fails with [`Error::KeyNotFound`] if the key is absent.
    pub fn remove_instance(&mut self, key: &str) -> Result<Instance> {
        let removed = match self.overlay.get(key) {
            Some(instance) => instance.clone(),
            None => return Err(Error::key_not_found(self.overlay.name(), key)),
        };

        trace!(type_name = %self.overlay.name(), key, "staging instance remove");
        self.overlay.remove(key);
        self.log.push(StagedChange::instance_level(
            ChangeCategory::RemoveInstance,
            self.overlay.name(),
            self.overlay.generation(),
            key,
            removed.clone(),
        ));
        Ok(removed)
    }

    /// Look up one instance in the merged view
    pub fn get_instance(&self, key: &str) -> Option<Instance> {
        self.overlay.get(key).cloned()
    }

    /// Check if an instance exists in the merged view
    pub fn contains_instance(&self, key: &str) -> bool {
        self.overlay.contains(key)
    }

    /// All instances in the merged view
    pub fn instances(&self) -> IndexMap<String, Instance> {
        self.overlay.merged()
    }

    /// Number of instances in the merged view
    pub fn len(&self) -> usize {
        self.overlay.len()
    }

    /// Whether the merged view holds no instances
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for WriteableType<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteableType")
            .field("name", &self.overlay.name())
            .field("instances", &self.overlay.len())
            .finish()
    }
}
