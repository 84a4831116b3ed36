//! WriteableDatabase - copy-on-write transaction over a published snapshot
//!
//! A transaction captures the hub's current [`Database`] and stages edits in
//! a small overlay keyed by type name. Types it never touches are read
//! straight from the base snapshot. Every successful staging call appends to
//! an ordered change log, which becomes the batch listeners receive on
//! commit.
//!
//! Staging needs no synchronization: a transaction is owned by one caller
//! and only the commit talks to the hub. `commit` consumes the transaction,
//! so a transaction can never be committed twice.

use crate::change::{ChangeCategory, StagedChange};
use crate::commit::CommitResult;
use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::snapshot::Database;
use crate::types::Type;
use crate::writeable_type::{TypeOverlay, WriteableType};
use beacon_core::{IndexMap, Instance};
use indexmap::map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Everything a commit needs from a transaction
#[derive(Debug)]
pub(crate) struct StagedTransaction {
    pub base: Arc<Database>,
    /// Touched types by name; a removed type keeps its slot, flagged
    pub slots: IndexMap<String, TypeOverlay>,
    /// Frozen state per type incarnation, filled at removal or commit
    pub generations: Vec<Option<Arc<Type>>>,
    pub log: Vec<StagedChange>,
}

impl StagedTransaction {
    fn contains_type(&self, name: &str) -> bool {
        match self.slots.get(name) {
            Some(overlay) => !overlay.is_removed(),
            None => self.base.contains_type(name),
        }
    }

    /// The live overlay for `name`
    ///
    /// A visible type gets its existing overlay, or a fresh copy-on-write
    /// overlay over the base type. A type that is not visible is created
    /// and an `AddType` change is logged.
    fn live_overlay(&mut self, name: &str) -> WriteableType<'_> {
        let generation = self.generations.len();
        let StagedTransaction {
            base,
            slots,
            generations,
            log,
        } = self;

        let overlay = match slots.entry(name.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_removed() => entry.into_mut(),
            Entry::Occupied(mut entry) => {
                generations.push(None);
                log.push(StagedChange::type_level(
                    ChangeCategory::AddType,
                    name,
                    generation,
                ));
                entry.insert(TypeOverlay::created(name, generation));
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                generations.push(None);
                let overlay = match base.get_type(name) {
                    Some(seed) => TypeOverlay::seeded(Arc::clone(seed), generation),
                    None => {
                        log.push(StagedChange::type_level(
                            ChangeCategory::AddType,
                            name,
                            generation,
                        ));
                        TypeOverlay::created(name, generation)
                    }
                };
                entry.insert(overlay)
            }
        };

        WriteableType::new(overlay, log)
    }
}

/// A mutable staging copy of the registry
///
/// # Example
///
/// ```
/// use beacon_hub::{Hub, Value};
///
/// let hub = Hub::new();
///
/// let mut txn = hub.writeable_database_copy();
/// let mut servers = txn.add_type("Server").unwrap();
/// servers.add_instance("alpha", Value::from("10.0.0.1")).unwrap();
///
/// // Staged edits are visible to the transaction, not to the hub
/// assert!(txn.get_instance("Server", "alpha").is_some());
/// assert!(hub.current_database().get_type("Server").is_none());
///
/// txn.commit().unwrap();
/// assert!(hub.current_database().get_instance("Server", "alpha").is_some());
/// ```
pub struct WriteableDatabase {
    hub: Hub,
    staged: StagedTransaction,
}

impl WriteableDatabase {
    pub(crate) fn new(hub: Hub, base: Arc<Database>) -> Self {
        Self {
            hub,
            staged: StagedTransaction {
                base,
                slots: IndexMap::new(),
                generations: Vec::new(),
                log: Vec::new(),
            },
        }
    }

    /// The snapshot this transaction was copied from
    pub fn base(&self) -> &Arc<Database> {
        &self.staged.base
    }

    /// Revision of the snapshot this transaction was copied from
    pub fn base_revision(&self) -> u64 {
        self.staged.base.revision()
    }

    /// Number of changes staged so far
    pub fn change_count(&self) -> usize {
        self.staged.log.len()
    }

    /// Check if a type is visible to this transaction
    pub fn contains_type(&self, name: &str) -> bool {
        self.staged.contains_type(name)
    }

    /// Names of all types visible to this transaction
    pub fn type_names(&self) -> Vec<String> {
        let base = &self.staged.base;
        let mut names: Vec<String> = base
            .type_names()
            .filter(|name| self.contains_type(name))
            .map(str::to_string)
            .collect();
        for (name, overlay) in &self.staged.slots {
            if !overlay.is_removed() && !base.contains_type(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Look up one instance in the merged view
    pub fn get_instance(&self, type_name: &str, key: &str) -> Option<Instance> {
        match self.staged.slots.get(type_name) {
            Some(overlay) if overlay.is_removed() => None,
            Some(overlay) => overlay.get(key).cloned(),
            None => self.staged.base.get_instance(type_name, key).cloned(),
        }
    }

    /// Create a new, empty type
    ///
    /// Records an `AddType` change immediately. Fails with
    /// [`Error::TypeAlreadyExists`] if the type is already visible.
    pub fn add_type(&mut self, name: &str) -> Result<WriteableType<'_>> {
        if self.contains_type(name) {
            return Err(Error::TypeAlreadyExists(name.to_string()));
        }
        trace!(type_name = name, "staging type add");
        Ok(self.staged.live_overlay(name))
    }

    /// Remove a type and all of its instances
    ///
    /// Records a `RemoveType` change and returns the type's last staged
    /// state. Fails with [`Error::TypeNotFound`] if the type is not visible.
    pub fn remove_type(&mut self, name: &str) -> Result<Arc<Type>> {
        if !self.contains_type(name) {
            return Err(Error::TypeNotFound(name.to_string()));
        }
        if !self.staged.slots.contains_key(name) {
            self.staged.live_overlay(name);
        }

        let (generation, removed) = match self.staged.slots.get_mut(name) {
            Some(overlay) => {
                overlay.mark_removed();
                (overlay.generation(), overlay.finalize())
            }
            None => return Err(Error::TypeNotFound(name.to_string())),
        };

        trace!(type_name = name, instances = removed.len(), "staging type remove");
        self.staged.generations[generation] = Some(Arc::clone(&removed));
        self.staged.log.push(StagedChange::type_level(
            ChangeCategory::RemoveType,
            name,
            generation,
        ));
        Ok(removed)
    }

    /// Get a writeable view of a visible type
    ///
    /// Returns `None` if the type is not visible. Never creates a type and
    /// never records a change; a view over a type from the base snapshot
    /// shares the base instances until one of them is edited.
    pub fn get_writeable_type(&mut self, name: &str) -> Option<WriteableType<'_>> {
        if !self.contains_type(name) {
            return None;
        }
        Some(self.staged.live_overlay(name))
    }

    /// Get a writeable view of a type, creating the type if it is not visible
    ///
    /// Creating the type records an `AddType` change.
    pub fn find_or_add_writeable_type(&mut self, name: &str) -> WriteableType<'_> {
        if !self.contains_type(name) {
            trace!(type_name = name, "staging type add");
        }
        self.staged.live_overlay(name)
    }

    /// Commit the staged changes to the hub this transaction came from
    ///
    /// Uses the hub's configured commit timeout, if any. See
    /// [`Hub`](crate::Hub) for the commit protocol.
    pub fn commit(self) -> Result<CommitResult> {
        let timeout = self.hub.config().commit_timeout();
        self.hub.commit_staged(self.staged, timeout)
    }

    /// Commit, giving up with [`Error::CommitTimedOut`] if the commit lock
    /// cannot be acquired within `timeout`
    ///
    /// The timeout bounds only the wait for the lock. Once acquired, the
    /// commit publishes and notifies listeners before returning `Ok`, however
    /// long that takes.
    pub fn commit_with_timeout(self, timeout: Duration) -> Result<CommitResult> {
        self.hub.commit_staged(self.staged, Some(timeout))
    }
}

impl std::fmt::Debug for WriteableDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteableDatabase")
            .field("base_revision", &self.base_revision())
            .field("touched_types", &self.staged.slots.len())
            .field("changes", &self.staged.log.len())
            .finish()
    }
}
