//! Snapshot building and change resolution for commits
//!
//! The hub drives a commit; this module holds the pure parts of it:
//!
//! - [`build_database`]: fold a transaction's touched types onto a snapshot
//! - [`resolve_changes`]: bind each staged change to the final state of its
//!   type incarnation
//!
//! # Design
//!
//! - Building is O(types): the new snapshot starts as a copy of the map of
//!   `Arc<Type>` and only touched names are replaced or dropped
//! - A touched type whose overlay carries no edits is left as it is in the
//!   snapshot being built on, so an unedited overlay never churns an `Arc`
//! - Nothing here can fail; every fallible check happens before building

use crate::change::{Change, StagedChange};
use crate::snapshot::Database;
use crate::types::Type;
use crate::writeable_type::TypeOverlay;
use beacon_core::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitResult {
    /// Revision of the hub's current snapshot after the commit
    pub revision: u64,
    /// Number of changes delivered to listeners
    pub change_count: usize,
    /// Number of listeners the batch was delivered to
    pub listeners_notified: usize,
}

impl CommitResult {
    /// Result of a commit that had nothing to publish
    pub fn unchanged(revision: u64) -> Self {
        Self {
            revision,
            ..Default::default()
        }
    }

    /// Whether the commit published a new snapshot
    pub fn published(&self) -> bool {
        self.change_count > 0
    }
}

/// Build the snapshot that results from applying `slots` onto `onto`
///
/// Fills in `generations` for every live overlay. For a live overlay that
/// is skipped because it carries no edits, the generation resolves to the
/// type as it stands in `onto`.
pub(crate) fn build_database(
    onto: &Database,
    slots: &IndexMap<String, TypeOverlay>,
    generations: &mut [Option<Arc<Type>>],
    revision: u64,
) -> Database {
    let mut types = onto.types_map().clone();

    for (name, overlay) in slots {
        if overlay.is_removed() {
            types.shift_remove(name);
            continue;
        }

        let finalized = if overlay.is_modified() {
            let finalized = overlay.finalize();
            types.insert(name.clone(), Arc::clone(&finalized));
            finalized
        } else {
            match types.get(name) {
                Some(current) => Arc::clone(current),
                None => overlay.finalize(),
            }
        };

        if let Some(slot) = generations.get_mut(overlay.generation()) {
            *slot = Some(finalized);
        }
    }

    Database::from_parts(types, revision)
}

/// Turn the staged log into the ordered batch handed to listeners
pub(crate) fn resolve_changes(
    log: Vec<StagedChange>,
    generations: &[Option<Arc<Type>>],
) -> Vec<Change> {
    log.into_iter()
        .map(|staged| {
            let change_type = generations
                .get(staged.generation)
                .and_then(|t| t.clone())
                .unwrap_or_else(|| Arc::new(Type::new(staged.type_name.clone())));
            staged.resolve(change_type)
        })
        .collect()
}
