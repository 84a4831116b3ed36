//! Journal - audit trail of committed change batches
//!
//! A [`Journal`] is a [`DatabaseListener`]: register it on a hub and every
//! publishing commit appends one [`JournalEntry`]. Entries hold owned,
//! serializable copies of the changes, so the journal outlives the snapshots
//! it describes and can be exported as-is.

use beacon_core::{PropertyChange, ValueMap};
use beacon_hub::{Change, ChangeCategory, DatabaseListener};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Owned copy of one committed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Kind of mutation
    pub category: ChangeCategory,
    /// Type the change applied to
    pub type_name: String,
    /// Affected instance, for instance-level changes
    pub instance_key: Option<String>,
    /// Properties of the new (or removed) instance value
    pub instance_value: Option<ValueMap>,
    /// Property deltas of a modification
    pub modified_properties: Option<Vec<PropertyChange>>,
}

impl ChangeRecord {
    /// Copy a change out of a dispatched batch
    pub fn from_change(change: &Change) -> Self {
        Self {
            category: change.category(),
            type_name: change.type_name().to_string(),
            instance_key: change.instance_key().map(str::to_string),
            instance_value: change.instance_value().map(|i| i.properties()),
            modified_properties: change.modified_properties().map(<[_]>::to_vec),
        }
    }

    /// Whether this record concerns the given instance
    pub fn is_for_instance(&self, type_name: &str, key: &str) -> bool {
        self.type_name == type_name && self.instance_key.as_deref() == Some(key)
    }
}

/// One recorded commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position of the batch in the journal, starting at 0
    ///
    /// Sequences keep counting across evictions, not across [`Journal::clear`].
    pub sequence: u64,
    /// Wall-clock time the batch was received
    pub recorded_at: DateTime<Utc>,
    /// The batch, in commit order
    pub changes: Vec<ChangeRecord>,
}

/// Configuration for the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Whether recording is enabled
    pub recording_enabled: bool,
    /// Maximum number of entries to keep (0 = unlimited)
    pub max_entries: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            recording_enabled: true,
            max_entries: 0, // Unlimited
        }
    }
}

/// Statistics about the journal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalStats {
    /// Number of retained entries
    pub total_entries: usize,
    /// Number of retained change records
    pub change_count: usize,
    /// Sequence of the oldest retained entry
    pub first_sequence: Option<u64>,
    /// Sequence of the newest retained entry
    pub last_sequence: Option<u64>,
}

#[derive(Debug, Default)]
struct JournalState {
    config: JournalConfig,
    entries: Vec<JournalEntry>,
    next_sequence: u64,
}

/// Recorder for committed change batches
///
/// # Example
///
/// ```
/// use beacon_hub::Hub;
/// use beacon_journal::Journal;
/// use std::sync::Arc;
///
/// let hub = Hub::new();
/// let journal = Arc::new(Journal::new());
/// hub.add_listener_arc(journal.clone());
///
/// let mut txn = hub.writeable_database_copy();
/// txn.add_type("EmptyType").unwrap();
/// txn.commit().unwrap();
///
/// assert_eq!(journal.len(), 1);
/// assert_eq!(journal.entries()[0].changes[0].type_name, "EmptyType");
/// ```
#[derive(Debug, Default)]
pub struct Journal {
    state: Mutex<JournalState>,
}

impl Journal {
    /// Create a journal that records immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: JournalConfig) -> Self {
        Self {
            state: Mutex::new(JournalState {
                config,
                ..Default::default()
            }),
        }
    }

    /// Start recording
    pub fn start_recording(&self) {
        self.state.lock().config.recording_enabled = true;
    }

    /// Stop recording; batches delivered meanwhile are dropped
    pub fn stop_recording(&self) {
        self.state.lock().config.recording_enabled = false;
    }

    /// Check if recording is enabled
    pub fn is_recording(&self) -> bool {
        self.state.lock().config.recording_enabled
    }

    /// Record one batch
    pub fn record(&self, changes: &[Change]) {
        let mut state = self.state.lock();
        if !state.config.recording_enabled {
            return;
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.push(JournalEntry {
            sequence,
            recorded_at: Utc::now(),
            changes: changes.iter().map(ChangeRecord::from_change).collect(),
        });
        trace!(sequence, changes = changes.len(), "journal entry recorded");

        let max = state.config.max_entries;
        if max > 0 && state.entries.len() > max {
            let excess = state.entries.len() - max;
            state.entries.drain(0..excess);
        }
    }

    /// Copy of every retained entry, oldest first
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.state.lock().entries.clone()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether no entries are retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries and restart sequence numbering
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.next_sequence = 0;
    }

    /// Get statistics about the journal
    pub fn stats(&self) -> JournalStats {
        let state = self.state.lock();
        JournalStats {
            total_entries: state.entries.len(),
            change_count: state.entries.iter().map(|e| e.changes.len()).sum(),
            first_sequence: state.entries.first().map(|e| e.sequence),
            last_sequence: state.entries.last().map(|e| e.sequence),
        }
    }
}

impl DatabaseListener for Journal {
    fn on_changes(&self, changes: &[Change]) {
        self.record(changes);
    }
}
