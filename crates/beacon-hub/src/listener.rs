//! Listeners - the callback seam between the hub and its collaborators
//!
//! A listener receives every committed change batch, synchronously, on the
//! committing thread and while the hub's commit lock is held. Consequences:
//! - a slow listener delays the committer and every thread waiting to commit
//! - a listener must not commit on the hub that is notifying it; such a call
//!   fails with [`Error::ReentrantCommit`](crate::Error::ReentrantCommit)
//! - reading the hub from inside a callback is fine and already observes
//!   the snapshot produced by the commit being dispatched
//!
//! The change slice is only borrowed for the duration of the call; listeners
//! clone whatever they need to keep.

use crate::change::Change;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Receiver of committed change batches
pub trait DatabaseListener: Send + Sync {
    /// Called once per publishing commit with the ordered change log
    fn on_changes(&self, changes: &[Change]);
}

impl<F> DatabaseListener for F
where
    F: Fn(&[Change]) + Send + Sync,
{
    fn on_changes(&self, changes: &[Change]) {
        self(changes)
    }
}

/// Handle identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

/// Registered listeners in registration order
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<(ListenerId, Arc<dyn DatabaseListener>)>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn add(&mut self, listener: Arc<dyn DatabaseListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// The listeners a dispatch will notify, fixed at the time of the call
    pub fn snapshot(&self) -> Vec<Arc<dyn DatabaseListener>> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Listener that keeps the most recent batch it was given
///
/// # Example
///
/// ```
/// use beacon_hub::{ChangeCategory, Hub, RecordingListener};
/// use std::sync::Arc;
///
/// let hub = Hub::new();
/// let listener = Arc::new(RecordingListener::new());
/// hub.add_listener_arc(listener.clone());
///
/// let mut txn = hub.writeable_database_copy();
/// txn.add_type("EmptyType").unwrap();
/// txn.commit().unwrap();
///
/// let changes = listener.last_changes();
/// assert_eq!(changes.len(), 1);
/// assert_eq!(changes[0].category(), ChangeCategory::AddType);
/// assert_eq!(listener.batch_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingListener {
    state: Mutex<RecordedState>,
}

#[derive(Debug, Default)]
struct RecordedState {
    last: Vec<Change>,
    batches: usize,
}

impl RecordingListener {
    /// Create a listener that has seen nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// The last delivered batch (empty before the first commit)
    pub fn last_changes(&self) -> Vec<Change> {
        self.state.lock().last.clone()
    }

    /// Number of batches delivered so far
    pub fn batch_count(&self) -> usize {
        self.state.lock().batches
    }
}

impl DatabaseListener for RecordingListener {
    fn on_changes(&self, changes: &[Change]) {
        let mut state = self.state.lock();
        state.last = changes.to_vec();
        state.batches += 1;
    }
}
