//! Hub - owner of the current snapshot and the commit protocol
//!
//! A hub publishes one immutable [`Database`] at a time. Readers load it
//! without locking; writers stage edits in a [`WriteableDatabase`] and commit
//! them back through the hub, which serializes commits, swaps in the new
//! snapshot and notifies listeners.
//!
//! ## Commit protocol
//!
//! 1. A commit issued from a listener while this hub is dispatching fails
//!    with [`Error::ReentrantCommit`]
//! 2. A transaction with no staged changes returns at once; nothing is
//!    published and no listener is called
//! 3. The commit lock is acquired, bounded by the timeout if one applies
//! 4. A transaction built on an older revision is handled per
//!    [`StaleCommitPolicy`]
//! 5. The new snapshot is built at revision + 1
//! 6. It is published with a single pointer swap
//! 7. The ordered change batch is delivered to every registered listener,
//!    on the committing thread, in registration order
//! 8. The lock is released
//!
//! Once step 5 starts the commit cannot fail.

use crate::commit::{build_database, resolve_changes, CommitResult};
use crate::config::{HubConfig, StaleCommitPolicy};
use crate::error::{Error, Result};
use crate::listener::{DatabaseListener, ListenerId, ListenerRegistry};
use crate::snapshot::Database;
use crate::writeable::{StagedTransaction, WriteableDatabase};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{debug, warn};

/// Handle to a registry hub
///
/// Cloning a `Hub` is cheap and every clone addresses the same registry.
/// There is no global instance: construct one and pass it to whoever needs
/// it.
///
/// ```
/// use beacon_hub::{Hub, Value};
///
/// let hub = Hub::new();
/// assert_eq!(hub.revision(), 0);
///
/// let mut txn = hub.writeable_database_copy();
/// txn.add_type("OneInstanceType")
///     .unwrap()
///     .add_instance("Alice", Value::from("Alice"))
///     .unwrap();
/// let result = txn.commit().unwrap();
///
/// assert_eq!(result.revision, 1);
/// assert_eq!(result.change_count, 2);
/// assert_eq!(hub.current_database().get_type("OneInstanceType").unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Hub {
    shared: Arc<HubShared>,
}

struct HubShared {
    /// Currently published snapshot
    current: ArcSwap<Database>,
    /// Serializes commits; publish and dispatch happen under it
    commit_lock: Mutex<()>,
    /// Thread currently inside a commit, for reentrancy detection
    committer: Mutex<Option<ThreadId>>,
    listeners: Mutex<ListenerRegistry>,
    config: HubConfig,
}

/// Marks the current thread as the committer until dropped
struct CommitterGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> CommitterGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *slot.lock() = Some(thread);
        Self { slot }
    }
}

impl Drop for CommitterGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

impl Hub {
    /// Create a hub holding an empty database at revision 0
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create an empty hub with a specific configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self::with_database(Database::new(), config)
    }

    /// Create a hub whose first snapshot is `database`
    ///
    /// Seeding publishes nothing to listeners; there are none yet.
    pub fn with_database(database: Database, config: HubConfig) -> Self {
        Self {
            shared: Arc::new(HubShared {
                current: ArcSwap::from_pointee(database),
                commit_lock: Mutex::new(()),
                committer: Mutex::new(None),
                listeners: Mutex::new(ListenerRegistry::default()),
                config,
            }),
        }
    }

    /// The currently published snapshot
    ///
    /// Never blocks. Calls between two commits return the same `Arc`.
    pub fn current_database(&self) -> Arc<Database> {
        self.shared.current.load_full()
    }

    /// Start a transaction on top of the current snapshot
    pub fn writeable_database_copy(&self) -> WriteableDatabase {
        WriteableDatabase::new(self.clone(), self.current_database())
    }

    /// Revision of the current snapshot
    pub fn revision(&self) -> u64 {
        self.shared.current.load().revision()
    }

    /// Hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    /// Register a listener for every future commit
    pub fn add_listener(&self, listener: impl DatabaseListener + 'static) -> ListenerId {
        self.add_listener_arc(Arc::new(listener))
    }

    /// Register a shared listener, keeping a handle to it on the caller side
    pub fn add_listener_arc(&self, listener: Arc<dyn DatabaseListener>) -> ListenerId {
        let id = self.shared.listeners.lock().add(listener);
        debug!(listener = %id, "listener registered");
        id
    }

    /// Unregister a listener; returns `false` if it was not registered
    ///
    /// A commit already dispatching keeps delivering to the listeners it
    /// started with.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.shared.listeners.lock().remove(id);
        if removed {
            debug!(listener = %id, "listener removed");
        }
        removed
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    pub(crate) fn commit_staged(
        &self,
        staged: StagedTransaction,
        timeout: Option<Duration>,
    ) -> Result<CommitResult> {
        let me = thread::current().id();
        if *self.shared.committer.lock() == Some(me) {
            warn!("commit rejected: called from a listener of the same hub");
            return Err(Error::ReentrantCommit);
        }

        if staged.log.is_empty() {
            debug!("nothing staged, skipping publish");
            return Ok(CommitResult::unchanged(self.revision()));
        }

        let _lock = match timeout {
            Some(timeout) => match self.shared.commit_lock.try_lock_for(timeout) {
                Some(guard) => guard,
                None => {
                    warn!(?timeout, "commit rejected: lock wait timed out");
                    return Err(Error::CommitTimedOut(timeout));
                }
            },
            None => self.shared.commit_lock.lock(),
        };
        let _committer = CommitterGuard::enter(&self.shared.committer, me);

        let StagedTransaction {
            base,
            slots,
            mut generations,
            log,
        } = staged;

        let current = self.shared.current.load_full();
        if current.revision() != base.revision() {
            match self.shared.config.stale_commit_policy() {
                StaleCommitPolicy::Reject => {
                    warn!(
                        base_revision = base.revision(),
                        current_revision = current.revision(),
                        "commit rejected: stale transaction"
                    );
                    return Err(Error::StaleTransaction {
                        base_revision: base.revision(),
                        current_revision: current.revision(),
                    });
                }
                StaleCommitPolicy::LastWriterWins => {
                    debug!(
                        base_revision = base.revision(),
                        current_revision = current.revision(),
                        touched_types = slots.len(),
                        "applying stale transaction onto current snapshot"
                    );
                }
            }
        }

        let revision = current.revision() + 1;
        let next = build_database(&current, &slots, &mut generations, revision);
        self.shared.current.store(Arc::new(next));

        let changes = resolve_changes(log, &generations);
        let listeners = self.shared.listeners.lock().snapshot();
        debug!(
            revision,
            changes = changes.len(),
            listeners = listeners.len(),
            "published snapshot"
        );

        for listener in &listeners {
            listener.on_changes(&changes);
        }

        Ok(CommitResult {
            revision,
            change_count: changes.len(),
            listeners_notified: listeners.len(),
        })
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("revision", &self.revision())
            .field("listeners", &self.listener_count())
            .field("config", &self.shared.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, ChangeCategory};
    use crate::listener::RecordingListener;
    use beacon_core::{PropertyChange, Value, ValueMap};
    use std::sync::mpsc;

    fn person(name: &str, other: &str) -> ValueMap {
        let mut props = ValueMap::new();
        props.insert("Name".to_string(), Value::from(name));
        props.insert("Other".to_string(), Value::from(other));
        props
    }

    /// Hub with `TypeTwo` holding `Alice` and `Bob`, plus a recorder
    /// registered after the seeding commit
    fn type_two_hub() -> (Hub, Arc<RecordingListener>) {
        let hub = Hub::new();
        let mut txn = hub.writeable_database_copy();
        let mut wt = txn.add_type("TypeTwo").unwrap();
        wt.add_instance("Alice", person("Alice", "value1")).unwrap();
        wt.add_instance("Bob", person("Bob", "value1")).unwrap();
        txn.commit().unwrap();

        let listener = Arc::new(RecordingListener::new());
        hub.add_listener_arc(listener.clone());
        (hub, listener)
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    #[test]
    fn test_add_empty_type() {
        let hub = Hub::new();
        let listener = Arc::new(RecordingListener::new());
        hub.add_listener_arc(listener.clone());

        let mut txn = hub.writeable_database_copy();
        txn.add_type("EmptyType").unwrap();
        let result = txn.commit().unwrap();

        assert_eq!(result.revision, 1);
        assert_eq!(result.listeners_notified, 1);
        let db = hub.current_database();
        assert!(db.get_type("EmptyType").unwrap().instances().is_empty());

        let changes = listener.last_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category(), ChangeCategory::AddType);
        assert_eq!(changes[0].type_name(), "EmptyType");
        assert!(changes[0].instance_key().is_none());
        assert!(changes[0].instance_value().is_none());
        assert!(changes[0].modified_properties().is_none());
    }

    #[test]
    fn test_add_type_with_one_instance() {
        let hub = Hub::new();
        let listener = Arc::new(RecordingListener::new());
        hub.add_listener_arc(listener.clone());

        let mut name = ValueMap::new();
        name.insert("Name".to_string(), Value::from("Alice"));

        let mut txn = hub.writeable_database_copy();
        txn.add_type("OneInstanceType")
            .unwrap()
            .add_instance("Alice", name.clone())
            .unwrap();
        txn.commit().unwrap();

        let changes = listener.last_changes();
        let categories: Vec<_> = changes.iter().map(Change::category).collect();
        assert_eq!(
            categories,
            vec![ChangeCategory::AddType, ChangeCategory::AddInstance]
        );
        assert_eq!(changes[0].change_type().len(), 1);
        assert_eq!(changes[1].instance_key(), Some("Alice"));
        assert!(changes[0].modified_properties().is_none());
        assert!(changes[1].modified_properties().is_none());
        assert_eq!(
            changes[1].instance_value().map(|i| i.properties()),
            Some(name)
        );
        assert_eq!(
            hub.current_database()
                .get_type("OneInstanceType")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_remove_instance_keeps_others() {
        let (hub, listener) = type_two_hub();

        let mut txn = hub.writeable_database_copy();
        let removed = txn
            .get_writeable_type("TypeTwo")
            .unwrap()
            .remove_instance("Alice")
            .unwrap();
        txn.commit().unwrap();

        let changes = listener.last_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category(), ChangeCategory::RemoveInstance);
        assert_eq!(changes[0].instance_key(), Some("Alice"));
        assert_eq!(changes[0].instance_value(), Some(&removed));
        assert!(changes[0].modified_properties().is_none());
        assert_eq!(
            removed.property("Name"),
            Some(Value::from("Alice"))
        );

        let db = hub.current_database();
        assert!(db.get_instance("TypeTwo", "Alice").is_none());
        assert!(db.get_instance("TypeTwo", "Bob").is_some());
    }

    #[test]
    fn test_modify_instance_reports_one_property() {
        let (hub, listener) = type_two_hub();

        let mut txn = hub.writeable_database_copy();
        txn.get_writeable_type("TypeTwo")
            .unwrap()
            .modify_instance("Alice", person("Alice", "value2"))
            .unwrap();
        txn.commit().unwrap();

        let changes = listener.last_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category(), ChangeCategory::ModifyInstance);
        assert_eq!(
            changes[0].modified_properties(),
            Some(&[PropertyChange::new("Other", "value1", "value2")][..])
        );
        assert_eq!(
            hub.current_database()
                .get_instance("TypeTwo", "Alice")
                .and_then(|i| i.property("Other")),
            Some(Value::from("value2"))
        );
    }

    #[test]
    fn test_modify_with_supplied_descriptors_reaches_listener() {
        let (hub, listener) = type_two_hub();
        let descriptors = vec![PropertyChange::new("Other", "value1", "value2")];

        let mut txn = hub.writeable_database_copy();
        txn.get_writeable_type("TypeTwo")
            .unwrap()
            .modify_instance_with("Alice", person("Alice", "value2"), descriptors.clone())
            .unwrap();
        txn.commit().unwrap();

        let changes = listener.last_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category(), ChangeCategory::ModifyInstance);
        assert_eq!(changes[0].instance_key(), Some("Alice"));
        assert_eq!(changes[0].modified_properties(), Some(&descriptors[..]));
        assert_eq!(
            changes[0].instance_value().and_then(|i| i.property("Other")),
            Some(Value::from("value2"))
        );
    }

    // ========================================================================
    // Commit protocol
    // ========================================================================

    #[test]
    fn test_changes_follow_staging_order() {
        let (hub, listener) = type_two_hub();

        let mut txn = hub.writeable_database_copy();
        txn.add_type("TypeThree")
            .unwrap()
            .add_instance("Carol", person("Carol", "x"))
            .unwrap();
        {
            let mut wt = txn.get_writeable_type("TypeTwo").unwrap();
            wt.modify_instance("Bob", person("Bob", "value9")).unwrap();
            // Rejected calls record nothing
            assert!(wt.add_instance("Bob", person("Bob", "dup")).is_err());
            wt.remove_instance("Alice").unwrap();
        }
        txn.remove_type("TypeThree").unwrap();
        txn.commit().unwrap();

        let categories: Vec<_> = listener
            .last_changes()
            .iter()
            .map(Change::category)
            .collect();
        assert_eq!(
            categories,
            vec![
                ChangeCategory::AddType,
                ChangeCategory::AddInstance,
                ChangeCategory::ModifyInstance,
                ChangeCategory::RemoveInstance,
                ChangeCategory::RemoveType,
            ]
        );

        let changes = listener.last_changes();
        // The removed type resolves to its last staged state
        assert_eq!(changes[4].change_type().len(), 1);
        assert!(!hub.current_database().contains_type("TypeThree"));
    }

    #[test]
    fn test_empty_commit_publishes_nothing() {
        let (hub, listener) = type_two_hub();
        let before = hub.current_database();

        let mut txn = hub.writeable_database_copy();
        // A view with no edits records nothing
        assert!(txn.get_writeable_type("TypeTwo").is_some());
        let result = txn.commit().unwrap();

        assert_eq!(result, CommitResult::unchanged(1));
        assert!(Arc::ptr_eq(&before, &hub.current_database()));
        assert_eq!(listener.batch_count(), 0);
    }

    #[test]
    fn test_isolation_until_commit() {
        let (hub, _) = type_two_hub();
        let before = hub.current_database();

        let mut txn = hub.writeable_database_copy();
        txn.remove_type("TypeTwo").unwrap();
        txn.add_type("Other").unwrap();

        let during = hub.current_database();
        assert!(Arc::ptr_eq(&before, &during));
        assert!(during.contains_type("TypeTwo"));
        assert!(!during.contains_type("Other"));

        txn.commit().unwrap();
        let after = hub.current_database();
        assert!(!after.contains_type("TypeTwo"));
        assert!(after.contains_type("Other"));
        // Snapshots taken earlier are never mutated
        assert!(before.get_instance("TypeTwo", "Alice").is_some());
    }

    #[test]
    fn test_untouched_types_keep_their_arc() {
        let (hub, _) = type_two_hub();
        let before = hub.current_database();

        let mut txn = hub.writeable_database_copy();
        txn.add_type("EmptyType").unwrap();
        // Seeded but never edited
        txn.get_writeable_type("TypeTwo").unwrap();
        txn.commit().unwrap();

        let after = hub.current_database();
        assert!(Arc::ptr_eq(
            before.get_type("TypeTwo").unwrap(),
            after.get_type("TypeTwo").unwrap()
        ));
    }

    #[test]
    fn test_remove_and_readd_type() {
        let (hub, listener) = type_two_hub();

        let mut txn = hub.writeable_database_copy();
        txn.remove_type("TypeTwo").unwrap();
        txn.add_type("TypeTwo")
            .unwrap()
            .add_instance("Zed", person("Zed", "z"))
            .unwrap();
        txn.commit().unwrap();

        let changes = listener.last_changes();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].category(), ChangeCategory::RemoveType);
        assert_eq!(changes[0].change_type().len(), 2);
        assert_eq!(changes[1].category(), ChangeCategory::AddType);
        assert_eq!(changes[1].change_type().keys().collect::<Vec<_>>(), vec!["Zed"]);

        let db = hub.current_database();
        assert!(db.get_instance("TypeTwo", "Alice").is_none());
        assert!(db.get_instance("TypeTwo", "Zed").is_some());
    }

    #[test]
    fn test_stale_transaction_rejected() {
        let (hub, listener) = type_two_hub();

        let mut first = hub.writeable_database_copy();
        let mut second = hub.writeable_database_copy();
        first.add_type("A").unwrap();
        second.add_type("B").unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(
            err,
            Error::StaleTransaction {
                base_revision: 1,
                current_revision: 2
            }
        ));
        assert_eq!(hub.revision(), 2);
        assert!(!hub.current_database().contains_type("B"));
        assert_eq!(listener.batch_count(), 1);
    }

    #[test]
    fn test_stale_transaction_last_writer_wins() {
        let config = HubConfig::default().with_stale_commit_policy(StaleCommitPolicy::LastWriterWins);
        let seed = Database::with_types(vec![crate::types::Type::new("Shared")]);
        let hub = Hub::with_database(seed, config);

        let mut first = hub.writeable_database_copy();
        let mut second = hub.writeable_database_copy();
        first.add_type("A").unwrap();
        first
            .get_writeable_type("Shared")
            .unwrap()
            .add_instance("one", Value::Int(1))
            .unwrap();
        second.add_type("B").unwrap();
        // Seeded but unedited: must not undo the first commit's edit
        second.get_writeable_type("Shared").unwrap();

        first.commit().unwrap();
        let result = second.commit().unwrap();
        assert_eq!(result.revision, 2);

        let db = hub.current_database();
        assert!(db.contains_type("A"));
        assert!(db.contains_type("B"));
        assert!(db.get_instance("Shared", "one").is_some());
    }

    #[test]
    fn test_reentrant_commit_rejected() {
        let hub = Hub::new();
        let outcome: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let inner_hub = hub.clone();
        let seen = Arc::clone(&outcome);
        hub.add_listener(move |_: &[Change]| {
            // Reads inside a callback see the snapshot being dispatched
            seen.lock().push(format!("revision {}", inner_hub.revision()));

            let mut txn = inner_hub.writeable_database_copy();
            txn.add_type("FromListener").unwrap();
            match txn.commit() {
                Err(Error::ReentrantCommit) => seen.lock().push("reentrant".to_string()),
                other => seen.lock().push(format!("{:?}", other)),
            }
        });

        let mut txn = hub.writeable_database_copy();
        txn.add_type("EmptyType").unwrap();
        txn.commit().unwrap();

        assert_eq!(*outcome.lock(), vec!["revision 1", "reentrant"]);
        assert!(!hub.current_database().contains_type("FromListener"));

        // The hub is usable again once dispatch has finished
        let mut txn = hub.writeable_database_copy();
        txn.add_type("After").unwrap();
        assert!(txn.commit().is_ok());
    }

    #[test]
    fn test_commit_times_out_behind_blocked_dispatch() {
        let hub = Hub::new();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);

        hub.add_listener(move |_: &[Change]| {
            let _ = entered_tx.lock().send(());
            let _ = release_rx.lock().recv();
        });

        let committer = hub.clone();
        let handle = thread::spawn(move || {
            let mut txn = committer.writeable_database_copy();
            txn.add_type("Slow").unwrap();
            txn.commit()
        });

        entered_rx.recv().unwrap();

        let mut txn = hub.writeable_database_copy();
        txn.add_type("Fast").unwrap();
        let err = txn
            .commit_with_timeout(Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, Error::CommitTimedOut(_)));

        release_tx.send(()).unwrap();
        let slow = handle.join().unwrap().unwrap();
        assert_eq!(slow.revision, 1);

        let db = hub.current_database();
        assert!(db.contains_type("Slow"));
        assert!(!db.contains_type("Fast"));
    }

    #[test]
    fn test_concurrent_committers_converge() {
        let seed = Database::with_types(vec![crate::types::Type::new("Counter")]);
        let hub = Hub::with_database(seed, HubConfig::default());
        let listener = Arc::new(RecordingListener::new());
        hub.add_listener_arc(listener.clone());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let hub = hub.clone();
                thread::spawn(move || {
                    for n in 0..10 {
                        let key = format!("w{}-{}", worker, n);
                        loop {
                            let mut txn = hub.writeable_database_copy();
                            txn.get_writeable_type("Counter")
                                .unwrap()
                                .add_instance(&key, Value::Int(n))
                                .unwrap();
                            match txn.commit() {
                                Ok(_) => break,
                                Err(Error::StaleTransaction { .. }) => continue,
                                Err(e) => panic!("unexpected commit error: {}", e),
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let db = hub.current_database();
        assert_eq!(db.revision(), 40);
        assert_eq!(db.get_type("Counter").unwrap().len(), 40);
        assert_eq!(listener.batch_count(), 40);
    }

    // ========================================================================
    // Listeners and configuration
    // ========================================================================

    #[test]
    fn test_removed_listener_is_not_called() {
        let hub = Hub::new();
        let kept = Arc::new(RecordingListener::new());
        let dropped = Arc::new(RecordingListener::new());
        hub.add_listener_arc(kept.clone());
        let id = hub.add_listener_arc(dropped.clone());
        assert_eq!(hub.listener_count(), 2);

        assert!(hub.remove_listener(id));
        assert!(!hub.remove_listener(id));

        let mut txn = hub.writeable_database_copy();
        txn.add_type("EmptyType").unwrap();
        let result = txn.commit().unwrap();

        assert_eq!(result.listeners_notified, 1);
        assert_eq!(kept.batch_count(), 1);
        assert_eq!(dropped.batch_count(), 0);
    }

    #[test]
    fn test_current_database_is_stable_between_commits() {
        let (hub, _) = type_two_hub();
        assert!(Arc::ptr_eq(&hub.current_database(), &hub.current_database()));
    }

    #[test]
    fn test_configured_timeout_applies_to_commit() {
        let config = HubConfig::default().with_commit_timeout(Duration::from_millis(100));
        let hub = Hub::with_config(config);
        assert_eq!(hub.config().commit_timeout(), Some(Duration::from_millis(100)));

        let mut txn = hub.writeable_database_copy();
        txn.add_type("EmptyType").unwrap();
        assert_eq!(txn.commit().unwrap().revision, 1);
    }

    #[test]
    fn test_hub_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Hub>();
    }
}
