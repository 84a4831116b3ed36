//! Beacon Hub - versioned, transactional in-memory registry
//!
//! This crate keeps named types of keyed instances in an immutable
//! [`Database`] snapshot, replaced atomically on every commit. Readers load
//! the current snapshot without locking; writers stage edits in a
//! copy-on-write [`WriteableDatabase`] and commit them as one unit, after
//! which every registered [`DatabaseListener`] receives the ordered batch of
//! [`Change`]s.
//!
//! ## Architecture
//!
//! ```text
//! Hub (owns the current snapshot)
//!  │
//!  ├── ArcSwap<Database> ← lock-free reads
//!  │    └── Arc<Type>[] ← shared between snapshots until touched
//!  │
//!  ├── WriteableDatabase ← one per transaction, owner-confined
//!  │    └── TypeOverlay[] ← copy-on-write edits + ordered change log
//!  │
//!  └── Listeners ← notified on the committing thread, in order
//! ```
//!
//! ## Key Components
//!
//! - [`Hub`]: owner of the current snapshot and the commit protocol
//! - [`Database`] / [`Type`]: immutable published state
//! - [`WriteableDatabase`] / [`WriteableType`]: staging views
//! - [`Change`] / [`ChangeCategory`]: what listeners receive
//! - [`HubConfig`]: commit timeout and stale transaction policy
//!
//! ## Example
//!
//! ```
//! use beacon_hub::{ChangeCategory, Hub, RecordingListener, Value, ValueMap};
//! use std::sync::Arc;
//!
//! let hub = Hub::new();
//! let listener = Arc::new(RecordingListener::new());
//! hub.add_listener_arc(listener.clone());
//!
//! let mut alice = ValueMap::new();
//! alice.insert("Name".to_string(), Value::from("Alice"));
//! alice.insert("Other".to_string(), Value::from("value1"));
//!
//! let mut txn = hub.writeable_database_copy();
//! txn.add_type("TypeTwo").unwrap().add_instance("Alice", alice.clone()).unwrap();
//! txn.commit().unwrap();
//!
//! alice.insert("Other".to_string(), Value::from("value2"));
//! let mut txn = hub.writeable_database_copy();
//! txn.get_writeable_type("TypeTwo")
//!     .unwrap()
//!     .modify_instance("Alice", alice)
//!     .unwrap();
//! txn.commit().unwrap();
//!
//! let changes = listener.last_changes();
//! assert_eq!(changes[0].category(), ChangeCategory::ModifyInstance);
//! assert_eq!(changes[0].modified_properties().unwrap()[0].name, "Other");
//! ```

mod change;
mod commit;
mod config;
mod error;
mod hub;
mod listener;
mod snapshot;
mod types;
mod writeable;
mod writeable_type;

pub use change::{Change, ChangeCategory};
pub use commit::CommitResult;
pub use config::{HubConfig, StaleCommitPolicy};
pub use error::{Error, Result};
pub use hub::Hub;
pub use listener::{DatabaseListener, ListenerId, RecordingListener};
pub use snapshot::Database;
pub use types::Type;
pub use writeable::WriteableDatabase;
pub use writeable_type::WriteableType;

pub use beacon_core::{Bean, IndexMap, Instance, PropertyChange, Value, ValueMap};
