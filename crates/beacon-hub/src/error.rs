//! Error types for beacon-hub
//!
//! Every error is raised synchronously by the call that caused it. A failed
//! staging call leaves the transaction exactly as it was.

use std::time::Duration;
use thiserror::Error;

/// Result type for beacon-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in beacon-hub
#[derive(Debug, Error)]
pub enum Error {
    /// A type with this name is already visible to the transaction
    #[error("type {0:?} already exists")]
    TypeAlreadyExists(String),

    /// No type with this name is visible to the transaction
    #[error("type {0:?} not found")]
    TypeNotFound(String),

    /// The instance key is already present in the type
    #[error("instance {key:?} already exists in type {type_name:?}")]
    DuplicateKey {
        /// Type the instance was added to
        type_name: String,
        /// Offending key
        key: String,
    },

    /// The instance key is not present in the type
    #[error("instance {key:?} not found in type {type_name:?}")]
    KeyNotFound {
        /// Type that was searched
        type_name: String,
        /// Missing key
        key: String,
    },

    /// The commit lock could not be acquired in time
    ///
    /// Nothing was published. The timeout only bounds the wait for the lock:
    /// a commit that acquires the lock always runs to completion.
    #[error("timed out after {0:?} waiting for the commit lock")]
    CommitTimedOut(Duration),

    /// A listener tried to commit on the hub that is dispatching to it
    #[error("commit called from a listener of the same hub")]
    ReentrantCommit,

    /// The hub published a newer snapshot after this transaction was copied
    #[error(
        "transaction was copied from revision {base_revision} but the hub is at revision {current_revision}"
    )]
    StaleTransaction {
        /// Revision the transaction was built on
        base_revision: u64,
        /// Revision currently published
        current_revision: u64,
    },

    /// Invalid hub configuration
    #[error("invalid hub configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build a [`Error::DuplicateKey`]
    pub fn duplicate_key(type_name: &str, key: &str) -> Self {
        Error::DuplicateKey {
            type_name: type_name.to_string(),
            key: key.to_string(),
        }
    }

    /// Build a [`Error::KeyNotFound`]
    pub fn key_not_found(type_name: &str, key: &str) -> Self {
        Error::KeyNotFound {
            type_name: type_name.to_string(),
            key: key.to_string(),
        }
    }
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
// This function is never called but will fail to compile if the bound is not satisfied.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
