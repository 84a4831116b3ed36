//! Hub Configuration - commit timeout and stale transaction handling
//!
//! The configuration is plain serde data so an owning application can keep it
//! next to the rest of its settings. [`HubConfig::from_ron`] parses the RON
//! form; every field is optional and falls back to its default.
//!
//! ```ron
//! (
//!     commit_timeout_ms: Some(250),
//!     stale_commit_policy: LastWriterWins,
//! )
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a transaction commits against a hub that has moved on
///
/// A transaction is staged against the snapshot that was current when it was
/// copied. If another commit publishes in between, the transaction is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StaleCommitPolicy {
    /// Fail the commit with [`Error::StaleTransaction`]; the caller retries
    /// with a fresh copy
    #[default]
    Reject,
    /// Apply the transaction's touched types on top of the current snapshot.
    /// A touched type replaces whatever the intervening commits left under
    /// that name; untouched types keep their current state.
    LastWriterWins,
}

/// Configuration for a [`Hub`](crate::Hub)
///
/// # Example
///
/// ```
/// use beacon_hub::{HubConfig, StaleCommitPolicy};
/// use std::time::Duration;
///
/// let config = HubConfig::default();
/// assert_eq!(config.commit_timeout(), None);
/// assert_eq!(config.stale_commit_policy(), StaleCommitPolicy::Reject);
///
/// let config = HubConfig::default()
///     .with_commit_timeout(Duration::from_millis(250))
///     .with_stale_commit_policy(StaleCommitPolicy::LastWriterWins);
/// assert_eq!(config.commit_timeout(), Some(Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Upper bound, in milliseconds, on waiting for the commit lock
    ///
    /// `None` waits indefinitely.
    commit_timeout_ms: Option<u64>,
    /// Handling of transactions whose base snapshot is no longer current
    stale_commit_policy: StaleCommitPolicy,
}

impl HubConfig {
    /// Parse a configuration from RON text
    ///
    /// ```
    /// use beacon_hub::{HubConfig, StaleCommitPolicy};
    ///
    /// let config = HubConfig::from_ron("(stale_commit_policy: LastWriterWins)").unwrap();
    /// assert_eq!(config.stale_commit_policy(), StaleCommitPolicy::LastWriterWins);
    /// assert_eq!(config.commit_timeout(), None);
    /// ```
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Render the configuration as RON text
    pub fn to_ron(&self) -> Result<String> {
        ron::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the commit lock timeout
    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.set_commit_timeout(Some(timeout));
        self
    }

    /// Set the stale transaction policy
    pub fn with_stale_commit_policy(mut self, policy: StaleCommitPolicy) -> Self {
        self.stale_commit_policy = policy;
        self
    }

    /// Get the commit lock timeout
    pub fn commit_timeout(&self) -> Option<Duration> {
        self.commit_timeout_ms.map(Duration::from_millis)
    }

    /// Set or clear the commit lock timeout
    ///
    /// Sub-millisecond precision is truncated.
    pub fn set_commit_timeout(&mut self, timeout: Option<Duration>) {
        self.commit_timeout_ms = timeout.map(|t| t.as_millis().min(u64::MAX as u128) as u64);
    }

    /// Get the stale transaction policy
    pub fn stale_commit_policy(&self) -> StaleCommitPolicy {
        self.stale_commit_policy
    }

    /// Set the stale transaction policy
    pub fn set_stale_commit_policy(&mut self, policy: StaleCommitPolicy) {
        self.stale_commit_policy = policy;
    }
}
