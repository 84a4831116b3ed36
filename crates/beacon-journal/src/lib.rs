//! Beacon Journal - audit trail for beacon hub commits
//!
//! This crate builds on `beacon-hub`'s listener seam to provide:
//!
//! - **Journal**: Record every committed change batch as owned data
//! - **Auditor**: Query and analyze recorded changes
//! - **Exporter**: Export journal data to various formats
//!
//! # Example
//!
//! ```
//! use beacon_hub::{Hub, Value};
//! use beacon_journal::{AuditQuery, Auditor, ExportFormat, Exporter, Journal};
//! use std::sync::Arc;
//!
//! let hub = Hub::new();
//! let journal = Arc::new(Journal::new());
//! hub.add_listener_arc(journal.clone());
//!
//! let mut txn = hub.writeable_database_copy();
//! txn.add_type("Server")
//!     .unwrap()
//!     .add_instance("alpha", Value::from("10.0.0.1"))
//!     .unwrap();
//! txn.commit().unwrap();
//!
//! // Audit the session
//! let auditor = Auditor::new(&journal);
//! assert_eq!(auditor.generate_report().total_changes, 2);
//! assert_eq!(auditor.history("Server", "alpha").len(), 2);
//! assert_eq!(auditor.query(&AuditQuery::new().by_key("alpha")).len(), 1);
//!
//! // Export for external analysis
//! let text = Exporter::new(&journal).export(ExportFormat::Text).unwrap();
//! assert!(text.contains("ADD_INSTANCE Server [alpha]"));
//! ```

mod auditor;
mod error;
mod exporter;
mod journal;

pub use auditor::{AuditQuery, AuditReport, Auditor};
pub use error::{Error, Result};
pub use exporter::{ExportFormat, Exporter};
pub use journal::{ChangeRecord, Journal, JournalConfig, JournalEntry, JournalStats};
