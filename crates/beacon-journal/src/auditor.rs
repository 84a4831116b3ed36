//! Auditing and analytics for journal data

use crate::journal::{ChangeRecord, Journal, JournalEntry};
use beacon_hub::ChangeCategory;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Auditor for querying and analyzing journal data
///
/// Works on a copy of the journal taken at construction; batches recorded
/// afterwards are not seen.
pub struct Auditor {
    entries: Vec<JournalEntry>,
}

impl Auditor {
    /// Create a new auditor for a journal
    pub fn new(journal: &Journal) -> Self {
        Self {
            entries: journal.entries(),
        }
    }

    /// Create an auditor over already extracted entries
    pub fn from_entries(entries: Vec<JournalEntry>) -> Self {
        Self { entries }
    }

    /// Generate a comprehensive audit report
    pub fn generate_report(&self) -> AuditReport {
        let mut by_category: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut total_changes = 0;

        for record in self.records() {
            total_changes += 1;
            *by_category.entry(record.category.to_string()).or_insert(0) += 1;
            *by_type.entry(record.type_name.clone()).or_insert(0) += 1;
        }

        AuditReport {
            total_batches: self.entries.len(),
            total_changes,
            first_recorded: self.entries.first().map(|e| e.recorded_at),
            last_recorded: self.entries.last().map(|e| e.recorded_at),
            by_category,
            by_type,
        }
    }

    /// Query records matching specific criteria, in commit order
    pub fn query(&self, query: &AuditQuery) -> Vec<&ChangeRecord> {
        self.entries
            .iter()
            .filter(|entry| {
                query.min_sequence.map_or(true, |min| entry.sequence >= min)
                    && query.max_sequence.map_or(true, |max| entry.sequence <= max)
            })
            .flat_map(|entry| entry.changes.iter())
            .filter(|record| query.matches(record))
            .collect()
    }

    /// Full trail of one instance, in commit order
    ///
    /// Includes type-level changes of the instance's type, since adding or
    /// removing the type creates or drops every instance in it.
    pub fn history(&self, type_name: &str, key: &str) -> Vec<&ChangeRecord> {
        self.records()
            .filter(|record| {
                record.is_for_instance(type_name, key)
                    || (record.type_name == type_name && record.instance_key.is_none())
            })
            .collect()
    }

    /// Count records of one category
    pub fn count_category(&self, category: ChangeCategory) -> u64 {
        self.records().filter(|r| r.category == category).count() as u64
    }

    /// Names of every type that appears in the journal, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records().map(|r| r.type_name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    fn records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.entries.iter().flat_map(|entry| entry.changes.iter())
    }
}

/// A comprehensive audit report
#[derive(Debug, Clone)]
pub struct AuditReport {
    /// Number of recorded commit batches
    pub total_batches: usize,
    /// Number of recorded changes
    pub total_changes: u64,
    /// Receive time of the oldest batch
    pub first_recorded: Option<DateTime<Utc>>,
    /// Receive time of the newest batch
    pub last_recorded: Option<DateTime<Utc>>,
    /// Changes by category
    pub by_category: BTreeMap<String, u64>,
    /// Changes by type name
    pub by_type: BTreeMap<String, u64>,
}

impl std::fmt::Display for AuditReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Audit Report ===")?;
        writeln!(f, "Total batches: {}", self.total_batches)?;
        writeln!(f, "Total changes: {}", self.total_changes)?;

        if let (Some(first), Some(last)) = (self.first_recorded, self.last_recorded) {
            writeln!(f, "Recorded: {} - {}", first.to_rfc3339(), last.to_rfc3339())?;
        }

        if !self.by_category.is_empty() {
            writeln!(f, "\nChanges by category:")?;
            let mut sorted: Vec<_> = self.by_category.iter().collect();
            sorted.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
            for (category, count) in sorted {
                writeln!(f, "  {}: {}", category, count)?;
            }
        }

        if !self.by_type.is_empty() {
            writeln!(f, "\nChanges by type:")?;
            for (type_name, count) in &self.by_type {
                writeln!(f, "  {}: {}", type_name, count)?;
            }
        }

        Ok(())
    }
}

/// Query criteria for filtering change records
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// First batch sequence (inclusive)
    pub min_sequence: Option<u64>,
    /// Last batch sequence (inclusive)
    pub max_sequence: Option<u64>,
    /// Filter by type name
    pub type_name: Option<String>,
    /// Filter by category
    pub category: Option<ChangeCategory>,
    /// Filter by instance key
    pub instance_key: Option<String>,
}

impl AuditQuery {
    /// Create a new empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by batch sequence range
    pub fn in_range(mut self, start: u64, end: u64) -> Self {
        self.min_sequence = Some(start);
        self.max_sequence = Some(end);
        self
    }

    /// Filter by type name
    pub fn by_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Filter by category
    pub fn by_category(mut self, category: ChangeCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Filter by instance key
    pub fn by_key(mut self, key: impl Into<String>) -> Self {
        self.instance_key = Some(key.into());
        self
    }

    fn matches(&self, record: &ChangeRecord) -> bool {
        if let Some(ref type_name) = self.type_name {
            if &record.type_name != type_name {
                return false;
            }
        }
        if let Some(category) = self.category {
            if record.category != category {
                return false;
            }
        }
        if let Some(ref key) = self.instance_key {
            if record.instance_key.as_ref() != Some(key) {
                return false;
            }
        }
        true
    }
}
