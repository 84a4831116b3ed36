//! Export journal data to various formats

use crate::journal::{Journal, JournalEntry, JournalStats};
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format (requires serde_json feature)
    Json,
    /// Human-readable text format
    Text,
}

/// Exporter for journal data
///
/// Like [`Auditor`](crate::Auditor), it works on a copy of the journal taken
/// at construction.
pub struct Exporter {
    stats: JournalStats,
    entries: Vec<JournalEntry>,
}

impl Exporter {
    /// Create a new exporter
    pub fn new(journal: &Journal) -> Self {
        Self {
            stats: journal.stats(),
            entries: journal.entries(),
        }
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Export to RON format
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(&self.export_data(), ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to JSON format
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.export_data())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "serde_json"))]
    pub fn to_json(&self) -> Result<String> {
        Err(Error::ExportError(
            "JSON export requires the 'serde_json' feature".to_string(),
        ))
    }

    /// Export to human-readable text format
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("=== Journal Export ===\n\n");
        output.push_str(&format!("Batches: {}\n", self.stats.total_entries));
        output.push_str(&format!("Changes: {}\n", self.stats.change_count));

        if let (Some(first), Some(last)) = (self.stats.first_sequence, self.stats.last_sequence) {
            output.push_str(&format!("Sequence range: {} - {}\n", first, last));
        }

        output.push_str("\n=== Entries ===\n");

        for entry in &self.entries {
            output.push_str(&format!(
                "\n--- Batch {} at {} ---\n",
                entry.sequence,
                entry.recorded_at.to_rfc3339()
            ));

            for record in &entry.changes {
                let key = record
                    .instance_key
                    .as_ref()
                    .map(|k| format!(" [{}]", k))
                    .unwrap_or_default();
                output.push_str(&format!("  {} {}{}\n", record.category, record.type_name, key));

                if let Some(properties) = &record.modified_properties {
                    for change in properties {
                        output.push_str(&format!(
                            "      {}: {} -> {}\n",
                            change.name, change.old_value, change.new_value
                        ));
                    }
                }
            }
        }

        output
    }

    fn export_data(&self) -> ExportData<'_> {
        ExportData {
            version: 1,
            stats: &self.stats,
            entries: &self.entries,
        }
    }
}

/// Data structure for full journal export
#[derive(Debug, Serialize)]
struct ExportData<'a> {
    version: u32,
    stats: &'a JournalStats,
    entries: &'a [JournalEntry],
}
