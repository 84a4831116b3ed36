//! Database - immutable, published point-in-time view of the registry
//!
//! # Design
//!
//! A database maps type names to `Arc<Type>`:
//! - **Publishing is O(types)**: a commit copies the map of `Arc`s and swaps
//!   in only the types it touched; untouched types are shared by reference
//! - **Cloning a handle is O(1)**: readers hold `Arc<Database>`
//! - **Readers never lock**: nothing reachable from a database is mutated
//!   after publication
//!
//! Every published database carries a revision. The empty database a hub
//! starts with is revision 0 and each publishing commit adds one.

use crate::types::Type;
use beacon_core::{IndexMap, Instance};
use std::fmt;
use std::io;
use std::sync::Arc;

/// An immutable snapshot of all types and instances
///
/// `Database` is `Send + Sync`; any number of threads may read a snapshot
/// while newer snapshots are being published.
#[derive(Debug, Clone, Default)]
pub struct Database {
    /// Types by name, in creation order
    types: IndexMap<String, Arc<Type>>,
    /// Publication counter
    revision: u64,
}

impl Database {
    /// Create an empty database at revision 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database from already built types
    ///
    /// Used to seed a hub with data produced by a loader.
    pub fn with_types(types: impl IntoIterator<Item = Type>) -> Self {
        Self {
            types: types
                .into_iter()
                .map(|t| (t.name().to_string(), Arc::new(t)))
                .collect(),
            revision: 0,
        }
    }

    pub(crate) fn from_parts(types: IndexMap<String, Arc<Type>>, revision: u64) -> Self {
        Self { types, revision }
    }

    pub(crate) fn types_map(&self) -> &IndexMap<String, Arc<Type>> {
        &self.types
    }

    /// Revision of this snapshot
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Look up a type
    pub fn get_type(&self, name: &str) -> Option<&Arc<Type>> {
        self.types.get(name)
    }

    /// Check if a type exists
    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Look up one instance of one type
    pub fn get_instance(&self, type_name: &str, key: &str) -> Option<&Instance> {
        self.types.get(type_name).and_then(|t| t.get_instance(key))
    }

    /// Iterate over all types, in creation order
    pub fn types(&self) -> impl Iterator<Item = &Arc<Type>> {
        self.types.values()
    }

    /// Type names, in creation order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the database holds no types
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Total number of instances across all types
    pub fn instance_count(&self) -> usize {
        self.types.values().map(|t| t.len()).sum()
    }

    /// Write a human-readable dump of every type and instance
    pub fn dump<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "{}", self)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Database revision {} ({} types, {} instances)",
            self.revision,
            self.types.len(),
            self.instance_count()
        )?;
        for t in self.types.values() {
            writeln!(f, "  Type {} ({} instances)", t.name(), t.len())?;
            for (key, instance) in t.instances() {
                write!(f, "    {} =>", key)?;
                for (name, value) in instance.properties() {
                    write!(f, " {}={}", name, value)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
