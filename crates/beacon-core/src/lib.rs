//! Beacon Core - values and records for the beacon registry
//!
//! This crate provides the data side of the registry:
//! - Dynamic value types (`Value`, `ValueMap`)
//! - The `Bean` capability every stored record implements
//! - `Instance`, the shared immutable handle to a stored record
//! - Property-level diffing (`PropertyChange`, `diff_instances`)
//!
//! beacon-core does not know about hubs, snapshots or transactions; those
//! live in `beacon-hub`.

mod bean;
mod diff;
mod value;

pub use bean::{Bean, Instance, SCALAR_PROPERTY};
pub use diff::{diff_instances, diff_properties, PropertyChange};
pub use indexmap::IndexMap;
pub use value::{Value, ValueMap};
