//! Stored instance values
//!
//! Anything kept in the registry implements [`Bean`]: it exposes its declared
//! field set as a [`ValueMap`] so the registry can diff two versions of a
//! record property by property, and it can be downcast back to its concrete
//! type by readers that know what they stored.
//!
//! [`Instance`] is the immutable, cheaply clonable handle the registry hands
//! out. Cloning an instance never copies the underlying record.

use crate::value::maps_structurally_equal;
use crate::{Value, ValueMap};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Property name used when a non-map [`Value`] is stored as an instance
pub const SCALAR_PROPERTY: &str = "value";

/// A record that can be stored in the registry
///
/// # Example
///
/// ```
/// use beacon_core::{Bean, Instance, Value, ValueMap};
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct Endpoint {
///     host: String,
///     port: i64,
/// }
///
/// impl Bean for Endpoint {
///     fn properties(&self) -> ValueMap {
///         let mut props = ValueMap::new();
///         props.insert("host".to_string(), Value::from(self.host.as_str()));
///         props.insert("port".to_string(), Value::from(self.port));
///         props
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// let instance = Instance::new(Endpoint { host: "localhost".into(), port: 8080 });
/// assert_eq!(instance.property("port"), Some(Value::Int(8080)));
/// assert_eq!(instance.downcast_ref::<Endpoint>().map(|e| e.port), Some(8080));
/// ```
pub trait Bean: fmt::Debug + Send + Sync + 'static {
    /// The declared field set, in a stable order
    fn properties(&self) -> ValueMap;

    /// Upcast for downcasting to the concrete record type
    fn as_any(&self) -> &dyn Any;
}

impl Bean for ValueMap {
    fn properties(&self) -> ValueMap {
        self.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Bean for Value {
    /// A map exposes its entries; any other value is a single
    /// [`SCALAR_PROPERTY`] field.
    fn properties(&self) -> ValueMap {
        match self {
            Value::Map(map) => map.clone(),
            other => {
                let mut props = ValueMap::new();
                props.insert(SCALAR_PROPERTY.to_string(), other.clone());
                props
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Immutable shared handle to a stored record
#[derive(Clone)]
pub struct Instance(Arc<dyn Bean>);

impl Instance {
    /// Wrap a record
    pub fn new(bean: impl Bean) -> Self {
        Self(Arc::new(bean))
    }

    /// Wrap an already shared record
    pub fn from_arc(bean: Arc<dyn Bean>) -> Self {
        Self(bean)
    }

    /// The record's declared field set
    pub fn properties(&self) -> ValueMap {
        self.0.properties()
    }

    /// A single property, if the record declares it
    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.properties().shift_remove(name)
    }

    /// Borrow the record as its concrete type
    pub fn downcast_ref<T: Bean>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Borrow the record as a trait object
    pub fn bean(&self) -> &dyn Bean {
        self.0.as_ref()
    }

    /// Whether both handles point at the same record
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Same record, or structurally equal property sets
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || maps_structurally_equal(&self.properties(), &other.properties())
    }
}

impl<T: Bean> From<T> for Instance {
    fn from(bean: T) -> Self {
        Instance::new(bean)
    }
}

impl From<Arc<dyn Bean>> for Instance {
    fn from(bean: Arc<dyn Bean>) -> Self {
        Instance::from_arc(bean)
    }
}
