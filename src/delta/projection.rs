//! Projection of host state into acyclic trees.
//!
//! Plain `serde_json::Value` trees are always acyclic. Hosts that keep live,
//! shared structures can hand them over as a [`LiveValue`] graph; projecting
//! one drops every edge that points back to an ancestor and reports that it
//! did so.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// An acyclic state ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub state: Value,
    /// True when at least one back-edge was dropped.
    pub cyclic_truncated: bool,
}

/// Anything a snapshot can be taken of.
pub trait SnapshotSource {
    fn project(&self) -> Projection;
}

impl SnapshotSource for Value {
    fn project(&self) -> Projection {
        Projection {
            state: self.clone(),
            cyclic_truncated: false,
        }
    }
}

/// A shared, mutable state graph that may contain reference cycles.
#[derive(Clone)]
pub enum LiveValue {
    /// A JSON leaf. Containers nested inside are copied as-is.
    Scalar(Value),
    Object(Rc<RefCell<BTreeMap<String, LiveValue>>>),
    Array(Rc<RefCell<Vec<LiveValue>>>),
}

impl LiveValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        LiveValue::Scalar(value.into())
    }

    pub fn object() -> Self {
        LiveValue::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }

    pub fn array() -> Self {
        LiveValue::Array(Rc::new(RefCell::new(Vec::new())))
    }

    /// Set a key on an object node. Returns false for non-objects.
    pub fn insert(&self, key: impl Into<String>, value: LiveValue) -> bool {
        match self {
            LiveValue::Object(map) => {
                map.borrow_mut().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Push onto an array node. Returns false for non-arrays.
    pub fn push(&self, value: LiveValue) -> bool {
        match self {
            LiveValue::Array(arr) => {
                arr.borrow_mut().push(value);
                true
            }
            _ => false,
        }
    }

    fn identity(&self) -> Option<*const ()> {
        match self {
            LiveValue::Scalar(_) => None,
            LiveValue::Object(map) => Some(Rc::as_ptr(map) as *const ()),
            LiveValue::Array(arr) => Some(Rc::as_ptr(arr) as *const ()),
        }
    }
}

impl fmt::Debug for LiveValue {
    // Cycles make a derived impl recurse forever.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveValue::Scalar(value) => write!(f, "LiveValue::Scalar({})", value),
            LiveValue::Object(map) => write!(f, "LiveValue::Object({:p})", Rc::as_ptr(map)),
            LiveValue::Array(arr) => write!(f, "LiveValue::Array({:p})", Rc::as_ptr(arr)),
        }
    }
}

impl From<&Value> for LiveValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let node = LiveValue::object();
                for (key, child) in map {
                    node.insert(key.clone(), LiveValue::from(child));
                }
                node
            }
            Value::Array(arr) => {
                let node = LiveValue::array();
                for child in arr {
                    node.push(LiveValue::from(child));
                }
                node
            }
            other => LiveValue::Scalar(other.clone()),
        }
    }
}

impl SnapshotSource for LiveValue {
    fn project(&self) -> Projection {
        let mut ancestors = HashSet::new();
        let mut truncated = false;
        let state = project_node(self, &mut ancestors, &mut truncated).unwrap_or(Value::Null);
        Projection {
            state,
            cyclic_truncated: truncated,
        }
    }
}

/// Returns `None` when `node` closes a cycle (or is locked by the host) and
/// must be dropped by the caller.
fn project_node(
    node: &LiveValue,
    ancestors: &mut HashSet<*const ()>,
    truncated: &mut bool,
) -> Option<Value> {
    let id = node.identity();
    if let Some(id) = id {
        if !ancestors.insert(id) {
            *truncated = true;
            return None;
        }
    }

    let projected = match node {
        LiveValue::Scalar(value) => Some(value.clone()),
        LiveValue::Object(map) => map.try_borrow().ok().map(|map| {
            let mut out = Map::new();
            for (key, child) in map.iter() {
                if let Some(value) = project_node(child, ancestors, truncated) {
                    out.insert(key.clone(), value);
                }
            }
            Value::Object(out)
        }),
        LiveValue::Array(arr) => arr.try_borrow().ok().map(|arr| {
            Value::Array(
                arr.iter()
                    .filter_map(|child| project_node(child, ancestors, truncated))
                    .collect(),
            )
        }),
    };

    if projected.is_none() {
        *truncated = true;
    }
    if let Some(id) = id {
        ancestors.remove(&id);
    }
    projected
}
