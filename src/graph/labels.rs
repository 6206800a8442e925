//! Vertex label storage.
//!
//! Raw input graphs carry a [`LabelMap`]: named, typed values per vertex
//! (seed markers, initial weights, ...). Each algorithm turns that map into
//! its own label struct during driver initialization; any type satisfying
//! [`Label`] can live inside a [`GraphSnapshot`](crate::graph::GraphSnapshot).

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::graph::vertex_id::VertexId;

/// Per-vertex state that can be stored in a snapshot and shipped between
/// partitions.
pub trait Label: Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Label for T where
    T: Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// A single typed, serializable label value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Ids(Vec<VertexId>),
}

impl TypedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats; everything else is `None`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TypedValue::Float(f) => Some(*f),
            TypedValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Bool(b)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::Int(i)
    }
}

impl From<f64> for TypedValue {
    fn from(f: f64) -> Self {
        TypedValue::Float(f)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::Text(s.to_owned())
    }
}

/// Named labels of one raw input vertex.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    values: BTreeMap<String, TypedValue>,
}

impl LabelMap {
    /// Creates an empty label map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` under `name`, returning the previous value if any.
    pub fn set(&mut self, name: &str, value: impl Into<TypedValue>) -> Option<TypedValue> {
        self.values.insert(name.to_string(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.values.get(name)
    }

    /// `true` when `name` holds `Bool(true)`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(TypedValue::as_bool).unwrap_or(false)
    }

    /// Numeric value under `name`, if present and numeric.
    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(TypedValue::as_float)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
