//! `VertexId`: a strong handle for graph vertices
//!
//! Every vertex is named by a globally unique, stable string id. Edges,
//! messages and tie-breaks all address vertices by this id, never by
//! position or pointer.
//!
//! This module provides:
//! - A `VertexId` newtype around `String`.
//! - Conversions from string slices and owned strings.
//! - Ordering, hashing and formatting so ids can be used as map keys and
//!   compared lexicographically for deterministic tie-breaking.

use std::borrow::Borrow;
use std::fmt;

/// Globally unique vertex identifier.
///
/// # Ordering
/// `Ord` is plain lexicographic byte order of the underlying string. Every
/// "smallest id wins" rule in the algorithm library relies on it.
#[derive(
    Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct VertexId(String);

impl VertexId {
    /// Creates a new `VertexId`.
    ///
    /// Empty ids are accepted here; [`GraphBuilder`](crate::graph::GraphBuilder)
    /// rejects them when a graph is assembled.
    #[inline]
    pub fn new(raw: impl Into<String>) -> Self {
        VertexId(raw.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Formatting traits
// -----------------------------------------------------------------------------

/// Custom `Debug` implementation to display as `VertexId("raw")`.
impl fmt::Debug for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VertexId").field(&self.0).finish()
    }
}

/// Prints only the raw id.
impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -----------------------------------------------------------------------------
// Conversions
// -----------------------------------------------------------------------------

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        VertexId(s.to_owned())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        VertexId(s)
    }
}

impl From<&VertexId> for VertexId {
    fn from(v: &VertexId) -> Self {
        v.clone()
    }
}

impl Borrow<str> for VertexId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VertexId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
