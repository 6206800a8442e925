//! The round contract every algorithm implements.
//!
//! A round is `emit` over every vertex, a shuffle that groups messages (and the
//! vertex's own updated record) by destination id, then `merge` per id. Both
//! functions must be pure given their inputs: substrates may run them in any
//! order, in parallel, and more than once.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::context::TaskContext;
use crate::graph::labels::Label;
use crate::graph::record::VertexRecord;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

/// Message body exchanged between vertices. Each algorithm uses one sum type.
pub trait Payload: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Payload for T where T: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// A payload addressed to one vertex. Lives for exactly one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message<P> {
    pub destination: VertexId,
    pub payload: P,
}

impl<P> Message<P> {
    pub fn new(destination: impl Into<VertexId>, payload: P) -> Self {
        Self {
            destination: destination.into(),
            payload,
        }
    }
}

/// Output of one `emit` call.
#[derive(Clone, Debug, PartialEq)]
pub struct Emission<L, P> {
    /// The vertex's own record for the next snapshot; `None` drops the vertex
    /// unless a merge recreates it.
    pub update: Option<VertexRecord<L>>,
    pub messages: Vec<Message<P>>,
}

impl<L, P> Emission<L, P> {
    /// Keeps the vertex and sends nothing.
    pub fn keep(record: VertexRecord<L>) -> Self {
        Self {
            update: Some(record),
            messages: Vec::new(),
        }
    }

    /// Drops the vertex and sends nothing.
    pub fn drop_vertex() -> Self {
        Self {
            update: None,
            messages: Vec::new(),
        }
    }

    pub fn send(mut self, to: impl Into<VertexId>, payload: P) -> Self {
        self.messages.push(Message::new(to, payload));
        self
    }

    pub fn push(&mut self, to: impl Into<VertexId>, payload: P) {
        self.messages.push(Message::new(to, payload));
    }
}

/// Transform/merge pair executed once per round by a substrate.
///
/// # Ordering
/// Messages reach `merge` in unspecified order. Implementations must produce
/// the same result for every permutation of `messages`.
pub trait VertexProgram: Send + Sync {
    type Label: Label;
    type Payload: Payload;

    /// Short name used in logs and task ids.
    fn name(&self) -> &'static str;

    /// Transforms one vertex: its next record plus outgoing messages.
    fn emit(
        &self,
        vertex: &VertexRecord<Self::Label>,
        ctx: &mut TaskContext,
    ) -> Result<Emission<Self::Label, Self::Payload>, GraphError>;

    /// Folds everything addressed to `id` into its next record.
    ///
    /// `prior` is the record `id` emitted for itself this round, if any.
    /// Returning `None` removes the vertex from the next snapshot.
    fn merge(
        &self,
        id: &VertexId,
        prior: Option<VertexRecord<Self::Label>>,
        messages: Vec<Self::Payload>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<Self::Label>>, GraphError>;
}

/// Sums floats independently of their order.
///
/// Values are sorted with `total_cmp` first so every permutation of the
/// same multiset yields bit-identical results.
pub fn ordered_sum(mut values: Vec<f64>) -> f64 {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    values.into_iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_sum_is_permutation_invariant() {
        let a = vec![1e16, 1.0, -1e16, 0.5, 3.25];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(ordered_sum(a).to_bits(), ordered_sum(b).to_bits());
    }

    #[test]
    fn emission_builders() {
        let e: Emission<(), u8> = Emission::keep(VertexRecord::new("a", ()))
            .send("b", 1)
            .send("c", 2);
        assert_eq!(e.messages.len(), 2);
        assert_eq!(e.messages[1].destination.as_str(), "c");
        let d: Emission<(), u8> = Emission::drop_vertex();
        assert!(d.update.is_none());
    }
}
