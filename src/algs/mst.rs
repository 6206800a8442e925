//! Minimum spanning forest with the Gallager–Humblet–Spira protocol.
//!
//! Every vertex runs the GHS node automaton. Messages a vertex produces while
//! merging are queued in its label and sent by the next round's emit, so one
//! round delivers one hop. Messages the automaton cannot handle yet are
//! deferred in the label and retried before and after anything new.
//!
//! # Determinism
//! Edges are totally ordered by [`EdgeKey`] `(weight, lower id, higher id)`,
//! so equal weights never tie. A fragment is named after its core edge; when
//! two fragments connect over the same edge at once, the new identity is that
//! edge's key, which already encodes the lexicographically smaller endpoint
//! pair. Incoming envelopes are processed in `(sender, sequence)` order, which
//! makes every merge independent of delivery order.
//!
//! The input must be undirected (mirrored edges, equal weights, no
//! self-loops). Disconnected inputs yield one tree per component.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::algs::require_round_bound;
use crate::engine::context::TaskContext;
use crate::engine::driver::Algorithm;
use crate::engine::program::{Emission, VertexProgram, ordered_sum};
use crate::graph::labels::LabelMap;
use crate::graph::record::{EdgeSet, VertexRecord};
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MstConfig {
    pub max_rounds: usize,
}

impl Default for MstConfig {
    fn default() -> Self {
        Self { max_rounds: 100_000 }
    }
}

impl MstConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        require_round_bound("mst", self.max_rounds)
    }
}

/// Total order on undirected edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeKey {
    pub weight: f64,
    pub lo: VertexId,
    pub hi: VertexId,
}

impl EdgeKey {
    pub fn new(weight: f64, a: &VertexId, b: &VertexId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            weight,
            lo: lo.clone(),
            hi: hi.clone(),
        }
    }
}

impl Ord for EdgeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.lo.cmp(&other.lo))
            .then_with(|| self.hi.cmp(&other.hi))
    }
}

impl PartialOrd for EdgeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EdgeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeKey {}

/// Best outgoing edge found so far; `Infinite` when there is none.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weight {
    Finite(EdgeKey),
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Sleeping,
    Find,
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeState {
    Basic,
    Branch,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GhsMessage {
    Connect { level: u32 },
    Initiate {
        level: u32,
        fragment: EdgeKey,
        status: NodeStatus,
    },
    Test { level: u32, fragment: EdgeKey },
    Accept,
    Reject,
    Report { best: Weight },
    ChangeRoot,
}

/// A message plus its sender and the sender's sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: VertexId,
    pub seq: u64,
    pub message: GhsMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MstLabel {
    pub status: NodeStatus,
    pub frag_level: u32,
    /// Core edge of the fragment; `None` until the first `Initiate`.
    pub frag_id: Option<EdgeKey>,
    pub best_edge: Option<VertexId>,
    pub best_weight: Weight,
    pub test_edge: Option<VertexId>,
    pub in_branch: Option<VertexId>,
    /// Reports still expected from child branches.
    pub pending_replies: u32,
    pub edge_states: BTreeMap<VertexId, EdgeState>,
    pub deferred: Vec<Envelope>,
    pub outbox: Vec<(VertexId, GhsMessage)>,
    pub next_seq: u64,
    pub halted: bool,
}

enum Handled {
    Done,
    Deferred,
}

/// The GHS automaton of one vertex, borrowing its record.
struct Node<'a> {
    id: &'a VertexId,
    weights: &'a EdgeSet,
    s: &'a mut MstLabel,
}

impl Node<'_> {
    fn key(&self, to: &VertexId) -> Result<EdgeKey, GraphError> {
        self.weights
            .get(to)
            .map(|w| EdgeKey::new(*w, self.id, to))
            .ok_or_else(|| GraphError::merge_failure(self.id, format!("no edge to `{to}`")))
    }

    fn edge_state(&self, to: &VertexId) -> EdgeState {
        self.s
            .edge_states
            .get(to)
            .copied()
            .unwrap_or(EdgeState::Basic)
    }

    fn set_edge(&mut self, to: &VertexId, state: EdgeState) {
        self.s.edge_states.insert(to.clone(), state);
    }

    fn send(&mut self, to: &VertexId, message: GhsMessage) {
        self.s.outbox.push((to.clone(), message));
    }

    fn fragment(&self) -> Result<EdgeKey, GraphError> {
        self.s
            .frag_id
            .clone()
            .ok_or_else(|| GraphError::merge_failure(self.id, "fragment identity not set"))
    }

    /// Lightest edge in `state`, if any.
    fn lightest(&self, state: EdgeState) -> Option<VertexId> {
        self.weights
            .iter()
            .filter(|(to, _)| self.edge_state(to) == state)
            .min_by(|(a, wa), (b, wb)| {
                EdgeKey::new(**wa, self.id, a).cmp(&EdgeKey::new(**wb, self.id, b))
            })
            .map(|(to, _)| to.clone())
    }

    fn wakeup(&mut self) {
        self.s.frag_level = 0;
        self.s.status = NodeStatus::Found;
        self.s.pending_replies = 0;
        match self.lightest(EdgeState::Basic) {
            Some(m) => {
                self.set_edge(&m, EdgeState::Branch);
                self.send(&m, GhsMessage::Connect { level: 0 });
            }
            // isolated vertex: a tree of its own
            None => self.s.halted = true,
        }
    }

    fn handle(&mut self, envelope: &Envelope) -> Result<Handled, GraphError> {
        let j = &envelope.from;
        if self.s.status == NodeStatus::Sleeping {
            self.wakeup();
        }
        match &envelope.message {
            GhsMessage::Connect { level } => self.on_connect(j, *level),
            GhsMessage::Initiate {
                level,
                fragment,
                status,
            } => self.on_initiate(j, *level, fragment.clone(), *status).map(|_| Handled::Done),
            GhsMessage::Test { level, fragment } => self.on_test(j, *level, fragment),
            GhsMessage::Accept => self.on_accept(j).map(|_| Handled::Done),
            GhsMessage::Reject => {
                if self.edge_state(j) == EdgeState::Basic {
                    self.set_edge(j, EdgeState::Rejected);
                }
                self.test().map(|_| Handled::Done)
            }
            GhsMessage::Report { best } => self.on_report(j, best.clone()),
            GhsMessage::ChangeRoot => self.change_root().map(|_| Handled::Done),
        }
    }

    fn on_connect(&mut self, j: &VertexId, level: u32) -> Result<Handled, GraphError> {
        if level < self.s.frag_level {
            // absorb the lower-level fragment
            self.set_edge(j, EdgeState::Branch);
            let message = GhsMessage::Initiate {
                level: self.s.frag_level,
                fragment: self.fragment()?,
                status: self.s.status,
            };
            self.send(j, message);
            if self.s.status == NodeStatus::Find {
                self.s.pending_replies += 1;
            }
        } else if self.edge_state(j) == EdgeState::Basic {
            return Ok(Handled::Deferred);
        } else {
            // both sides connected over `j`: it becomes the new core
            let message = GhsMessage::Initiate {
                level: self.s.frag_level + 1,
                fragment: self.key(j)?,
                status: NodeStatus::Find,
            };
            self.send(j, message);
        }
        Ok(Handled::Done)
    }

    fn on_initiate(
        &mut self,
        j: &VertexId,
        level: u32,
        fragment: EdgeKey,
        status: NodeStatus,
    ) -> Result<(), GraphError> {
        self.s.frag_level = level;
        self.s.frag_id = Some(fragment.clone());
        self.s.status = status;
        self.s.in_branch = Some(j.clone());
        self.s.best_edge = None;
        self.s.best_weight = Weight::Infinite;
        let branches: Vec<VertexId> = self
            .weights
            .keys()
            .filter(|i| *i != j && self.edge_state(i) == EdgeState::Branch)
            .cloned()
            .collect();
        for i in &branches {
            self.send(
                i,
                GhsMessage::Initiate {
                    level,
                    fragment: fragment.clone(),
                    status,
                },
            );
            if status == NodeStatus::Find {
                self.s.pending_replies += 1;
            }
        }
        if status == NodeStatus::Find {
            self.test()?;
        }
        Ok(())
    }

    fn test(&mut self) -> Result<(), GraphError> {
        match self.lightest(EdgeState::Basic) {
            Some(m) => {
                self.s.test_edge = Some(m.clone());
                let message = GhsMessage::Test {
                    level: self.s.frag_level,
                    fragment: self.fragment()?,
                };
                self.send(&m, message);
                Ok(())
            }
            None => {
                self.s.test_edge = None;
                self.report()
            }
        }
    }

    fn on_test(&mut self, j: &VertexId, level: u32, fragment: &EdgeKey) -> Result<Handled, GraphError> {
        if level > self.s.frag_level {
            return Ok(Handled::Deferred);
        }
        if self.s.frag_id.as_ref() != Some(fragment) {
            self.send(j, GhsMessage::Accept);
            return Ok(Handled::Done);
        }
        if self.edge_state(j) == EdgeState::Basic {
            self.set_edge(j, EdgeState::Rejected);
        }
        if self.s.test_edge.as_ref() != Some(j) {
            self.send(j, GhsMessage::Reject);
        } else {
            self.test()?;
        }
        Ok(Handled::Done)
    }

    fn on_accept(&mut self, j: &VertexId) -> Result<(), GraphError> {
        self.s.test_edge = None;
        let weight = Weight::Finite(self.key(j)?);
        if weight < self.s.best_weight {
            self.s.best_edge = Some(j.clone());
            self.s.best_weight = weight;
        }
        self.report()
    }

    fn report(&mut self) -> Result<(), GraphError> {
        if self.s.pending_replies == 0 && self.s.test_edge.is_none() {
            self.s.status = NodeStatus::Found;
            let parent = self
                .s
                .in_branch
                .clone()
                .ok_or_else(|| GraphError::merge_failure(self.id, "report without an in-branch"))?;
            let best = self.s.best_weight.clone();
            self.send(&parent, GhsMessage::Report { best });
        }
        Ok(())
    }

    fn on_report(&mut self, j: &VertexId, best: Weight) -> Result<Handled, GraphError> {
        if self.s.in_branch.as_ref() != Some(j) {
            self.s.pending_replies = self
                .s
                .pending_replies
                .checked_sub(1)
                .ok_or_else(|| GraphError::merge_failure(self.id, "unexpected report"))?;
            if best < self.s.best_weight {
                self.s.best_weight = best;
                self.s.best_edge = Some(j.clone());
            }
            self.report()?;
        } else if self.s.status == NodeStatus::Find {
            return Ok(Handled::Deferred);
        } else if best > self.s.best_weight {
            self.change_root()?;
        } else if best == Weight::Infinite && self.s.best_weight == Weight::Infinite {
            self.s.halted = true;
        }
        Ok(Handled::Done)
    }

    fn change_root(&mut self) -> Result<(), GraphError> {
        let best = self
            .s
            .best_edge
            .clone()
            .ok_or_else(|| GraphError::merge_failure(self.id, "change-root without a best edge"))?;
        if self.edge_state(&best) == EdgeState::Branch {
            self.send(&best, GhsMessage::ChangeRoot);
        } else {
            let level = self.s.frag_level;
            self.send(&best, GhsMessage::Connect { level });
            self.set_edge(&best, EdgeState::Branch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MstProgram;

impl VertexProgram for MstProgram {
    type Label = MstLabel;
    type Payload = Envelope;

    fn name(&self) -> &'static str {
        "mst"
    }

    fn emit(
        &self,
        vertex: &VertexRecord<MstLabel>,
        _ctx: &mut TaskContext,
    ) -> Result<Emission<MstLabel, Envelope>, GraphError> {
        let mut next = vertex.clone();
        if next.label.status == NodeStatus::Sleeping {
            Node {
                id: &next.id,
                weights: &next.out_edges,
                s: &mut next.label,
            }
            .wakeup();
        }
        let outbox = std::mem::take(&mut next.label.outbox);
        let mut seq = next.label.next_seq;
        let mut envelopes = Vec::with_capacity(outbox.len());
        for (to, message) in outbox {
            envelopes.push((
                to,
                Envelope {
                    from: vertex.id.clone(),
                    seq,
                    message,
                },
            ));
            seq += 1;
        }
        next.label.next_seq = seq;
        let mut emission = Emission::keep(next);
        for (to, envelope) in envelopes {
            emission.push(to, envelope);
        }
        Ok(emission)
    }

    fn merge(
        &self,
        id: &VertexId,
        prior: Option<VertexRecord<MstLabel>>,
        mut messages: Vec<Envelope>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<MstLabel>>, GraphError> {
        let Some(mut record) = prior else {
            if messages.is_empty() {
                return Ok(None);
            }
            return Err(GraphError::merge_failure(id, "protocol message for a vertex not in the graph"));
        };
        messages.sort_by(|a, b| (&a.from, a.seq).cmp(&(&b.from, b.seq)));
        let mut pending = std::mem::take(&mut record.label.deferred);
        pending.extend(messages);

        let mut node = Node {
            id: &record.id,
            weights: &record.out_edges,
            s: &mut record.label,
        };
        loop {
            let mut progressed = false;
            let mut still = Vec::new();
            for envelope in pending {
                match node.handle(&envelope)? {
                    Handled::Done => progressed = true,
                    Handled::Deferred => still.push(envelope),
                }
            }
            pending = still;
            if !progressed || pending.is_empty() {
                break;
            }
        }
        node.s.deferred = pending;
        if !node.s.outbox.is_empty() {
            ctx.mark_dirty();
        }
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mst {
    pub config: MstConfig,
}

impl Mst {
    pub fn new(config: MstConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for Mst {
    type Label = MstLabel;
    type Program = MstProgram;
    type State = ();

    fn name(&self) -> &'static str {
        "mst"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()?;
        input.require_undirected("mst")
    }

    fn initialize(&self, _state: &(), record: &VertexRecord<LabelMap>) -> Result<MstLabel, GraphError> {
        Ok(MstLabel {
            status: NodeStatus::Sleeping,
            frag_level: 0,
            frag_id: None,
            best_edge: None,
            best_weight: Weight::Infinite,
            test_edge: None,
            in_branch: None,
            pending_replies: 0,
            edge_states: record
                .out_neighbors()
                .map(|n| (n.clone(), EdgeState::Basic))
                .collect(),
            deferred: Vec::new(),
            outbox: Vec::new(),
            next_seq: 0,
            halted: false,
        })
    }

    fn program(&self, _state: &(), _round: usize) -> MstProgram {
        MstProgram
    }
}

/// Edges of the spanning forest.
pub fn spanning_edges(snapshot: &GraphSnapshot<MstLabel>) -> BTreeSet<EdgeKey> {
    let mut edges = BTreeSet::new();
    for record in snapshot.records() {
        for (to, state) in &record.label.edge_states {
            if *state != EdgeState::Branch {
                continue;
            }
            if let Some(w) = record.weight_to(to) {
                edges.insert(EdgeKey::new(w, &record.id, to));
            }
        }
    }
    edges
}

pub fn total_weight(snapshot: &GraphSnapshot<MstLabel>) -> f64 {
    ordered_sum(spanning_edges(snapshot).iter().map(|e| e.weight).collect())
}

/// Core edge of the fragment `id` ended up in.
pub fn fragment_id(snapshot: &GraphSnapshot<MstLabel>, id: &str) -> Option<EdgeKey> {
    snapshot.label(id).and_then(|l| l.frag_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_keys_break_weight_ties_by_endpoints() {
        let a = EdgeKey::new(1.0, &"b".into(), &"a".into());
        let b = EdgeKey::new(1.0, &"a".into(), &"c".into());
        assert_eq!(a.lo.as_str(), "a");
        assert!(a < b);
        assert!(Weight::Finite(b) < Weight::Infinite);
    }

    #[test]
    fn connect_over_basic_edge_is_deferred() {
        let weights: EdgeSet = [(VertexId::from("b"), 1.0), ("c".into(), 2.0)].into_iter().collect();
        let mut label = Mst::default()
            .initialize(&(), &VertexRecord::new("a", LabelMap::new()))
            .unwrap();
        let id = VertexId::from("a");
        let mut node = Node {
            id: &id,
            weights: &weights,
            s: &mut label,
        };
        node.wakeup();
        assert_eq!(
            node.s.outbox,
            vec![(VertexId::from("b"), GhsMessage::Connect { level: 0 })]
        );
        // `c` is still basic and at the same level: wait
        let deferred = node
            .handle(&Envelope {
                from: "c".into(),
                seq: 0,
                message: GhsMessage::Connect { level: 0 },
            })
            .unwrap();
        assert!(matches!(deferred, Handled::Deferred));
        // `b` is our branch: the edge becomes the core of a level-1 fragment
        node.handle(&Envelope {
            from: "b".into(),
            seq: 0,
            message: GhsMessage::Connect { level: 0 },
        })
        .unwrap();
        let (to, msg) = node.s.outbox.last().unwrap().clone();
        assert_eq!(to.as_str(), "b");
        assert_eq!(
            msg,
            GhsMessage::Initiate {
                level: 1,
                fragment: EdgeKey::new(1.0, &"a".into(), &"b".into()),
                status: NodeStatus::Find,
            }
        );
    }
}
