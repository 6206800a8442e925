#![allow(dead_code)]
use std::collections::BTreeSet;
use std::sync::Arc;

use graph_rounds::algs::mst::EdgeKey;
use graph_rounds::graph::Label;
use graph_rounds::prelude::*;

/// Undirected graph from `(u, v, weight)` triples over `n_parts` partitions.
pub fn undirected(edges: &[(&str, &str, f64)], n_parts: usize) -> GraphSnapshot<LabelMap> {
    let mut b = GraphBuilder::new().partitions(n_parts);
    for &(u, v, w) in edges {
        b = b.undirected_edge(u, v, w);
    }
    b.build().expect("valid undirected graph")
}

/// Directed graph from `(u, v)` pairs over `n_parts` partitions.
pub fn directed(edges: &[(&str, &str)], n_parts: usize) -> GraphSnapshot<LabelMap> {
    let mut b = GraphBuilder::new().partitions(n_parts);
    for &(u, v) in edges {
        b = b.edge(u, v);
    }
    b.build().expect("valid directed graph")
}

/// Path A–B–C–D–E with the spur C–F.
pub fn path_with_spur(n_parts: usize) -> GraphSnapshot<LabelMap> {
    undirected(
        &[
            ("A", "B", 1.0),
            ("B", "C", 1.0),
            ("C", "D", 1.0),
            ("D", "E", 1.0),
            ("C", "F", 1.0),
        ],
        n_parts,
    )
}

/// Default PageRank constants with room to converge at the default threshold.
pub fn patient_pagerank() -> PageRank {
    PageRank::new(PageRankConfig {
        max_rounds: 1_000,
        ..PageRankConfig::default()
    })
}

pub fn store_with(graph: GraphSnapshot<LabelMap>) -> (Arc<MemoryStore>, Location) {
    let store = Arc::new(MemoryStore::new());
    let input = store.put(graph).expect("put input");
    (store, input)
}

/// Runs `alg` to convergence on the serial substrate and reads the result.
pub fn run_serial<A: Algorithm>(
    graph: GraphSnapshot<LabelMap>,
    alg: &A,
) -> (RunOutcome, Arc<GraphSnapshot<A::Label>>) {
    run_on(graph, alg, SerialSubstrate::new())
}

pub fn run_on<A: Algorithm, B: Substrate>(
    graph: GraphSnapshot<LabelMap>,
    alg: &A,
    substrate: B,
) -> (RunOutcome, Arc<GraphSnapshot<A::Label>>) {
    let (store, input) = store_with(graph);
    let driver = IterationDriver::new(store.clone(), substrate);
    let outcome = driver.run(alg, &input).expect("run converges");
    let snapshot = store
        .read::<A::Label>(&outcome.final_snapshot)
        .expect("final snapshot readable");
    (outcome, snapshot)
}

/// Snapshot left behind by a run that stopped at its round bound.
pub fn read_last<L: Label>(
    store: &MemoryStore,
    result: Result<RunOutcome, GraphError>,
) -> Arc<GraphSnapshot<L>> {
    let location = match result {
        Ok(outcome) => outcome.final_snapshot,
        Err(GraphError::NotConverged { last_snapshot, .. }) => last_snapshot,
        Err(e) => panic!("unexpected error: {e}"),
    };
    store.read::<L>(&location).expect("last snapshot readable")
}

pub fn assert_close(got: f64, want: f64, tol: f64) {
    assert!(
        (got - want).abs() <= tol,
        "got {got}, want {want} (tolerance {tol})"
    );
}

/// Union-find with path compression over dense indices.
pub struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    pub fn find(&mut self, idx: usize) -> usize {
        let mut root = idx;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = idx;
        while cur != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Returns `false` when `a` and `b` were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        true
    }
}

/// Kruskal's minimum spanning forest under the same total edge order.
pub fn kruskal(edges: &[(&str, &str, f64)]) -> BTreeSet<EdgeKey> {
    let mut names: Vec<&str> = edges.iter().flat_map(|&(u, v, _)| [u, v]).collect();
    names.sort_unstable();
    names.dedup();
    let index = |n: &str| names.binary_search(&n).expect("known vertex");

    let mut keyed: Vec<EdgeKey> = edges
        .iter()
        .map(|&(u, v, w)| EdgeKey::new(w, &VertexId::from(u), &VertexId::from(v)))
        .collect();
    keyed.sort();
    keyed.dedup();

    let mut sets = DisjointSets::new(names.len());
    keyed
        .into_iter()
        .filter(|e| sets.union(index(e.lo.as_str()), index(e.hi.as_str())))
        .collect()
}
