mod util;
use util::*;

use graph_rounds::algs::mst::{self, EdgeKey};
use graph_rounds::prelude::*;

/// A square of unit edges with heavier diagonals and a tail: several
/// equal-weight edges compete at every level.
const TIED: &[(&str, &str, f64)] = &[
    ("a", "b", 1.0),
    ("b", "c", 1.0),
    ("c", "d", 1.0),
    ("d", "a", 1.0),
    ("a", "c", 2.0),
    ("b", "d", 2.0),
    ("c", "e", 3.0),
    ("d", "e", 3.0),
];

fn key(u: &str, v: &str, w: f64) -> EdgeKey {
    EdgeKey::new(w, &VertexId::from(u), &VertexId::from(v))
}

#[test]
fn matches_kruskal_on_tied_weights() {
    let (_, result) = run_serial(undirected(TIED, 2), &Mst::default());
    let expected = kruskal(TIED);
    assert_eq!(
        expected,
        [key("a", "b", 1.0), key("a", "d", 1.0), key("b", "c", 1.0), key("c", "e", 3.0)]
            .into_iter()
            .collect()
    );
    assert_eq!(mst::spanning_edges(&result), expected);
    assert_close(mst::total_weight(&result), 6.0, 1e-12);
}

#[test]
fn permuted_message_order_changes_nothing() {
    let (reference, reference_result) = run_serial(undirected(TIED, 3), &Mst::default());
    let fragment = mst::fragment_id(&reference_result, "a").expect("fragment assigned");
    for name in ["b", "c", "d", "e"] {
        assert_eq!(mst::fragment_id(&reference_result, name).as_ref(), Some(&fragment));
    }

    for seed in [1, 7, 42, 0xDEAD_BEEF] {
        let substrate = SerialSubstrate::new().with_shuffle(seed);
        let (outcome, result) = run_on(undirected(TIED, 3), &Mst::default(), substrate);
        assert_eq!(
            mst::spanning_edges(&result),
            mst::spanning_edges(&reference_result),
            "seed {seed}"
        );
        assert_eq!(mst::fragment_id(&result, "e").as_ref(), Some(&fragment));
        assert_eq!(outcome.rounds, reference.rounds);
    }
}

#[test]
fn partition_count_does_not_change_the_tree() {
    let one = run_serial(undirected(TIED, 1), &Mst::default()).1;
    let four = run_serial(undirected(TIED, 4), &Mst::default()).1;
    assert_eq!(mst::spanning_edges(&one), mst::spanning_edges(&four));
    assert_eq!(mst::fragment_id(&one, "c"), mst::fragment_id(&four, "c"));
}

#[test]
fn disconnected_input_yields_a_forest() {
    let edges = &[
        ("p", "q", 2.0),
        ("q", "r", 1.0),
        ("p", "r", 5.0),
        ("x", "y", 4.0),
    ];
    let graph = GraphBuilder::new()
        .partitions(2)
        .undirected_edge("p", "q", 2.0)
        .undirected_edge("q", "r", 1.0)
        .undirected_edge("p", "r", 5.0)
        .undirected_edge("x", "y", 4.0)
        .vertex("lonely")
        .build()
        .unwrap();
    let (_, result) = run_serial(graph, &Mst::default());
    assert_eq!(mst::spanning_edges(&result), kruskal(edges));
    assert_ne!(
        mst::fragment_id(&result, "p"),
        mst::fragment_id(&result, "x")
    );
    assert_eq!(mst::fragment_id(&result, "lonely"), None);
    assert!(result.label("lonely").unwrap().halted);
}

#[test]
fn directed_input_is_rejected() {
    let (store, input) = store_with(directed(&[("a", "b")], 1));
    let driver = IterationDriver::new(store, SerialSubstrate::new());
    let err = driver.run(&Mst::default(), &input).unwrap_err();
    assert!(matches!(err, GraphError::NotUndirected { algorithm: "mst", .. }));
}
