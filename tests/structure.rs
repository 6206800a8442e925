mod util;
use util::*;

use std::collections::BTreeSet;

use graph_rounds::algs::{cliques, kcore, wcc};
use graph_rounds::prelude::*;

fn ids(raw: &[&str]) -> Vec<VertexId> {
    raw.iter().map(|s| VertexId::from(*s)).collect()
}

fn id_set(raw: &[&str]) -> BTreeSet<VertexId> {
    raw.iter().map(|s| VertexId::from(*s)).collect()
}

/// Triangle a-b-c with the tail c-d-e.
fn triangle_with_tail(n_parts: usize) -> GraphSnapshot<LabelMap> {
    undirected(
        &[
            ("a", "b", 1.0),
            ("b", "c", 1.0),
            ("a", "c", 1.0),
            ("c", "d", 1.0),
            ("d", "e", 1.0),
        ],
        n_parts,
    )
}

#[test]
fn wcc_ignores_edge_direction() {
    let graph = GraphBuilder::new()
        .partitions(3)
        .edge("a", "b")
        .edge("c", "b")
        .edge("y", "x")
        .vertex("z")
        .build()
        .unwrap();
    let (_, result) = run_serial(graph, &Wcc::default());
    let comps = wcc::components(&result);
    assert_eq!(comps["a"].as_str(), "a");
    assert_eq!(comps["b"].as_str(), "a");
    assert_eq!(comps["c"].as_str(), "a");
    assert_eq!(comps["x"].as_str(), "x");
    assert_eq!(comps["y"].as_str(), "x");
    assert_eq!(comps["z"].as_str(), "z");
    assert_eq!(wcc::component_count(&result), 3);
}

#[test]
fn wcc_on_a_long_path_takes_one_round_per_hop() {
    let names: Vec<String> = (0..8).map(|i| format!("v{i}")).collect();
    let mut b = GraphBuilder::new().partitions(2);
    for pair in names.windows(2) {
        b = b.edge(pair[0].as_str(), pair[1].as_str());
    }
    let (outcome, result) = run_serial(b.build().unwrap(), &Wcc::default());
    assert_eq!(wcc::component_count(&result), 1);
    // seven hops to carry v0 to v7, one quiet round
    assert_eq!(outcome.rounds, 8);
}

#[test]
fn kcore_prunes_the_tail() {
    let (outcome, result) = run_serial(triangle_with_tail(2), &KCore::new(KCoreConfig::new(2)));
    assert_eq!(kcore::members(&result), id_set(&["a", "b", "c"]));
    for record in result.records() {
        assert_eq!(record.label.degree, 2);
        assert_eq!(record.out_degree(), 2);
        assert_eq!(record.in_degree(), 2);
    }
    let removed: Vec<u64> = outcome
        .reports
        .iter()
        .map(|r| r.counters.get(kcore::REMOVED))
        .collect();
    assert_eq!(removed, vec![1, 1, 0]);
}

#[test]
fn kcore_can_be_empty() {
    let (_, result) = run_serial(triangle_with_tail(1), &KCore::new(KCoreConfig::new(3)));
    assert!(kcore::members(&result).is_empty());
    assert!(result.is_empty());
}

#[test]
fn kcore_needs_undirected_input() {
    let (store, input) = store_with(directed(&[("a", "b")], 1));
    let driver = IterationDriver::new(store, SerialSubstrate::new());
    let err = driver.run(&KCore::default(), &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn cliques_of_triangle_with_tail() {
    let (outcome, result) = run_serial(triangle_with_tail(3), &MaximalCliques::default());
    assert_eq!(outcome.rounds, 1);
    assert_eq!(
        cliques::all_cliques(&result),
        vec![ids(&["a", "b", "c"]), ids(&["c", "d"]), ids(&["d", "e"])]
    );
    // each clique is reported by its smallest member
    assert_eq!(result.label("a").unwrap().cliques, vec![ids(&["a", "b", "c"])]);
    assert!(result.label("b").unwrap().cliques.is_empty());
}

#[test]
fn cliques_respect_min_size() {
    let graph = GraphBuilder::new()
        .partitions(2)
        .undirected_edge("a", "b", 1.0)
        .undirected_edge("a", "c", 1.0)
        .undirected_edge("a", "d", 1.0)
        .undirected_edge("b", "c", 1.0)
        .undirected_edge("b", "d", 1.0)
        .undirected_edge("c", "d", 1.0)
        .undirected_edge("d", "e", 1.0)
        .vertex("solo")
        .build()
        .unwrap();
    let all = run_serial(graph.clone(), &MaximalCliques::default()).1;
    assert_eq!(
        cliques::all_cliques(&all),
        vec![ids(&["a", "b", "c", "d"]), ids(&["d", "e"]), ids(&["solo"])]
    );

    let config = CliqueConfig {
        min_size: 3,
        ..CliqueConfig::default()
    };
    let big = run_serial(graph, &MaximalCliques::new(config)).1;
    assert_eq!(cliques::all_cliques(&big), vec![ids(&["a", "b", "c", "d"])]);
}
