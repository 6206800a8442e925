//! Every merge must give the same record for every order of its messages.

use proptest::prelude::*;

use graph_rounds::algs::betweenness::{BcLabel, BcMessage, BcProgram, Phase};
use graph_rounds::algs::bfs::{Visit, VisitStatus};
use graph_rounds::algs::cliques::{CliqueProgram, NeighborSet};
use graph_rounds::algs::hits::{HitsMessage, HitsProgram};
use graph_rounds::algs::kcore::KCoreProgram;
use graph_rounds::algs::mst::{EdgeKey, Envelope, GhsMessage, MstProgram};
use graph_rounds::algs::pagerank::PageRankProgram;
use graph_rounds::algs::wcc::WccProgram;
use graph_rounds::engine::{Stage, TaskId, TaskPhase};
use graph_rounds::prelude::*;

type Merged<L> = (Result<Option<VertexRecord<L>>, GraphError>, bool);

fn merge_once<P: VertexProgram>(
    program: &P,
    prior: &VertexRecord<P::Label>,
    messages: Vec<P::Payload>,
) -> Merged<P::Label> {
    let mut ctx = TaskContext::new(TaskId {
        round: 1,
        stage: Stage::Main,
        phase: TaskPhase::Merge,
        partition: 0,
    });
    let out = program.merge(&prior.id, Some(prior.clone()), messages, &mut ctx);
    (out, ctx.is_dirty())
}

fn check<P: VertexProgram>(
    program: &P,
    prior: &VertexRecord<P::Label>,
    messages: Vec<P::Payload>,
    permuted: Vec<P::Payload>,
) -> Result<(), TestCaseError> {
    prop_assert_eq!(
        merge_once(program, prior, messages),
        merge_once(program, prior, permuted)
    );
    Ok(())
}

/// A list together with a shuffled copy of itself.
fn with_permutation<T: Clone + std::fmt::Debug>(
    items: impl Strategy<Value = Vec<T>>,
) -> impl Strategy<Value = (Vec<T>, Vec<T>)> {
    items.prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
}

fn vid(prefix: &str, n: u8) -> VertexId {
    VertexId::new(format!("{prefix}{n}"))
}

/// Initializes `id` through `alg` with edges to `n0..n{degree}`.
fn init_record<A: Algorithm>(alg: &A, id: &str, weights: &[f64]) -> VertexRecord<A::Label> {
    let mut raw = VertexRecord::new(id, LabelMap::new());
    for (i, w) in weights.iter().enumerate() {
        raw.out_edges.insert(vid("n", i as u8), *w);
        raw.in_edges.insert(vid("n", i as u8), *w);
    }
    let label = alg
        .initialize(&A::State::default(), &raw)
        .expect("initialize");
    raw.relabel(label)
}

proptest! {
    #[test]
    fn bfs_merge((msgs, perm) in with_permutation(prop::collection::vec((0u8..6, 0u32..4), 0..12))) {
        let alg = Bfs::new(BfsConfig::new("src"));
        let prior = init_record(&alg, "x", &[]);
        prop_assert_eq!(prior.label.status, VisitStatus::Unvisited);
        let to_visit = |v: Vec<(u8, u32)>| -> Vec<Visit> {
            v.into_iter()
                .map(|(f, d)| Visit { from: vid("u", f), distance: d, path: vec![vid("u", f)] })
                .collect()
        };
        check(&graph_rounds::algs::bfs::BfsProgram, &prior, to_visit(msgs), to_visit(perm))?;
    }

    #[test]
    fn pagerank_merge((msgs, perm) in with_permutation(prop::collection::vec(0.0f64..1.0, 0..24))) {
        let prior = init_record(&PageRank::default(), "x", &[1.0, 1.0]);
        let program = PageRankProgram::Main { damping: 0.85, threshold: 1e-9 };
        check(&program, &prior, msgs, perm)?;
    }

    #[test]
    fn hits_merge((msgs, perm) in with_permutation(prop::collection::vec(
        prop_oneof![(0.0f64..1.0).prop_map(HitsMessage::Hub), (0.0f64..1.0).prop_map(HitsMessage::Authority)],
        0..24,
    ))) {
        let prior = init_record(&Hits::default(), "x", &[1.0]);
        check(&HitsProgram::Main, &prior, msgs, perm)?;
    }

    #[test]
    fn wcc_merge((msgs, perm) in with_permutation(prop::collection::vec(0u8..10, 0..12))) {
        let prior = init_record(&Wcc::default(), "c5", &[]);
        let ids = |v: Vec<u8>| v.into_iter().map(|n| vid("c", n)).collect::<Vec<_>>();
        check(&WccProgram, &prior, ids(msgs), ids(perm))?;
    }

    #[test]
    fn kcore_merge((msgs, perm) in with_permutation(prop::collection::vec(0u8..8, 0..8))) {
        let prior = init_record(&KCore::default(), "x", &[1.0; 8]);
        let ids = |v: Vec<u8>| v.into_iter().map(|n| vid("n", n)).collect::<Vec<_>>();
        check(&KCoreProgram { k: 2 }, &prior, ids(msgs), ids(perm))?;
    }

    #[test]
    fn betweenness_forward_merge((msgs, perm) in with_permutation(
        prop::collection::vec((0u8..6, 0u32..3, 1u64..5), 0..12),
    )) {
        let prior = init_record(&Betweenness::new(BetweennessConfig::new("src")), "x", &[]);
        let paths = |v: Vec<(u8, u32, u64)>| -> Vec<BcMessage> {
            v.into_iter()
                .map(|(f, distance, paths)| BcMessage::Path { from: vid("u", f), distance, paths: paths as f64 })
                .collect()
        };
        let program = BcProgram { phase: Phase::Forward };
        check(&program, &prior, paths(msgs), paths(perm))?;
    }

    #[test]
    fn betweenness_backward_merge((msgs, perm) in with_permutation(
        prop::collection::vec((1u64..5, 0.0f64..3.0), 0..12),
    )) {
        let mut prior = init_record(&Betweenness::new(BetweennessConfig::new("src")), "x", &[]);
        prior.label = BcLabel { distance: Some(1), paths: 2.0, ..prior.label };
        let deps = |v: Vec<(u64, f64)>| -> Vec<BcMessage> {
            v.into_iter()
                .map(|(paths, centrality)| BcMessage::Dependency { paths: paths as f64, centrality })
                .collect()
        };
        let program = BcProgram { phase: Phase::Backward { level: 2 } };
        check(&program, &prior, deps(msgs), deps(perm))?;
    }

    #[test]
    fn clique_merge(
        adjacency in prop::collection::vec(prop::collection::vec(any::<bool>(), 6), 6),
        seed in any::<u64>(),
    ) {
        // "v" is adjacent to n0..n5; `adjacency` decides the edges among those
        let prior = init_record(&MaximalCliques::default(), "v", &[1.0; 6]);
        let sets: Vec<NeighborSet> = (0..6u8)
            .map(|i| {
                let mut neighbors: std::collections::BTreeSet<VertexId> = (0..6u8)
                    .filter(|&j| j != i && (adjacency[i as usize][j as usize] || adjacency[j as usize][i as usize]))
                    .map(|j| vid("n", j))
                    .collect();
                neighbors.insert(VertexId::from("v"));
                NeighborSet { from: vid("n", i), neighbors }
            })
            .collect();
        let mut permuted = sets.clone();
        permuted.rotate_left((seed % 6) as usize);
        permuted.reverse();
        check(&CliqueProgram { min_size: 1 }, &prior, sets, permuted)?;
    }

    #[test]
    fn mst_merge(
        weights in prop::collection::vec(1u8..4, 4),
        kinds in prop::collection::vec(any::<bool>(), 4),
        order in Just((0..4usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let weights: Vec<f64> = weights.into_iter().map(f64::from).collect();
        let prior = init_record(&Mst::default(), "m", &weights);
        let envelopes: Vec<Envelope> = (0..4u8)
            .map(|i| {
                let from = vid("n", i);
                let message = if kinds[i as usize] {
                    GhsMessage::Connect { level: 0 }
                } else {
                    GhsMessage::Test {
                        level: 0,
                        fragment: EdgeKey::new(weights[i as usize], &from, &vid("z", i)),
                    }
                };
                Envelope { from, seq: 0, message }
            })
            .collect();
        let permuted: Vec<Envelope> = order.iter().map(|&i| envelopes[i].clone()).collect();
        check(&MstProgram, &prior, envelopes, permuted)?;
    }
}
