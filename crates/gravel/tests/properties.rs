//! Property tests: the streaming engine must agree with a sequential
//! in-memory reference, and every run must preserve the simple-graph
//! invariants.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use gravel::{
    swap_edges, Edge, EdgeListFile, EdgeSwapEngine, Node, PqPoolConfig, RandomSwapStream,
    SwapBatchFile, SwapDescriptor, SwapParams,
};

fn params() -> SwapParams {
    SwapParams::new(1 << 14, PqPoolConfig::new(1 << 12, 1 << 12))
}

/// Apply the batch one swap at a time against a plain in-memory list, with
/// edge ids fixed to ranks in the input list — the semantics the streaming
/// engine must reproduce for a single (sub-)batch.
fn reference_apply(edges: &[Edge], swaps: &[SwapDescriptor]) -> Vec<Edge> {
    let mut values: Vec<Edge> = edges.to_vec();
    let mut present: BTreeSet<Edge> = values.iter().copied().collect();

    for swap in swaps {
        let [e0, e1] = swap.edges();
        let a = values[usize::try_from(e0).expect("test-sized ids")];
        let b = values[usize::try_from(e1).expect("test-sized ids")];
        let (n0, n1) = swap_edges(a, b, swap.direction());
        if n0.is_loop() || n1.is_loop() {
            continue;
        }
        if present.contains(&n0) || present.contains(&n1) {
            continue;
        }
        present.remove(&a);
        present.remove(&b);
        present.insert(n0);
        present.insert(n1);
        values[usize::try_from(e0).expect("test-sized ids")] = n0;
        values[usize::try_from(e1).expect("test-sized ids")] = n1;
    }

    let mut out = values;
    out.sort_unstable();
    out
}

fn degree_multiset(edges: &[Edge]) -> BTreeMap<Node, u64> {
    let mut degrees = BTreeMap::new();
    for edge in edges {
        *degrees.entry(edge.u).or_insert(0) += 1;
        *degrees.entry(edge.v).or_insert(0) += 1;
    }
    degrees
}

/// A random sorted simple graph with at least two edges.
fn simple_graph() -> impl Strategy<Value = Vec<Edge>> {
    proptest::collection::btree_set((0u64..24, 0u64..24), 2..60).prop_filter_map(
        "need two simple edges",
        |pairs| {
            let edges: BTreeSet<Edge> = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| Edge::new(a, b))
                .collect();
            if edges.len() < 2 {
                None
            } else {
                Some(edges.into_iter().collect())
            }
        },
    )
}

fn run_engine(edges: &[Edge], swaps: &[SwapDescriptor]) -> Vec<Edge> {
    let list = EdgeListFile::from_edges(edges).expect("edge list");
    let batch = SwapBatchFile::from_descriptors(swaps).expect("batch");
    let mut engine = EdgeSwapEngine::new(list, params());
    let results = engine.run(&batch).expect("run");
    assert_eq!(results.len(), swaps.len() as u64);
    engine.edges().to_vec().expect("read edges")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn engine_matches_the_sequential_reference(
        edges in simple_graph(),
        seed in 0u64..10_000,
        count in 1u64..40,
    ) {
        let swaps: Vec<SwapDescriptor> =
            RandomSwapStream::new(seed, edges.len() as u64, count).collect();

        let streamed = run_engine(&edges, &swaps);
        let reference = reference_apply(&edges, &swaps);
        prop_assert_eq!(streamed, reference);
    }

    #[test]
    fn runs_preserve_the_simple_graph_invariants(
        edges in simple_graph(),
        seed in 0u64..10_000,
        count in 1u64..40,
    ) {
        let swaps: Vec<SwapDescriptor> =
            RandomSwapStream::new(seed, edges.len() as u64, count).collect();
        let after = run_engine(&edges, &swaps);

        prop_assert_eq!(after.len(), edges.len());
        for pair in after.windows(2) {
            prop_assert!(pair[0] < pair[1], "sorted and duplicate-free");
        }
        for edge in &after {
            prop_assert!(!edge.is_loop());
        }
        prop_assert_eq!(degree_multiset(&after), degree_multiset(&edges));
    }

    #[test]
    fn empty_batch_is_bitwise_idempotent(edges in simple_graph()) {
        let after = run_engine(&edges, &[]);
        prop_assert_eq!(after, edges);
    }

    #[test]
    fn sub_batching_agrees_with_stepped_reference(
        edges in simple_graph(),
        seed in 0u64..10_000,
        count in 1u64..20,
    ) {
        // With one swap per sub-batch, ids re-rank against each intermediate
        // list; the reference steps the same way.
        let swaps: Vec<SwapDescriptor> =
            RandomSwapStream::new(seed, edges.len() as u64, count).collect();

        let list = EdgeListFile::from_edges(&edges).expect("edge list");
        let batch = SwapBatchFile::from_descriptors(&swaps).expect("batch");
        let mut engine = EdgeSwapEngine::new(list, params().with_sub_batch(1));
        engine.run(&batch).expect("run");
        let streamed = engine.edges().to_vec().expect("read edges");

        let mut reference = edges;
        for swap in &swaps {
            reference = reference_apply(&reference, &[*swap]);
        }
        prop_assert_eq!(streamed, reference);
    }
}
