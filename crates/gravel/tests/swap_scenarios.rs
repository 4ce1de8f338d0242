//! End-to-end swap-engine scenarios through the public API.

use gravel::{
    Edge, EdgeListFile, EdgeSwapEngine, PqPoolConfig, SwapBatchFile, SwapDescriptor, SwapParams,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn params() -> SwapParams {
    SwapParams::new(1 << 16, PqPoolConfig::new(1 << 14, 1 << 14))
}

fn engine_for(edges: &[Edge]) -> EdgeSwapEngine {
    let list = EdgeListFile::from_edges(edges).expect("edge list");
    EdgeSwapEngine::new(list, params())
}

fn batch(swaps: &[(u64, u64, bool)]) -> SwapBatchFile {
    let descriptors: Vec<SwapDescriptor> = swaps
        .iter()
        .map(|&(e0, e1, dir)| SwapDescriptor::new(e0, e1, dir).expect("distinct edge ids"))
        .collect();
    SwapBatchFile::from_descriptors(&descriptors).expect("batch")
}

#[test]
fn round_trip_restores_the_original_list() {
    init_tracing();
    let original = vec![Edge::new(0, 1), Edge::new(2, 3)];
    let mut engine = engine_for(&original);

    let results = engine.run(&batch(&[(0, 1, false)])).expect("first run");
    assert!(results.to_vec().expect("results")[0].performed);
    assert_eq!(
        engine.edges().to_vec().expect("edges"),
        vec![Edge::new(0, 2), Edge::new(1, 3)]
    );

    // The performed swap's inverse is the same swap on the new ranks.
    let results = engine.run(&batch(&[(0, 1, false)])).expect("second run");
    assert!(results.to_vec().expect("results")[0].performed);
    assert_eq!(engine.edges().to_vec().expect("edges"), original);
}

#[test]
fn results_stream_in_batch_order() {
    init_tracing();
    let mut engine = engine_for(&[
        Edge::new(0, 1),
        Edge::new(0, 2),
        Edge::new(3, 4),
        Edge::new(5, 6),
    ]);
    // Swap 0 would create a loop; swap 1 is admissible.
    let results = engine
        .run(&batch(&[(0, 1, false), (2, 3, false)]))
        .expect("run");
    let results = results.to_vec().expect("results");
    assert_eq!(results.len(), 2);
    assert!(!results[0].performed);
    assert!(results[0].loop_detected);
    assert!(results[1].performed);
}

#[test]
fn removed_edge_no_longer_blocks_a_dependent_swap() {
    init_tracing();
    // Swap 0 turns (0,1),(2,3) into (0,2),(1,3), removing (0,1) from the
    // graph. Swap 1 pairs the updated edge 0 with (1,4), recreating (0,1);
    // the existence chain must report it as gone, not as a conflict.
    let mut engine = engine_for(&[Edge::new(0, 1), Edge::new(2, 3), Edge::new(1, 4)]);
    let results = engine
        .run(&batch(&[(0, 1, false), (0, 2, false)]))
        .expect("run");
    let results = results.to_vec().expect("results");
    assert!(results[0].performed);
    assert!(results[1].performed, "removed edge no longer conflicts");
    assert_eq!(
        engine.edges().to_vec().expect("edges"),
        vec![Edge::new(0, 1), Edge::new(1, 3), Edge::new(2, 4)]
    );
}

#[test]
fn conflict_against_an_untouched_edge_is_detected_across_the_batch() {
    init_tracing();
    // Swap 0 creates (0,2); swap 1 would create (0,2) again from other
    // edges and must be rejected.
    let mut engine = engine_for(&[
        Edge::new(0, 1),
        Edge::new(2, 3),
        Edge::new(0, 4),
        Edge::new(2, 5),
    ]);
    let results = engine
        .run(&batch(&[(0, 1, false), (2, 3, false)]))
        .expect("run");
    let results = results.to_vec().expect("results");
    assert!(results[0].performed);
    assert!(!results[1].performed);
    assert!(results[1].conflict.iter().any(|&c| c));
    assert_eq!(
        engine.edges().to_vec().expect("edges"),
        vec![
            Edge::new(0, 2),
            Edge::new(0, 4),
            Edge::new(1, 3),
            Edge::new(2, 5),
        ]
    );
}

#[test]
fn edge_list_survives_a_file_round_trip() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("edges.bin");

    let edges = vec![Edge::new(0, 7), Edge::new(1, 2), Edge::new(3, 9)];
    {
        let mut writer = gravel::EdgeListWriter::create_at(&path).expect("writer");
        for &edge in &edges {
            writer.push(edge).expect("push");
        }
        writer.finish().expect("finish");
    }

    let reopened = EdgeListFile::open(&path).expect("open");
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.to_vec().expect("read"), edges);

    // The wire format is two little-endian words per edge.
    let raw = std::fs::read(&path).expect("raw bytes");
    assert_eq!(raw.len(), 48);
    assert_eq!(&raw[..8], &0u64.to_le_bytes());
    assert_eq!(&raw[8..16], &7u64.to_le_bytes());
}
