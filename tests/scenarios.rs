//! End-to-end runs of small graphs across rank and thread counts.
mod common;

use common::max_flow;

/// Every scenario must produce the same value for each of these cluster
/// shapes.
const CLUSTER_SHAPES: &[(usize, usize)] = &[(1, 2), (2, 2), (3, 4)];

const SINGLE_EDGE: &str = "2 1\n1 5\n";
const DIAMOND: &str = "4 4\n1 3 2 2\n3 2\n3 3\n";
const AUGMENTING_TRAP: &str = "4 5\n1 1000 2 1000\n2 1 3 1000\n3 1000\n";
const DISCONNECTED_SINK: &str = "3 1\n1 10\n";
const CHAIN: &str = "6 5\n1 7\n2 7\n3 7\n4 7\n5 7\n";
const SELF_LOOP: &str = "2 2\n0 100 1 3\n";

fn assert_flow(text: &str, expected: i32) {
    for &(ranks, threads) in CLUSTER_SHAPES {
        assert_eq!(
            max_flow(text, ranks, threads),
            expected,
            "ranks={ranks} threads={threads}"
        );
    }
}

#[test]
fn single_edge_carries_its_capacity() {
    assert_flow(SINGLE_EDGE, 5);
}

#[test]
fn diamond_splits_across_both_paths() {
    assert_flow(DIAMOND, 4);
}

#[test]
fn augmenting_path_trap_reaches_full_flow() {
    // the middle edge invites paths that later passes must undo
    assert_flow(AUGMENTING_TRAP, 2000);
}

#[test]
fn unreachable_sink_means_zero_flow() {
    assert_flow(DISCONNECTED_SINK, 0);
}

#[test]
fn chain_survives_any_partition_cut() {
    for ranks in 1..=3 {
        assert_eq!(max_flow(CHAIN, ranks, 2), 7, "ranks={ranks}");
    }
}

#[test]
fn self_loop_is_ignored() {
    assert_flow(SELF_LOOP, 3);
}

#[test]
fn single_vertex_graph_has_no_flow() {
    assert_eq!(max_flow("1 0\n", 2, 2), 0);
}
