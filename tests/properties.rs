//! Invariant checks over the final flow assignment, and agreement with a
//! single-process reference solver.
mod common;

use std::collections::HashMap;

use common::{adjacency_text, max_flow, reference_max_flow, run};

/// Graphs without opposite-direction edge pairs; those are exercised
/// single-rank only, in `matches_reference_single_rank`.
fn forward_only_graphs() -> Vec<(usize, Vec<(usize, usize, i32)>)> {
    vec![
        (4, vec![(0, 1, 3), (0, 2, 2), (1, 3, 2), (2, 3, 3)]),
        (
            4,
            vec![(0, 1, 1000), (0, 2, 1000), (1, 2, 1), (1, 3, 1000), (2, 3, 1000)],
        ),
        (
            6,
            vec![
                (0, 1, 10),
                (0, 3, 10),
                (1, 2, 4),
                (1, 3, 2),
                (1, 4, 8),
                (2, 5, 10),
                (3, 4, 9),
                (4, 2, 6),
                (4, 5, 10),
            ],
        ),
        (
            7,
            vec![
                (0, 1, 9),
                (0, 2, 14),
                (1, 3, 6),
                (1, 4, 7),
                (2, 3, 5),
                (2, 4, 4),
                (3, 5, 8),
                (4, 5, 3),
                (4, 6, 11),
                (5, 6, 13),
            ],
        ),
        (6, vec![(0, 1, 7), (1, 2, 7), (2, 3, 7), (3, 4, 7), (4, 5, 7)]),
    ]
}

/// Graphs containing anti-parallel edge pairs.
fn cyclic_graphs() -> Vec<(usize, Vec<(usize, usize, i32)>)> {
    vec![
        (
            6,
            vec![
                (0, 1, 8),
                (0, 4, 3),
                (1, 2, 9),
                (2, 4, 7),
                (2, 5, 2),
                (3, 5, 5),
                (4, 2, 7),
                (4, 3, 4),
            ],
        ),
        (
            6,
            vec![
                (0, 1, 16),
                (0, 2, 13),
                (1, 2, 10),
                (1, 3, 12),
                (2, 1, 4),
                (2, 4, 14),
                (3, 2, 9),
                (3, 5, 20),
                (4, 3, 7),
                (4, 5, 4),
            ],
        ),
    ]
}

#[test]
fn matches_reference_across_cluster_shapes() {
    for (n, edges) in forward_only_graphs() {
        let expected = reference_max_flow(n, &edges);
        let text = adjacency_text(n, &edges);
        for &(ranks, threads) in &[(1, 2), (2, 2), (2, 4), (3, 2)] {
            assert_eq!(
                max_flow(&text, ranks, threads),
                expected,
                "n={n} ranks={ranks} threads={threads}"
            );
        }
    }
}

#[test]
fn matches_reference_single_rank() {
    for (n, edges) in cyclic_graphs() {
        let expected = reference_max_flow(n, &edges);
        let text = adjacency_text(n, &edges);
        assert_eq!(max_flow(&text, 1, 4), expected, "n={n}");
    }
}

#[test]
fn final_flows_respect_capacities() {
    for (n, edges) in forward_only_graphs() {
        let outcome = run(&adjacency_text(n, &edges), 2, 2);
        for edge in &outcome.edges {
            assert!(
                edge.flow >= 0 && edge.flow <= edge.capacity,
                "edge {} -> {} carries {}/{}",
                edge.from,
                edge.to,
                edge.flow,
                edge.capacity
            );
        }
    }
}

#[test]
fn interior_vertices_conserve_flow() {
    for (n, edges) in forward_only_graphs() {
        let outcome = run(&adjacency_text(n, &edges), 2, 2);
        let mut balance: HashMap<u64, i64> = HashMap::new();
        for edge in &outcome.edges {
            *balance.entry(edge.from.raw()).or_default() -= edge.flow as i64;
            *balance.entry(edge.to.raw()).or_default() += edge.flow as i64;
        }
        for vertex in 1..(n as u64 - 1) {
            assert_eq!(
                balance.get(&vertex).copied().unwrap_or(0),
                0,
                "vertex {vertex} of n={n}"
            );
        }
    }
}

#[test]
fn source_outflow_equals_sink_inflow() {
    for (n, edges) in forward_only_graphs() {
        let outcome = run(&adjacency_text(n, &edges), 3, 2);
        let out_of_source: i64 = outcome
            .edges
            .iter()
            .filter(|e| e.from.raw() == 0)
            .map(|e| e.flow as i64)
            .sum();
        let into_sink: i64 = outcome
            .edges
            .iter()
            .filter(|e| e.to.raw() == n as u64 - 1)
            .map(|e| e.flow as i64)
            .sum();
        assert_eq!(out_of_source, into_sink, "n={n}");
        assert_eq!(out_of_source, outcome.report.max_flow as i64, "n={n}");
    }
}

#[test]
fn value_is_deterministic_across_cluster_shapes() {
    let graphs = forward_only_graphs();
    let (n, edges) = &graphs[3];
    let text = adjacency_text(*n, edges);
    let baseline = max_flow(&text, 1, 2);
    for &(ranks, threads) in &[(1, 4), (2, 2), (2, 3), (3, 2), (3, 4)] {
        assert_eq!(
            max_flow(&text, ranks, threads),
            baseline,
            "ranks={ranks} threads={threads}"
        );
    }
}

#[test]
fn repeated_runs_agree() {
    let graphs = forward_only_graphs();
    let (n, edges) = &graphs[2];
    let text = adjacency_text(*n, edges);
    let first = max_flow(&text, 2, 2);
    for _ in 0..4 {
        assert_eq!(max_flow(&text, 2, 2), first);
    }
}
