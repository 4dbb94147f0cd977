//! Job orchestration: cluster setup, partitioning, engine run, and result
//! collection.
use std::path::Path;
use std::time::{Duration, Instant};

use log::info;
use thiserror::Error;

use crate::comm::local::{LocalCluster, LocalComm};
use crate::comm::transport::Transport;
use crate::engine::{Engine, EngineError};
use crate::graph::ids::Rank;
use crate::graph::io::{load_graph, ParseError};
use crate::graph::store::{EdgeFlow, Vertex};
use crate::partition::{partition_and_migrate, PartitionError};
use crate::report::JobReport;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("thread count must be at least 2 (one router plus workers), got {0}")]
    NotEnoughThreads(usize),
    #[error("rank count must be at least 1, got 0")]
    NoRanks,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("rank thread panicked")]
    RankPanicked,
}

/// A finished run: the rank-0 report plus the final flow on every edge,
/// gathered from all ranks.
#[derive(Debug)]
pub struct JobOutcome {
    pub report: JobReport,
    pub edges: Vec<EdgeFlow>,
}

/// Loads the input file and runs the full job; the entry point used by the
/// binary.
pub fn run_job<P: AsRef<Path>>(
    path: P,
    threads: usize,
    ranks: usize,
) -> Result<JobReport, JobError> {
    let vertices = load_graph(path)?;
    Ok(run_cluster(vertices, ranks, threads)?.report)
}

/// Runs the algorithm on an in-process cluster of `ranks` peer ranks with
/// `threads` threads each.
pub fn run_cluster(
    vertices: Vec<Vertex>,
    ranks: usize,
    threads: usize,
) -> Result<JobOutcome, JobError> {
    if ranks == 0 {
        return Err(JobError::NoRanks);
    }
    if threads < 2 {
        return Err(JobError::NotEnoughThreads(threads));
    }
    if vertices.len() <= 1 {
        // a single vertex is its own source and sink; nothing can flow
        return Ok(JobOutcome {
            report: JobReport::new(0, Duration::ZERO, Duration::ZERO),
            edges: Vec::new(),
        });
    }

    info!(
        "running {} vertices on {ranks} ranks x {threads} threads",
        vertices.len()
    );
    let comms = LocalCluster::comms(ranks);
    let mut seed = Some(vertices);
    let mut outcomes = Vec::with_capacity(ranks);
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let seed = if comm.rank() == Rank::new(0) {
                    seed.take().unwrap_or_default()
                } else {
                    Vec::new()
                };
                scope.spawn(move || rank_main(comm, seed, threads))
            })
            .collect();
        for handle in handles {
            outcomes.push(handle.join().map_err(|_| JobError::RankPanicked));
        }
    });

    let mut report = None;
    let mut edges = Vec::new();
    for outcome in outcomes {
        let (rank_report, rank_edges) = outcome??;
        edges.extend(rank_edges);
        if let Some(rank_report) = rank_report {
            report = Some(rank_report);
        }
    }
    let report = report.ok_or(JobError::RankPanicked)?;
    Ok(JobOutcome { report, edges })
}

type RankOutcome = (Option<JobReport>, Vec<EdgeFlow>);

fn rank_main(comm: LocalComm, seed: Vec<Vertex>, threads: usize) -> Result<RankOutcome, JobError> {
    let partition_start = Instant::now();
    let store = partition_and_migrate(&comm, seed)?;
    let partition_time = partition_start.elapsed();

    let engine = Engine::new(store, &comm, threads);
    let run_start = Instant::now();
    let total = engine.run()?;
    let runtime = run_start.elapsed();

    let store = engine.into_store();
    let edges = store.edge_flows();
    let report = total.map(|max_flow| JobReport::new(max_flow, partition_time, runtime));
    Ok((report, edges))
}
