//! # dflow — distributed maximum flow
//!
//! Computes the maximum s–t flow of a directed capacitated graph with a
//! Ford–Fulkerson augmenting-path search distributed over `P` peer ranks,
//! each running `T` threads over a shared vertex partition.
//!
//! Each pass finds one augmenting path: a parallel labeling search fans
//! out from the source across rank boundaries, a Mattern-style two-color
//! token ring decides "no path exists this pass", and a backtracking walk
//! applies the bottleneck delta along the discovered path. The source is
//! vertex 0, the sink is vertex `N - 1`, and the answer is the total flow
//! out of the source once no augmenting path remains.
//!
//! ## Example
//!
//! ```rust
//! use dflow::graph::read_adjacency;
//! use dflow::job::run_cluster;
//!
//! // two vertices joined by one edge of capacity 5
//! let vertices = read_adjacency("2 1\n1 5\n".as_bytes()).unwrap();
//! let outcome = run_cluster(vertices, 2, 2).unwrap();
//! assert_eq!(outcome.report.max_flow, 5);
//! ```

pub mod comm;
pub mod config;
pub mod engine;
pub mod graph;
pub mod job;
pub mod partition;
pub mod report;

pub use config::JobConfig;
pub use job::{run_cluster, run_job, JobError, JobOutcome};
pub use report::JobReport;
