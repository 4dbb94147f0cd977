//! Initial graph partitioning and the one-time vertex migration.
//!
//! Rank 0 loads the whole graph, assigns every vertex an owning rank, then
//! broadcasts the owner table and ships each exported vertex to its owner.
//! The assignment walks the graph in breadth-first order from the source
//! and cuts the order into degree-balanced contiguous blocks, so adjacent
//! vertices tend to land on the same rank.
use log::{debug, info, warn};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comm::message::Message;
use crate::comm::transport::{broadcast, CommError, Transport};
use crate::graph::ids::{GlobalId, Rank};
use crate::graph::index_vec::{Idx, IndexVec};
use crate::graph::store::{InEdge, OutEdge, Store, Vertex};

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Wire form of a vertex in transit to its post-partition owner.
#[derive(Debug, Serialize, Deserialize)]
struct PackedVertex {
    id: GlobalId,
    out: Vec<PackedEdge>,
    incoming: Vec<GlobalId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PackedEdge {
    dest: GlobalId,
    capacity: i32,
    flow: i32,
}

impl From<&Vertex> for PackedVertex {
    fn from(vertex: &Vertex) -> Self {
        Self {
            id: vertex.id,
            out: vertex
                .out_edges
                .iter()
                .map(|e| PackedEdge {
                    dest: e.dest,
                    capacity: e.capacity,
                    flow: e.flow(),
                })
                .collect(),
            incoming: vertex.in_edges.iter().map(|e| e.src).collect(),
        }
    }
}

impl From<PackedVertex> for Vertex {
    fn from(packed: PackedVertex) -> Self {
        let mut vertex = Vertex::new(packed.id);
        vertex.out_edges = packed
            .out
            .into_iter()
            .map(|e| OutEdge::with_flow(e.dest, e.capacity, e.flow))
            .collect();
        vertex.in_edges = packed.incoming.into_iter().map(InEdge::new).collect();
        vertex
    }
}

/// Assigns every vertex an owning rank.
pub fn assign_owners(vertices: &[Vertex], parts: usize) -> IndexVec<GlobalId, Rank> {
    let n = vertices.len();
    let mut graph = UnGraph::<(), ()>::with_capacity(n, n);
    for _ in 0..n {
        graph.add_node(());
    }
    for vertex in vertices {
        for edge in &vertex.out_edges {
            graph.add_edge(
                NodeIndex::new(vertex.id.index()),
                NodeIndex::new(edge.dest.index()),
                (),
            );
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut seen = vec![false; n];
    let mut bfs = Bfs::new(&graph, NodeIndex::new(0));
    while let Some(node) = bfs.next(&graph) {
        order.push(node.index());
        seen[node.index()] = true;
    }
    for (id, seen) in seen.iter().enumerate() {
        if !seen {
            order.push(id);
        }
    }

    let weights: Vec<u64> = vertices
        .par_iter()
        .map(|v| (v.out_edges.len() + v.in_edges.len()).max(1) as u64)
        .collect();
    let total: u64 = weights.iter().sum();

    let mut owner = IndexVec::from(vec![Rank::new(0); n]);
    let parts = parts as u64;
    let mut part = 0u64;
    let mut assigned = 0u64;
    for id in order {
        let threshold = (total * (part + 1) + parts - 1) / parts;
        if part + 1 < parts && assigned >= threshold {
            part += 1;
        }
        owner[GlobalId::new(id as u64)] = Rank::new(part as u32);
        assigned += weights[id];
    }
    owner
}

/// Runs the partition step on every rank: rank 0 computes and broadcasts
/// the owner table and exports vertices; the other ranks receive their
/// share. Returns the local partition with all edge endpoints rewritten.
pub fn partition_and_migrate<T: Transport>(
    transport: &T,
    seed: Vec<Vertex>,
) -> Result<Store, PartitionError> {
    let me = transport.rank();
    let root = Rank::new(0);

    let owner: IndexVec<GlobalId, Rank> = broadcast(
        transport,
        root,
        (me == root)
            .then(|| assign_owners(&seed, transport.size()))
            .as_ref(),
    )?;

    let mut local = Vec::new();
    if me == root {
        let mut exported = 0usize;
        for vertex in seed {
            let dest = owner[vertex.id];
            if dest == me {
                local.push(vertex);
            } else {
                let bytes = serde_json::to_vec(&PackedVertex::from(&vertex))?;
                transport.ssend(dest, Message::Migrate(bytes))?;
                exported += 1;
            }
        }
        info!("kept {} vertices, exported {exported}", local.len());
    } else {
        let expected = owner.iter().filter(|rank| **rank == me).count();
        while local.len() < expected {
            let env = transport.recv()?;
            match env.msg {
                Message::Migrate(bytes) => {
                    let packed: PackedVertex = serde_json::from_slice(&bytes)?;
                    local.push(Vertex::from(packed));
                }
                other => warn!(
                    "discarding {} from R{} during migration",
                    other.tag(),
                    env.src
                ),
            }
        }
        debug!("received {} vertices", local.len());
    }

    transport.barrier();
    Ok(Store::build(local, owner, me))
}
