//! In-memory representation of the local vertex partition.
//!
//! Every rank owns a disjoint slice of the graph. A vertex carries its
//! outgoing edges (with capacity and flow) and its incoming reverse edges
//! (metadata only; flow lives at the source end of the forward edge). The
//! `(rank, local index)` fields on edge endpoints are filled in once after
//! migration and never change afterwards; only the `flow` fields mutate.
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::graph::ids::{GlobalId, LocalId, Rank};
use crate::graph::index_vec::IndexVec;

/// A forward edge stored at its source vertex.
pub struct OutEdge {
    pub dest: GlobalId,
    pub dest_local: Option<LocalId>,
    pub dest_rank: Rank,
    pub capacity: i32,
    pub flow: AtomicI32,
}

impl OutEdge {
    pub fn new(dest: GlobalId, capacity: i32) -> Self {
        Self::with_flow(dest, capacity, 0)
    }

    pub fn with_flow(dest: GlobalId, capacity: i32, flow: i32) -> Self {
        Self {
            dest,
            dest_local: None,
            dest_rank: Rank::new(0),
            capacity,
            flow: AtomicI32::new(flow),
        }
    }

    pub fn flow(&self) -> i32 {
        self.flow.load(Ordering::SeqCst)
    }

    pub fn residual(&self) -> i32 {
        self.capacity - self.flow()
    }
}

impl fmt::Debug for OutEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutEdge")
            .field("dest", &self.dest)
            .field("capacity", &self.capacity)
            .field("flow", &self.flow())
            .finish()
    }
}

/// A reverse edge stored at the destination of the forward edge.
#[derive(Debug)]
pub struct InEdge {
    pub src: GlobalId,
    pub src_local: Option<LocalId>,
    pub src_rank: Rank,
}

impl InEdge {
    pub fn new(src: GlobalId) -> Self {
        Self {
            src,
            src_local: None,
            src_rank: Rank::new(0),
        }
    }
}

#[derive(Debug)]
pub struct Vertex {
    pub id: GlobalId,
    pub out_edges: Vec<OutEdge>,
    pub in_edges: Vec<InEdge>,
}

impl Vertex {
    pub fn new(id: GlobalId) -> Self {
        Self {
            id,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        }
    }
}

/// Final flow on one forward edge, collected after a run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EdgeFlow {
    pub from: GlobalId,
    pub to: GlobalId,
    pub capacity: i32,
    pub flow: i32,
}

/// The local partition plus the lookup tables serving inbound messages.
pub struct Store {
    pub vertices: IndexVec<LocalId, Vertex>,
    global_to_local: FxHashMap<GlobalId, LocalId>,
    pub owner: IndexVec<GlobalId, Rank>,
    pub source: GlobalId,
    pub sink: GlobalId,
}

impl Store {
    /// Builds the partition from the locally owned vertices, rewriting the
    /// `(rank, local index)` fields of every edge endpoint from the owner
    /// table. The owner table is identical on every rank.
    pub fn build(local: Vec<Vertex>, owner: IndexVec<GlobalId, Rank>, my_rank: Rank) -> Self {
        let mut vertices = IndexVec::new();
        let mut global_to_local = FxHashMap::default();
        for vertex in local {
            let id = vertex.id;
            let idx = vertices.push(vertex);
            global_to_local.insert(id, idx);
        }

        let sink = GlobalId::new(owner.len() as u64 - 1);
        let mut store = Self {
            vertices,
            global_to_local,
            owner,
            source: GlobalId::new(0),
            sink,
        };

        for idx in 0..store.vertices.len() {
            let idx = LocalId::new(idx as u32);
            let mut out_endpoints = Vec::with_capacity(store.vertices[idx].out_edges.len());
            for edge in &store.vertices[idx].out_edges {
                let rank = store.owner[edge.dest];
                let local = (rank == my_rank)
                    .then(|| store.global_to_local.get(&edge.dest).copied())
                    .flatten();
                out_endpoints.push((rank, local));
            }
            let mut in_endpoints = Vec::with_capacity(store.vertices[idx].in_edges.len());
            for edge in &store.vertices[idx].in_edges {
                let rank = store.owner[edge.src];
                let local = (rank == my_rank)
                    .then(|| store.global_to_local.get(&edge.src).copied())
                    .flatten();
                in_endpoints.push((rank, local));
            }
            let vertex = &mut store.vertices[idx];
            for (edge, (rank, local)) in vertex.out_edges.iter_mut().zip(out_endpoints) {
                edge.dest_rank = rank;
                edge.dest_local = local;
            }
            for (edge, (rank, local)) in vertex.in_edges.iter_mut().zip(in_endpoints) {
                edge.src_rank = rank;
                edge.src_local = local;
            }
        }

        store
    }

    /// Maps a global id to its local index. Returns `None` for vertices
    /// this rank does not own.
    pub fn lookup(&self, id: GlobalId) -> Option<LocalId> {
        self.global_to_local.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The forward edge `from -> dest`, if this rank stores one.
    // TODO: dense vertices would benefit from a per-vertex destination index
    pub fn find_out_edge(&self, from: LocalId, dest: GlobalId) -> Option<&OutEdge> {
        self.vertices[from].out_edges.iter().find(|e| e.dest == dest)
    }

    /// The forward edge between two locally owned vertices.
    pub fn find_local_out_edge(&self, from: LocalId, to: LocalId) -> Option<&OutEdge> {
        self.vertices[from]
            .out_edges
            .iter()
            .find(|e| e.dest_local == Some(to))
    }

    /// Total flow leaving the source, if this rank owns it.
    pub fn source_outflow(&self) -> Option<i32> {
        self.lookup(self.source).map(|idx| {
            self.vertices[idx]
                .out_edges
                .iter()
                .map(|e| e.flow())
                .sum()
        })
    }

    /// Snapshot of every locally stored forward edge.
    pub fn edge_flows(&self) -> Vec<EdgeFlow> {
        let mut flows = Vec::new();
        for vertex in self.vertices.iter() {
            for edge in &vertex.out_edges {
                flows.push(EdgeFlow {
                    from: vertex.id,
                    to: edge.dest,
                    capacity: edge.capacity,
                    flow: edge.flow(),
                });
            }
        }
        flows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertex_partition() -> Store {
        let mut a = Vertex::new(GlobalId::new(0));
        a.out_edges.push(OutEdge::new(GlobalId::new(1), 5));
        a.out_edges.push(OutEdge::new(GlobalId::new(2), 3));
        let mut b = Vertex::new(GlobalId::new(1));
        b.in_edges.push(InEdge::new(GlobalId::new(0)));
        let owner = IndexVec::from(vec![Rank::new(0), Rank::new(0), Rank::new(1)]);
        Store::build(vec![a, b], owner, Rank::new(0))
    }

    #[test]
    fn build_fills_local_endpoints() {
        let store = two_vertex_partition();
        let src = store.lookup(GlobalId::new(0)).unwrap();
        let local_edge = &store.vertices[src].out_edges[0];
        assert_eq!(local_edge.dest_rank, Rank::new(0));
        assert_eq!(local_edge.dest_local, store.lookup(GlobalId::new(1)));

        let remote_edge = &store.vertices[src].out_edges[1];
        assert_eq!(remote_edge.dest_rank, Rank::new(1));
        assert_eq!(remote_edge.dest_local, None);
    }

    #[test]
    fn lookup_misses_remote_vertices() {
        let store = two_vertex_partition();
        assert!(store.lookup(GlobalId::new(2)).is_none());
    }

    #[test]
    fn source_outflow_sums_edges() {
        let store = two_vertex_partition();
        let src = store.lookup(GlobalId::new(0)).unwrap();
        store.vertices[src].out_edges[0]
            .flow
            .store(4, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(store.source_outflow(), Some(4));
    }
}
