//! The distributed augmenting-path engine.
//!
//! Each pass runs in three steps. Step 1: thread 0 wipes the labels,
//! resets the pass flags and, on the rank owning the source, labels it
//! with the infinity sentinel and queues its edges. Step 2: thread 0
//! routes inbound messages while the remaining threads pop candidate
//! edges and extend labels, until either the sink is labeled somewhere or
//! the termination detector proves no rank has work left. Step 3: the
//! thread that claimed the backtracking role walks the back-pointers from
//! the sink, applying the bottleneck delta to every edge on the path,
//! hopping ranks through `UPDATE_FLOW` messages. Passes repeat until the
//! detector fires; the answer is the total flow out of the source.

pub mod backtrack;
pub mod context;
pub mod router;
pub mod worker;

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Barrier;

use log::debug;
use thiserror::Error;

use crate::comm::message::{Message, Tag};
use crate::comm::transport::{CommError, Transport};
use crate::engine::context::PassContext;
use crate::graph::ids::{GlobalId, LocalId, Rank};
use crate::graph::labels::{Labels, PrevRef, INFINITE_LABEL};
use crate::graph::queue::{EdgeQueue, EdgeRef};
use crate::graph::store::Store;

pub use context::Color;

/// Thread id of the message router on every rank.
pub const ROUTER_TID: i32 = 0;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("engine thread panicked")]
    ThreadPanicked,
}

/// How a thread left step 2.
pub(crate) enum StepOutcome {
    /// The pass ended; the payload is the sink-side index on the thread
    /// that labeled the sink.
    PassEnded(Option<LocalId>),
    /// The algorithm is complete; leave without touching more barriers.
    Exit,
}

pub struct Engine<'a, T: Transport> {
    pub(crate) transport: &'a T,
    pub(crate) store: Store,
    pub(crate) labels: Labels,
    pub(crate) queue: EdgeQueue,
    pub(crate) ctx: PassContext,
    threads: usize,
}

impl<'a, T: Transport> Engine<'a, T> {
    pub fn new(store: Store, transport: &'a T, threads: usize) -> Self {
        let labels = Labels::new(store.len());
        Self {
            transport,
            store,
            labels,
            queue: EdgeQueue::new(),
            ctx: PassContext::new(),
            threads,
        }
    }

    /// Runs passes until no augmenting path remains, then aggregates the
    /// answer at rank 0. Returns `Some(total)` on rank 0, `None` elsewhere.
    pub fn run(&self) -> Result<Option<i32>, EngineError> {
        let barrier = Barrier::new(self.threads);
        let mut failure = None;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.threads)
                .map(|tid| {
                    let barrier = &barrier;
                    scope.spawn(move || self.run_thread(tid as i32, barrier))
                })
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => failure = Some(EngineError::Comm(err)),
                    Err(_) => failure = Some(EngineError::ThreadPanicked),
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.aggregate_total_flow()?)
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    fn run_thread(&self, tid: i32, barrier: &Barrier) -> Result<(), CommError> {
        while !self.ctx.complete() {
            barrier.wait();
            if tid == ROUTER_TID {
                self.begin_pass();
            }
            barrier.wait();

            let outcome = if tid == ROUTER_TID {
                self.route_messages()?
            } else {
                self.work_edges(tid)?
            };
            let sink_idx = match outcome {
                StepOutcome::Exit => return Ok(()),
                StepOutcome::PassEnded(idx) => idx,
            };

            barrier.wait();
            if self.ctx.step3_owner() != tid {
                continue;
            }
            self.run_backtrack(sink_idx)?;
            self.ctx.advance_pass();
        }
        Ok(())
    }

    /// Step 1, run by thread 0 only.
    fn begin_pass(&self) {
        self.labels.wipe();
        self.ctx
            .reset_for_pass(self.transport.rank() == Rank::new(0));
        self.queue.clear();
        debug!("pass {}", self.ctx.pass());
        if let Some(src_idx) = self.store.lookup(self.store.source) {
            self.set_label(
                PrevRef {
                    node: self.store.source,
                    rank: self.transport.rank(),
                    local: Some(src_idx),
                },
                src_idx,
                INFINITE_LABEL,
            );
        }
    }

    /// Attempts the write-once label transition on `curr`. The winner
    /// fills the back-pointer and queues the vertex's edges; returns
    /// `true` when the labeled vertex is the sink.
    pub(crate) fn set_label(&self, prev: PrevRef, curr: LocalId, value: i32) -> bool {
        let slot = self.labels.slot(curr);
        if !slot.claim(value) {
            return false;
        }
        slot.set_prev(prev);
        if self.store.vertices[curr].id == self.store.sink {
            return true;
        }
        self.insert_edges(curr);
        false
    }

    /// Queues the unexplored edges of a freshly labeled vertex as one
    /// batch.
    fn insert_edges(&self, vert: LocalId) {
        let vertex = &self.store.vertices[vert];
        let came_from = self.labels.slot(vert).prev().map(|p| p.node);
        let mut batch = VecDeque::new();
        for (i, edge) in vertex.out_edges.iter().enumerate() {
            if edge
                .dest_local
                .is_some_and(|idx| self.labels.slot(idx).is_set())
            {
                continue;
            }
            if came_from == Some(edge.dest) {
                continue;
            }
            batch.push_back(EdgeRef::Out {
                vertex: vert,
                edge: i,
            });
        }
        for (i, edge) in vertex.in_edges.iter().enumerate() {
            if edge
                .src_local
                .is_some_and(|idx| self.labels.slot(idx).is_set())
            {
                continue;
            }
            if came_from == Some(edge.src) {
                continue;
            }
            batch.push_back(EdgeRef::In {
                vertex: vert,
                edge: i,
            });
        }
        debug!("queueing {} candidate edges from {}", batch.len(), vertex.id);
        if !batch.is_empty() {
            self.queue.splice(batch);
        }
    }

    /// Sums the flow out of the source and moves the total to rank 0.
    fn aggregate_total_flow(&self) -> Result<Option<i32>, CommError> {
        let local = self.store.source_outflow();
        if self.transport.rank() == Rank::new(0) {
            match local {
                Some(total) => Ok(Some(total)),
                None => {
                    let env = self.transport.recv_tagged(Tag::TotalFlow)?;
                    match env.msg {
                        Message::TotalFlow(total) => Ok(Some(total)),
                        _ => unreachable!("recv_tagged returned a non-matching tag"),
                    }
                }
            }
        } else {
            if let Some(total) = local {
                self.transport
                    .ssend(Rank::new(0), Message::TotalFlow(total))?;
            }
            Ok(None)
        }
    }

    /// Adds `delta` to the forward edge `from -> dest`, when this rank
    /// stores one.
    pub(crate) fn add_flow(&self, from: LocalId, dest: GlobalId, delta: i32) {
        if let Some(edge) = self.store.find_out_edge(from, dest) {
            edge.flow.fetch_add(delta, Ordering::SeqCst);
        }
    }
}
