//! Labeling workers: every thread except the router pops candidate edges
//! and tries to extend the label frontier across them.
use std::sync::atomic::Ordering;

use log::{debug, error, info};

use crate::comm::message::{Message, MessageData};
use crate::comm::transport::{CommError, Transport};
use crate::engine::context::Color;
use crate::engine::{Engine, StepOutcome};
use crate::graph::ids::LocalId;
use crate::graph::labels::PrevRef;
use crate::graph::queue::EdgeRef;

impl<'a, T: Transport> Engine<'a, T> {
    pub(crate) fn work_edges(&self, tid: i32) -> Result<StepOutcome, CommError> {
        loop {
            // wait for an entry or for the pass to end
            let entry = loop {
                if self.ctx.complete() {
                    return Ok(StepOutcome::Exit);
                }
                if self.ctx.sink_found() {
                    return Ok(StepOutcome::PassEnded(None));
                }
                if let Some(entry) = self.queue.pop() {
                    break entry;
                }
                self.ctx.set_queue_empty(true);
                self.offer_token()?;
                std::thread::yield_now();
            };

            self.ctx.working_threads.fetch_add(1, Ordering::SeqCst);
            self.ctx.set_queue_empty(false);
            if self.ctx.sink_found() {
                self.ctx.working_threads.fetch_sub(1, Ordering::SeqCst);
                return Ok(StepOutcome::PassEnded(None));
            }

            let found = match entry {
                EdgeRef::Out { vertex, edge } => self.explore_out_edge(vertex, edge)?,
                EdgeRef::In { vertex, edge } => self.explore_in_edge(vertex, edge)?,
            };
            if let Some(sink_idx) = found {
                info!("sink labeled; ending the labeling step");
                self.claim_backtracking(tid);
                // wake the router so it leaves its receive loop before the
                // flow update begins
                self.transport
                    .ssend(self.transport.rank(), Message::SinkFound)?;
                self.ctx.set_sink_found();
                self.ctx.working_threads.fetch_sub(1, Ordering::SeqCst);
                return Ok(StepOutcome::PassEnded(Some(sink_idx)));
            }
            self.ctx.working_threads.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Forward exploration `u -> v`: label `v` with the residual
    /// bottleneck, locally or via `SET_TO_LABEL` to `v`'s owner.
    fn explore_out_edge(&self, from: LocalId, edge: usize) -> Result<Option<LocalId>, CommError> {
        let me = self.transport.rank();
        let vertex = &self.store.vertices[from];
        let out = &vertex.out_edges[edge];
        let residual = out.residual();
        if residual <= 0 {
            return Ok(None);
        }
        let value = self.labels.slot(from).value().abs().min(residual);
        if out.dest_rank == me {
            let Some(dest) = out.dest_local else {
                error!("local edge endpoint {} has no local index", out.dest);
                return Ok(None);
            };
            let prev = PrevRef {
                node: vertex.id,
                rank: me,
                local: Some(from),
            };
            if self.set_label(prev, dest, value) {
                return Ok(Some(dest));
            }
        } else {
            self.ctx.mark_send(out.dest_rank, me);
            debug!("sending SET_TO_LABEL to R{}", out.dest_rank);
            self.transport.ssend(
                out.dest_rank,
                Message::SetToLabel(MessageData {
                    sender: vertex.id,
                    receiver: out.dest,
                    value,
                    pass: self.ctx.pass(),
                }),
            )?;
        }
        Ok(None)
    }

    /// Backward exploration `v <- u`: push flow back toward `u`. The flow
    /// lives on `u`'s forward edge, so a remote `u` means its owner does
    /// the `min` on receipt of `COMPUTE_FROM_LABEL`.
    fn explore_in_edge(&self, to: LocalId, edge: usize) -> Result<Option<LocalId>, CommError> {
        let me = self.transport.rank();
        let vertex = &self.store.vertices[to];
        let rev = &vertex.in_edges[edge];
        if rev.src_rank == me {
            let Some(from) = rev.src_local else {
                error!("local edge endpoint {} has no local index", rev.src);
                return Ok(None);
            };
            let flow = self
                .store
                .find_local_out_edge(from, to)
                .map(|e| e.flow())
                .unwrap_or(0);
            if flow <= 0 {
                return Ok(None);
            }
            let value = -self.labels.slot(to).value().abs().min(flow);
            let prev = PrevRef {
                node: vertex.id,
                rank: me,
                local: Some(to),
            };
            if self.set_label(prev, from, value) {
                error!("sink labeled through one of its outgoing edges");
                return Ok(Some(from));
            }
        } else {
            self.ctx.mark_send(rev.src_rank, me);
            debug!("sending COMPUTE_FROM_LABEL to R{}", rev.src_rank);
            self.transport.ssend(
                rev.src_rank,
                Message::ComputeFromLabel(MessageData {
                    sender: vertex.id,
                    receiver: rev.src,
                    value: self.labels.slot(to).value(),
                    pass: self.ctx.pass(),
                }),
            )?;
        }
        Ok(None)
    }

    /// Forwards the termination token when this rank is idle and holds it.
    /// The token inherits red from a red rank; forwarding resets the rank
    /// to white.
    fn offer_token(&self) -> Result<(), CommError> {
        if self.ctx.working() != 0 || self.ctx.sink_found() {
            return Ok(());
        }
        if !self.ctx.take_token() {
            return Ok(());
        }
        if self.ctx.my_color() == Color::Red {
            self.ctx.set_token_color(Color::Red);
        }
        let msg = match self.ctx.token_color() {
            Color::White => Message::TokenWhite,
            Color::Red => Message::TokenRed,
        };
        let next = self.transport.next_rank();
        debug!(
            "queue empty; forwarding {} token to R{next}",
            match self.ctx.token_color() {
                Color::White => "white",
                Color::Red => "red",
            }
        );
        loop {
            if self.transport.try_ssend(next, msg.clone())? {
                self.ctx.reset_my_color();
                return Ok(());
            }
            if self.ctx.sink_found() || self.ctx.complete() {
                // the pass is ending under us; keep the token for the reset
                self.ctx.give_token();
                return Ok(());
            }
            std::thread::yield_now();
        }
    }
}
