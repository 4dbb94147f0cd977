//! Step 3: walk the back-pointers from the sink and apply the bottleneck
//! delta to every edge on the augmenting path.
//!
//! Exactly one thread per rank runs this: the thread that labeled the sink
//! on the rank that found it, the router everywhere else. Before any flow
//! changes, the finder circulates `SINK_FOUND` around the ring twice — the
//! first circuit pulls every rank out of the labeling step, the second
//! confirms every rank is here and draining — after which each rank
//! flushes its inbound channel and enters a cluster barrier. A message
//! from the labeling step can therefore never leak into the next pass:
//! its sender would still be blocked in the send and could not have
//! reached the barrier.
use log::{debug, error};

use crate::comm::message::{Message, MessageData, Tag};
use crate::comm::transport::{CommError, Transport};
use crate::engine::Engine;
use crate::graph::ids::LocalId;

impl<'a, T: Transport> Engine<'a, T> {
    pub(crate) fn run_backtrack(&self, sink_idx: Option<LocalId>) -> Result<(), CommError> {
        let me = self.transport.rank();
        let peers = self.transport.size();

        // ring handshake; the finder needs its marker back twice
        if peers > 1 {
            let mut confirmations = if sink_idx.is_some() { 2 } else { 1 };
            while confirmations > 0 {
                debug!("sending SINK_FOUND to R{}", self.transport.next_rank());
                self.transport
                    .ssend(self.transport.next_rank(), Message::SinkFound)?;
                self.transport
                    .recv_matching(Tag::SinkFound, self.transport.prev_rank())?;
                confirmations -= 1;
            }
            if sink_idx.is_none() {
                // everyone but the finder passes the closing marker on
                self.transport
                    .ssend(self.transport.next_rank(), Message::SinkFound)?;
            }
        }

        let drained = self.transport.drain()?;
        if drained > 0 {
            debug!("discarded {drained} leftover messages before the flow update");
        }
        self.transport.barrier();

        let mut current = sink_idx;
        let mut delta = sink_idx.map(|idx| self.labels.slot(idx).value()).unwrap_or(0);
        let mut await_source_marker = false;
        loop {
            if let Some(idx) = current {
                if self.store.vertices[idx].id == self.store.source {
                    // the full path has been updated
                    await_source_marker = peers > 1;
                    break;
                }
                let Some(prev) = self.labels.slot(idx).prev() else {
                    error!("flow update reached an unlabeled vertex");
                    break;
                };
                let value = self.labels.slot(idx).value();
                if value > 0 && prev.rank == me {
                    if let Some(prev_idx) = prev.local {
                        self.add_flow(prev_idx, self.store.vertices[idx].id, delta);
                    }
                } else if value < 0 {
                    // flow pushed backward lives on our own forward edge
                    self.add_flow(idx, prev.node, -delta);
                }
                if prev.rank != me {
                    debug!("sending UPDATE_FLOW to R{}", prev.rank);
                    self.transport.ssend(
                        prev.rank,
                        Message::UpdateFlow(MessageData {
                            sender: self.store.vertices[idx].id,
                            receiver: prev.node,
                            value: delta,
                            pass: self.ctx.pass(),
                        }),
                    )?;
                    current = None;
                } else {
                    current = prev.local;
                }
            } else {
                let env = self.transport.recv()?;
                debug!("got {} from R{}", env.msg.tag(), env.src);
                match env.msg {
                    Message::SourceFound => break,
                    Message::UpdateFlow(data) => {
                        delta = data.value;
                        let Some(idx) = self.store.lookup(data.receiver) else {
                            error!(
                                "UPDATE_FLOW for {} delivered to the wrong rank",
                                data.receiver
                            );
                            continue;
                        };
                        self.add_flow(idx, data.sender, delta);
                        current = Some(idx);
                    }
                    Message::SetToLabel(_)
                    | Message::ComputeFromLabel(_)
                    | Message::TokenWhite
                    | Message::TokenRed => {
                        debug!("discarding stale {} during the flow update", env.msg.tag())
                    }
                    other => error!("unexpected {} during the flow update", other.tag()),
                }
            }
        }

        if peers > 1 {
            debug!("sending SOURCE_FOUND to R{}", self.transport.next_rank());
            self.transport
                .ssend(self.transport.next_rank(), Message::SourceFound)?;
        }
        if await_source_marker {
            self.transport
                .recv_matching(Tag::SourceFound, self.transport.prev_rank())?;
        }
        self.transport.barrier();
        Ok(())
    }
}
