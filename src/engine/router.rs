//! The message router: thread 0 of every rank services inbound messages
//! during the labeling step.
use std::sync::atomic::Ordering;

use log::{debug, error, info, warn};

use crate::comm::message::{Envelope, Message, MessageData};
use crate::comm::transport::{CommError, Transport};
use crate::engine::context::Color;
use crate::engine::{Engine, StepOutcome, ROUTER_TID};
use crate::graph::ids::{LocalId, Rank};
use crate::graph::labels::PrevRef;

/// What the router should do after dispatching one message.
pub(crate) enum RouterAction {
    Continue,
    /// The sink was labeled on this rank by the router itself.
    SinkHere(LocalId),
    /// The algorithm finished: every queue in the cluster is empty.
    Complete,
}

impl<'a, T: Transport> Engine<'a, T> {
    pub(crate) fn route_messages(&self) -> Result<StepOutcome, CommError> {
        let mut sink_idx = None;
        while !self.ctx.sink_found() {
            let env = self.transport.recv()?;
            self.ctx.working_threads.fetch_add(1, Ordering::SeqCst);
            debug!("got {} from R{}", env.msg.tag(), env.src);
            let action = self.dispatch(env)?;
            self.ctx.working_threads.fetch_sub(1, Ordering::SeqCst);
            match action {
                RouterAction::Continue => {}
                RouterAction::SinkHere(idx) => sink_idx = Some(idx),
                RouterAction::Complete => {
                    self.ctx.set_complete();
                    return Ok(StepOutcome::Exit);
                }
            }
        }
        Ok(StepOutcome::PassEnded(sink_idx))
    }

    fn dispatch(&self, env: Envelope) -> Result<RouterAction, CommError> {
        match env.msg {
            Message::SetToLabel(data) => Ok(self.on_set_to_label(env.src, data)),
            Message::ComputeFromLabel(data) => Ok(self.on_compute_from_label(env.src, data)),
            Message::SinkFound => self.on_sink_found(),
            Message::TokenWhite => self.on_token(Color::White),
            Message::TokenRed => self.on_token(Color::Red),
            Message::CheckTermination => Ok(self.on_check_termination()),
            other => {
                error!("unexpected {} during the labeling step", other.tag());
                Ok(RouterAction::Continue)
            }
        }
    }

    /// A remote rank labeled one of our vertices through a forward edge.
    fn on_set_to_label(&self, src: Rank, data: MessageData) -> RouterAction {
        let Some(idx) = self.store.lookup(data.receiver) else {
            error!("SET_TO_LABEL for {} delivered to the wrong rank", data.receiver);
            return RouterAction::Continue;
        };
        if data.pass != self.ctx.pass() {
            warn!(
                "dropping stale SET_TO_LABEL from pass {} (current {})",
                data.pass,
                self.ctx.pass()
            );
            return RouterAction::Continue;
        }
        let prev = PrevRef {
            node: data.sender,
            rank: src,
            local: None,
        };
        if self.set_label(prev, idx, data.value) {
            self.claim_backtracking(ROUTER_TID);
            self.ctx.set_sink_found();
            return RouterAction::SinkHere(idx);
        }
        RouterAction::Continue
    }

    /// A remote rank wants to push flow back along one of our forward
    /// edges; we hold the flow, so we do the `min` and the label attempt.
    fn on_compute_from_label(&self, src: Rank, data: MessageData) -> RouterAction {
        let Some(idx) = self.store.lookup(data.receiver) else {
            error!(
                "COMPUTE_FROM_LABEL for {} delivered to the wrong rank",
                data.receiver
            );
            return RouterAction::Continue;
        };
        if data.pass != self.ctx.pass() {
            warn!(
                "dropping stale COMPUTE_FROM_LABEL from pass {} (current {})",
                data.pass,
                self.ctx.pass()
            );
            return RouterAction::Continue;
        }
        let flow = self
            .store
            .find_out_edge(idx, data.sender)
            .map(|edge| edge.flow())
            .unwrap_or(0);
        if flow <= 0 {
            return RouterAction::Continue;
        }
        let value = -data.value.abs().min(flow);
        let prev = PrevRef {
            node: data.sender,
            rank: src,
            local: None,
        };
        if self.set_label(prev, idx, value) {
            error!("sink labeled through one of its outgoing edges");
            self.claim_backtracking(ROUTER_TID);
            self.ctx.set_sink_found();
            return RouterAction::SinkHere(idx);
        }
        RouterAction::Continue
    }

    fn on_sink_found(&self) -> Result<RouterAction, CommError> {
        if self.transport.size() > 1 {
            match self.ctx.claim_step3(ROUTER_TID) {
                Ok(()) => debug!("router drives the flow update"),
                Err(tid) => debug!("thread {tid} drives the flow update"),
            }
            self.ctx.set_sink_found();
        } else {
            // single rank: release any worker still offering the token
            self.ctx.set_sink_found();
            while let Some(env) = self.transport.try_recv()? {
                match env.msg {
                    Message::TokenWhite | Message::TokenRed => {
                        debug!("drained a {} while ending the pass", env.msg.tag())
                    }
                    other => warn!("discarding {} while ending the pass", other.tag()),
                }
            }
        }
        Ok(RouterAction::Continue)
    }

    fn on_token(&self, color: Color) -> Result<RouterAction, CommError> {
        self.ctx.set_token_color(color);
        if self.transport.rank() == Rank::new(0) {
            if color == Color::White {
                debug!("white token completed a circuit; checking quiescence");
                for rank in 1..self.transport.size() {
                    self.transport
                        .ssend(Rank::new(rank as u32), Message::CheckTermination)?;
                }
                if self.quiescence_check() {
                    return Ok(RouterAction::Complete);
                }
                debug!("some rank still has work; keeping the token");
            } else {
                // a red token is discarded; the next one we emit is white
                self.ctx.set_token_color(Color::White);
            }
        }
        self.ctx.give_token();
        Ok(RouterAction::Continue)
    }

    fn on_check_termination(&self) -> RouterAction {
        if self.quiescence_check() {
            RouterAction::Complete
        } else {
            RouterAction::Continue
        }
    }

    /// All-reduce of the local queue state; a zero sum means every rank is
    /// out of work and no augmenting path exists. The flag alone can be
    /// stale-true after this router queued fresh work, so the real queue
    /// state and the worker counter are consulted as well; the counter is
    /// held at one by this router's own receipt.
    fn quiescence_check(&self) -> bool {
        let idle =
            self.ctx.queue_is_empty() && self.queue.is_empty() && self.ctx.working() == 1;
        let contribution = if idle { 0 } else { 1 };
        let sum = self.transport.allreduce_sum(contribution);
        if sum == 0 {
            info!("no augmenting path remains");
            true
        } else {
            false
        }
    }

    pub(crate) fn claim_backtracking(&self, tid: i32) {
        if let Err(owner) = self.ctx.claim_step3(tid) {
            error!("thread {owner} already claimed the flow update");
        }
    }
}
