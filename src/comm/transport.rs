//! The transport seam between peer ranks.
//!
//! Point-to-point sends are synchronous: `ssend` completes only once the
//! receiver has matched the message. Together with per-sender FIFO order
//! this is what the termination detector relies on — a message can never be
//! in flight unobserved while its sender runs ahead.
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::comm::message::{Envelope, Message, Tag};
use crate::graph::ids::Rank;

#[derive(Debug, Error)]
pub enum CommError {
    #[error("channel to rank {0} is closed")]
    Disconnected(Rank),
    #[error("inbound channel closed")]
    RecvClosed,
    #[error("broadcast root supplied no payload")]
    MissingBroadcastPayload,
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub trait Transport: Send + Sync {
    fn rank(&self) -> Rank;
    fn size(&self) -> usize;

    /// Synchronous tagged send; blocks until the receiver matches it.
    fn ssend(&self, to: Rank, msg: Message) -> Result<(), CommError>;

    /// Non-blocking variant of [`Transport::ssend`]; returns `false` when
    /// the receiver is not currently matching.
    fn try_ssend(&self, to: Rank, msg: Message) -> Result<bool, CommError>;

    /// Blocking receive from any source, any tag.
    fn recv(&self) -> Result<Envelope, CommError>;

    /// Non-blocking probe-and-receive.
    fn try_recv(&self) -> Result<Option<Envelope>, CommError>;

    /// Inter-rank barrier; exactly one thread per rank participates.
    fn barrier(&self);

    /// Sum all-reduce; exactly one thread per rank participates.
    fn allreduce_sum(&self, value: i32) -> i32;

    fn next_rank(&self) -> Rank {
        self.rank().next(self.size())
    }

    fn prev_rank(&self) -> Rank {
        self.rank().prev(self.size())
    }

    /// Waits for a message with the given tag and sender, discarding any
    /// non-matching messages.
    fn recv_matching(&self, tag: Tag, from: Rank) -> Result<(), CommError> {
        loop {
            let env = self.recv()?;
            if env.msg.tag() == tag && env.src == from {
                return Ok(());
            }
            debug!(
                "discarding {} from R{} while waiting for {} from R{from}",
                env.msg.tag(),
                env.src,
                tag
            );
        }
    }

    /// Waits for a message with the given tag from any sender.
    fn recv_tagged(&self, tag: Tag) -> Result<Envelope, CommError> {
        loop {
            let env = self.recv()?;
            if env.msg.tag() == tag {
                return Ok(env);
            }
            debug!(
                "discarding {} from R{} while waiting for {tag}",
                env.msg.tag(),
                env.src
            );
        }
    }

    /// Consumes every pending inbound message; returns how many were taken.
    fn drain(&self) -> Result<usize, CommError> {
        let mut count = 0;
        while self.try_recv()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

/// Root-to-all broadcast of one serializable value, built from synchronous
/// point-to-point sends. Every rank must call this with the same root.
pub fn broadcast<T, V>(transport: &T, root: Rank, value: Option<&V>) -> Result<V, CommError>
where
    T: Transport + ?Sized,
    V: Serialize + DeserializeOwned,
{
    if transport.rank() == root {
        let value = value.ok_or(CommError::MissingBroadcastPayload)?;
        let bytes = serde_json::to_vec(value)?;
        for rank in 0..transport.size() {
            let rank = Rank::new(rank as u32);
            if rank != root {
                transport.ssend(rank, Message::Bootstrap(bytes.clone()))?;
            }
        }
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        loop {
            let env = transport.recv()?;
            match env.msg {
                Message::Bootstrap(bytes) if env.src == root => {
                    return Ok(serde_json::from_slice(&bytes)?);
                }
                other => debug!(
                    "discarding {} from R{} while waiting for bootstrap data",
                    other.tag(),
                    env.src
                ),
            }
        }
    }
}
