//! In-process cluster transport.
//!
//! Each rank runs as an OS thread inside one process. The inbound side of a
//! rank is a single zero-capacity channel: a send rendezvouses with the
//! receiver, giving the synchronous-send semantics and per-sender FIFO order
//! the algorithm requires. Collectives are a generation-counted accumulator
//! shared by the whole cluster; exactly one thread per rank enters them.
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::comm::message::{Envelope, Message};
use crate::comm::transport::{CommError, Transport};
use crate::graph::ids::Rank;

pub struct LocalCluster;

impl LocalCluster {
    /// Creates the communication handles for a cluster of `size` ranks.
    pub fn comms(size: usize) -> Vec<LocalComm> {
        let collective = Arc::new(Collective::new(size));
        let mut senders = Vec::with_capacity(size);
        let mut inboxes = Vec::with_capacity(size);
        for _ in 0..size {
            let (sender, receiver) = bounded(0);
            senders.push(sender);
            inboxes.push(receiver);
        }
        inboxes
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| LocalComm {
                rank: Rank::new(i as u32),
                size,
                peers: senders.clone(),
                inbox,
                collective: Arc::clone(&collective),
            })
            .collect()
    }
}

pub struct LocalComm {
    rank: Rank,
    size: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    collective: Arc<Collective>,
}

impl Transport for LocalComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn ssend(&self, to: Rank, msg: Message) -> Result<(), CommError> {
        let env = Envelope {
            src: self.rank,
            msg,
        };
        self.peers[to.0 as usize]
            .send(env)
            .map_err(|_| CommError::Disconnected(to))
    }

    fn try_ssend(&self, to: Rank, msg: Message) -> Result<bool, CommError> {
        let env = Envelope {
            src: self.rank,
            msg,
        };
        match self.peers[to.0 as usize].try_send(env) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(CommError::Disconnected(to)),
        }
    }

    fn recv(&self) -> Result<Envelope, CommError> {
        self.inbox.recv().map_err(|_| CommError::RecvClosed)
    }

    fn try_recv(&self) -> Result<Option<Envelope>, CommError> {
        match self.inbox.try_recv() {
            Ok(env) => Ok(Some(env)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CommError::RecvClosed),
        }
    }

    fn barrier(&self) {
        self.collective.barrier();
    }

    fn allreduce_sum(&self, value: i32) -> i32 {
        self.collective.allreduce_sum(value)
    }
}

struct Collective {
    size: usize,
    state: Mutex<CollectiveState>,
    arrived_cv: Condvar,
}

struct CollectiveState {
    arrived: usize,
    sum: i32,
    result: i32,
    generation: u64,
}

impl Collective {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(CollectiveState {
                arrived: 0,
                sum: 0,
                result: 0,
                generation: 0,
            }),
            arrived_cv: Condvar::new(),
        }
    }

    fn barrier(&self) {
        self.allreduce_sum(0);
    }

    fn allreduce_sum(&self, value: i32) -> i32 {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation;
        state.sum += value;
        state.arrived += 1;
        if state.arrived == self.size {
            state.result = state.sum;
            state.sum = 0;
            state.arrived = 0;
            state.generation += 1;
            self.arrived_cv.notify_all();
            state.result
        } else {
            while state.generation == generation {
                state = self.arrived_cv.wait(state).unwrap();
            }
            state.result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::transport::broadcast;
    use std::time::Duration;

    #[test]
    fn send_rendezvouses_with_receiver() {
        let comms = LocalCluster::comms(2);
        let (a, b) = {
            let mut it = comms.into_iter();
            (it.next().unwrap(), it.next().unwrap())
        };
        std::thread::scope(|s| {
            s.spawn(|| {
                a.ssend(Rank::new(1), Message::SinkFound).unwrap();
            });
            let env = b.recv().unwrap();
            assert_eq!(env.src, Rank::new(0));
            assert_eq!(env.msg, Message::SinkFound);
        });
    }

    #[test]
    fn try_ssend_fails_without_matching_receiver() {
        let comms = LocalCluster::comms(2);
        assert!(!comms[0]
            .try_ssend(Rank::new(1), Message::SinkFound)
            .unwrap());
    }

    #[test]
    fn try_recv_matches_blocked_sender() {
        let comms = LocalCluster::comms(2);
        let (a, b) = {
            let mut it = comms.into_iter();
            (it.next().unwrap(), it.next().unwrap())
        };
        std::thread::scope(|s| {
            s.spawn(|| {
                a.ssend(Rank::new(1), Message::TokenWhite).unwrap();
            });
            // give the sender time to block on the rendezvous
            std::thread::sleep(Duration::from_millis(20));
            let env = b.try_recv().unwrap().expect("sender should be waiting");
            assert_eq!(env.msg, Message::TokenWhite);
        });
    }

    #[test]
    fn allreduce_sums_across_ranks() {
        let comms = LocalCluster::comms(3);
        std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| s.spawn(move || comm.allreduce_sum(comm.rank().0 as i32 + 1)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), 6);
            }
        });
    }

    #[test]
    fn allreduce_is_reusable_across_rounds() {
        let comms = LocalCluster::comms(2);
        std::thread::scope(|s| {
            for comm in &comms {
                s.spawn(move || {
                    assert_eq!(comm.allreduce_sum(1), 2);
                    comm.barrier();
                    assert_eq!(comm.allreduce_sum(2), 4);
                });
            }
        });
    }

    #[test]
    fn broadcast_delivers_to_all_ranks() {
        let comms = LocalCluster::comms(3);
        std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let payload =
                            (comm.rank() == Rank::new(0)).then(|| vec![4u32, 5, 6]);
                        broadcast(comm, Rank::new(0), payload.as_ref()).unwrap()
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), vec![4u32, 5, 6]);
            }
        });
    }
}
