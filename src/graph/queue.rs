//! Concurrent queue of candidate edges awaiting exploration.
//!
//! Two-segment design with separate head and tail locks, so enqueue and
//! dequeue proceed in parallel. A batch built from one newly labeled vertex
//! is spliced in under the tail lock in a single operation, which keeps the
//! bulk enqueue atomic with respect to `pop` and bounds lock hold time.
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::graph::ids::LocalId;

/// A candidate edge, referring into one of the two edge tables of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRef {
    /// Forward exploration along `out_edges[edge]` of `vertex`.
    Out { vertex: LocalId, edge: usize },
    /// Backward exploration along `in_edges[edge]` of `vertex`.
    In { vertex: LocalId, edge: usize },
}

pub struct EdgeQueue {
    head: Mutex<VecDeque<EdgeRef>>,
    tail: Mutex<VecDeque<EdgeRef>>,
}

impl EdgeQueue {
    pub fn new() -> Self {
        Self {
            head: Mutex::new(VecDeque::new()),
            tail: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, entry: EdgeRef) {
        self.tail.lock().unwrap().push_back(entry);
    }

    /// Moves a locally built batch into the queue in one step.
    pub fn splice(&self, mut batch: VecDeque<EdgeRef>) {
        self.tail.lock().unwrap().append(&mut batch);
    }

    /// Pops the oldest entry, refilling the head segment from the tail
    /// segment when it runs dry.
    pub fn pop(&self) -> Option<EdgeRef> {
        let mut head = self.head.lock().unwrap();
        if head.is_empty() {
            let mut tail = self.tail.lock().unwrap();
            std::mem::swap(&mut *head, &mut *tail);
        }
        head.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.head.lock().unwrap().is_empty() && self.tail.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.head.lock().unwrap().clear();
        self.tail.lock().unwrap().clear();
    }
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vertex: u32, edge: usize) -> EdgeRef {
        EdgeRef::Out {
            vertex: LocalId::new(vertex),
            edge,
        }
    }

    #[test]
    fn pop_is_fifo() {
        let queue = EdgeQueue::new();
        for i in 0..4 {
            queue.push(entry(i, 0));
        }
        for i in 0..4 {
            assert_eq!(queue.pop(), Some(entry(i, 0)));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn splice_keeps_batch_contiguous() {
        let queue = EdgeQueue::new();
        queue.push(entry(0, 0));
        queue.splice(VecDeque::from(vec![entry(1, 0), entry(1, 1), entry(1, 2)]));
        queue.push(entry(2, 0));
        let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(
            drained,
            vec![entry(0, 0), entry(1, 0), entry(1, 1), entry(1, 2), entry(2, 0)]
        );
    }

    #[test]
    fn concurrent_producers_and_consumers_lose_nothing() {
        let queue = EdgeQueue::new();
        let produced = 4 * 500;
        let counted = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for p in 0..4u32 {
                let queue = &queue;
                s.spawn(move || {
                    for i in 0..500 {
                        queue.push(entry(p, i));
                    }
                });
            }
            for _ in 0..3 {
                let queue = &queue;
                let counted = &counted;
                s.spawn(move || loop {
                    if queue.pop().is_some() {
                        counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    } else if counted.load(std::sync::atomic::Ordering::SeqCst) == produced {
                        break;
                    } else {
                        std::thread::yield_now();
                    }
                });
            }
        });
        assert_eq!(counted.load(std::sync::atomic::Ordering::SeqCst), produced);
    }
}
