//! Per-vertex label slots with write-once semantics.
//!
//! A slot is empty (value 0) or set to a non-zero signed value for the rest
//! of the pass. Claiming a slot is a compare-and-set from empty; only the
//! winning thread fills the back-pointer and enqueues follow-up work.
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use crate::graph::ids::{GlobalId, LocalId, Rank};
use crate::graph::index_vec::IndexVec;

/// The sentinel label given to the source at the start of every pass.
pub const INFINITE_LABEL: i32 = i32::MAX;

/// Back-pointer to the predecessor on the candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrevRef {
    pub node: GlobalId,
    pub rank: Rank,
    /// Local index of the predecessor, when it lives on this rank.
    pub local: Option<LocalId>,
}

pub struct LabelSlot {
    value: AtomicI32,
    prev: Mutex<Option<PrevRef>>,
}

impl LabelSlot {
    pub fn new() -> Self {
        Self {
            value: AtomicI32::new(0),
            prev: Mutex::new(None),
        }
    }

    pub fn value(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.value() != 0
    }

    /// Attempts the empty-to-set transition. Returns `true` for the single
    /// winner; losers must treat the label as already set.
    pub fn claim(&self, value: i32) -> bool {
        self.value
            .compare_exchange(0, value, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn set_prev(&self, prev: PrevRef) {
        *self.prev.lock().unwrap() = Some(prev);
    }

    pub fn prev(&self) -> Option<PrevRef> {
        *self.prev.lock().unwrap()
    }

    fn clear(&self) {
        self.value.store(0, Ordering::SeqCst);
        *self.prev.lock().unwrap() = None;
    }
}

impl Default for LabelSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One slot per locally owned vertex.
pub struct Labels {
    slots: IndexVec<LocalId, LabelSlot>,
}

impl Labels {
    pub fn new(count: usize) -> Self {
        Self {
            slots: IndexVec::from((0..count).map(|_| LabelSlot::new()).collect::<Vec<_>>()),
        }
    }

    pub fn slot(&self, idx: LocalId) -> &LabelSlot {
        &self.slots[idx]
    }

    /// Empties every slot; run by thread 0 at the start of each pass.
    pub fn wipe(&self) {
        for slot in self.slots.iter() {
            slot.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn claim_is_write_once() {
        let slot = LabelSlot::new();
        assert!(slot.claim(7));
        assert!(!slot.claim(9));
        assert_eq!(slot.value(), 7);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let slot = LabelSlot::new();
        let winners = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for value in 1..=8 {
                let slot = &slot;
                let winners = &winners;
                s.spawn(move || {
                    if slot.claim(value) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(slot.is_set());
    }

    #[test]
    fn wipe_resets_slots() {
        let labels = Labels::new(3);
        let idx = LocalId::new(1);
        assert!(labels.slot(idx).claim(-4));
        labels.slot(idx).set_prev(PrevRef {
            node: GlobalId::new(2),
            rank: Rank::new(0),
            local: None,
        });
        labels.wipe();
        assert!(!labels.slot(idx).is_set());
        assert_eq!(labels.slot(idx).prev(), None);
        assert!(labels.slot(idx).claim(1));
    }
}
