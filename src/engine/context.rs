//! Shared per-pass state, lifted out of the thread loops.
//!
//! Every flag here has concurrent readers, so everything is atomic. The
//! token fields implement the two-color ring: a rank turns red when it
//! sends work to a lower rank, a forwarded token inherits red from a red
//! forwarder, and only a white token completing a full circuit lets rank 0
//! start the quiescence check.
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use crate::graph::ids::Rank;

/// No thread has claimed the backtracking role yet.
pub const NO_THREAD: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Red,
}

impl Color {
    fn encode(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Red => 1,
        }
    }

    fn decode(raw: u8) -> Color {
        if raw == 0 {
            Color::White
        } else {
            Color::Red
        }
    }
}

pub struct PassContext {
    pass: AtomicI32,
    pub working_threads: AtomicI32,
    sink_found: AtomicBool,
    algorithm_complete: AtomicBool,
    queue_is_empty: AtomicBool,
    have_token: AtomicBool,
    token_color: AtomicU8,
    my_color: AtomicU8,
    step3_tid: AtomicI32,
}

impl PassContext {
    pub fn new() -> Self {
        Self {
            pass: AtomicI32::new(1),
            working_threads: AtomicI32::new(0),
            sink_found: AtomicBool::new(false),
            algorithm_complete: AtomicBool::new(false),
            queue_is_empty: AtomicBool::new(false),
            have_token: AtomicBool::new(false),
            token_color: AtomicU8::new(Color::White.encode()),
            my_color: AtomicU8::new(Color::White.encode()),
            step3_tid: AtomicI32::new(NO_THREAD),
        }
    }

    /// Step-1 reset; `holds_token` is true on rank 0, which emits the
    /// fresh white token each pass.
    pub fn reset_for_pass(&self, holds_token: bool) {
        self.working_threads.store(0, Ordering::SeqCst);
        self.sink_found.store(false, Ordering::SeqCst);
        self.queue_is_empty.store(false, Ordering::SeqCst);
        self.have_token.store(holds_token, Ordering::SeqCst);
        self.token_color
            .store(Color::White.encode(), Ordering::SeqCst);
        self.my_color.store(Color::White.encode(), Ordering::SeqCst);
        self.step3_tid.store(NO_THREAD, Ordering::SeqCst);
    }

    pub fn pass(&self) -> i32 {
        self.pass.load(Ordering::SeqCst)
    }

    pub fn advance_pass(&self) {
        self.pass.fetch_add(1, Ordering::SeqCst);
    }

    pub fn sink_found(&self) -> bool {
        self.sink_found.load(Ordering::SeqCst)
    }

    pub fn set_sink_found(&self) {
        self.sink_found.store(true, Ordering::SeqCst);
    }

    pub fn complete(&self) -> bool {
        self.algorithm_complete.load(Ordering::SeqCst)
    }

    pub fn set_complete(&self) {
        self.algorithm_complete.store(true, Ordering::SeqCst);
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue_is_empty.load(Ordering::SeqCst)
    }

    pub fn set_queue_empty(&self, empty: bool) {
        self.queue_is_empty.store(empty, Ordering::SeqCst);
    }

    pub fn working(&self) -> i32 {
        self.working_threads.load(Ordering::SeqCst)
    }

    /// Claims the backtracking role for `tid`; `Err` carries the earlier
    /// claimant.
    pub fn claim_step3(&self, tid: i32) -> Result<(), i32> {
        match self.step3_tid.compare_exchange(
            NO_THREAD,
            tid,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(previous) => Err(previous),
        }
    }

    pub fn step3_owner(&self) -> i32 {
        self.step3_tid.load(Ordering::SeqCst)
    }

    /// Takes the token if this rank currently holds it.
    pub fn take_token(&self) -> bool {
        self.have_token
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn give_token(&self) {
        self.have_token.store(true, Ordering::SeqCst);
    }

    pub fn token_color(&self) -> Color {
        Color::decode(self.token_color.load(Ordering::SeqCst))
    }

    pub fn set_token_color(&self, color: Color) {
        self.token_color.store(color.encode(), Ordering::SeqCst);
    }

    pub fn my_color(&self) -> Color {
        Color::decode(self.my_color.load(Ordering::SeqCst))
    }

    pub fn reset_my_color(&self) {
        self.my_color.store(Color::White.encode(), Ordering::SeqCst);
    }

    /// Sends to a lower-numbered rank stain this rank red until it next
    /// forwards the token.
    pub fn mark_send(&self, to: Rank, me: Rank) {
        if to < me {
            self.my_color.store(Color::Red.encode(), Ordering::SeqCst);
        }
    }
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step3_claim_has_one_winner() {
        let ctx = PassContext::new();
        assert_eq!(ctx.claim_step3(2), Ok(()));
        assert_eq!(ctx.claim_step3(5), Err(2));
        assert_eq!(ctx.step3_owner(), 2);
    }

    #[test]
    fn token_can_be_taken_once() {
        let ctx = PassContext::new();
        ctx.reset_for_pass(true);
        assert!(ctx.take_token());
        assert!(!ctx.take_token());
        ctx.give_token();
        assert!(ctx.take_token());
    }

    #[test]
    fn lower_rank_sends_turn_the_rank_red() {
        let ctx = PassContext::new();
        ctx.mark_send(Rank::new(2), Rank::new(1));
        assert_eq!(ctx.my_color(), Color::White);
        ctx.mark_send(Rank::new(0), Rank::new(1));
        assert_eq!(ctx.my_color(), Color::Red);
        ctx.reset_my_color();
        assert_eq!(ctx.my_color(), Color::White);
    }

    #[test]
    fn reset_prepares_the_next_pass() {
        let ctx = PassContext::new();
        ctx.set_sink_found();
        ctx.set_queue_empty(true);
        ctx.claim_step3(3).unwrap();
        ctx.advance_pass();
        ctx.reset_for_pass(false);
        assert!(!ctx.sink_found());
        assert!(!ctx.queue_is_empty());
        assert_eq!(ctx.step3_owner(), NO_THREAD);
        assert!(!ctx.take_token());
        assert_eq!(ctx.pass(), 2);
    }
}
