//! One-shot startup latch for sharded gateways.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a [`ReadyLatch`] is in its single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LatchState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
}

impl LatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LatchState::Uninitialized,
            1 => LatchState::Initializing,
            _ => LatchState::Ready,
        }
    }
}

/// Lets exactly one caller run startup work, however many Ready events
/// arrive and from however many shards.
///
/// `Uninitialized -> Initializing` is a single `compare_exchange`, so two
/// shards becoming ready at once cannot both win.
#[derive(Debug, Default)]
pub struct ReadyLatch {
    state: AtomicU8,
}

impl ReadyLatch {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(LatchState::Uninitialized as u8),
        }
    }

    /// Claims the startup work. Returns `true` for the first caller only.
    pub fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(
                LatchState::Uninitialized as u8,
                LatchState::Initializing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Marks the startup work finished. Set even when it failed; the latch
    /// never re-arms.
    pub fn complete(&self) {
        self.state.store(LatchState::Ready as u8, Ordering::Release);
    }

    pub fn state(&self) -> LatchState {
        LatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LatchState::Ready
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_latch_transitions_once() {
        let latch = ReadyLatch::new();
        assert_eq!(latch.state(), LatchState::Uninitialized);

        assert!(latch.try_begin());
        assert_eq!(latch.state(), LatchState::Initializing);
        assert!(!latch.try_begin());

        latch.complete();
        assert!(latch.is_ready());
        assert!(!latch.try_begin());
    }

    #[test]
    fn test_only_one_thread_wins() {
        let latch = Arc::new(ReadyLatch::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if latch.try_begin() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
