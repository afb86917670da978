//! The block tracker: a height-keyed gate other components block on to be
//! woken when a new height is durably appended.
//!
//! Waits for heights more than `grace_distance` above the committed top
//! fail immediately instead of parking forever on a height that may never
//! come. The timeout parameter is the synchronous stand-in for caller
//! cancellation: the tracker never aborts a wait on its own.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use lattice_types::BlockHeight;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("requested future block {requested} outside of grace range (current {current})")]
    OutOfGrace {
        requested: BlockHeight,
        current: BlockHeight,
    },

    #[error("timed out waiting for block at height {requested}")]
    Timeout { requested: BlockHeight },
}

/// Condition-variable gate over the durably-committed block height.
#[derive(Debug)]
pub struct BlockTracker {
    current: Mutex<BlockHeight>,
    reached: Condvar,
    grace_distance: u64,
}

impl BlockTracker {
    pub fn new(start_height: BlockHeight, grace_distance: u64) -> Self {
        Self {
            current: Mutex::new(start_height),
            reached: Condvar::new(),
            grace_distance,
        }
    }

    pub fn current_height(&self) -> BlockHeight {
        *self.current.lock().expect("tracker lock poisoned")
    }

    /// Blocks until `height` has been durably appended.
    ///
    /// Fails immediately with [`TrackerError::OutOfGrace`] when `height`
    /// exceeds the current height by more than the grace distance, and with
    /// [`TrackerError::Timeout`] when the deadline passes first.
    pub fn wait_for_block(
        &self,
        height: BlockHeight,
        timeout: Duration,
    ) -> Result<(), TrackerError> {
        let mut current = self.current.lock().expect("tracker lock poisoned");

        if height > current.saturating_add(self.grace_distance) {
            return Err(TrackerError::OutOfGrace {
                requested: height,
                current: *current,
            });
        }

        let deadline = Instant::now() + timeout;
        while *current < height {
            let now = Instant::now();
            if now >= deadline {
                return Err(TrackerError::Timeout { requested: height });
            }
            let (guard, _) = self
                .reached
                .wait_timeout(current, deadline - now)
                .expect("tracker lock poisoned");
            current = guard;
        }
        Ok(())
    }

    /// Monotonic bump after a durable append; wakes every waiter.
    pub(crate) fn advance_to(&self, height: BlockHeight) {
        let mut current = self.current.lock().expect("tracker lock poisoned");
        if height > *current {
            *current = height;
            self.reached.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_wait_outside_grace_fails_immediately() {
        let tracker = BlockTracker::new(1, 1);
        let err = tracker
            .wait_for_block(3, Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(
            err,
            TrackerError::OutOfGrace {
                requested: 3,
                current: 1
            }
        );
    }

    #[test]
    fn test_wait_within_grace_times_out() {
        let tracker = BlockTracker::new(1, 1);
        let err = tracker
            .wait_for_block(2, Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err, TrackerError::Timeout { requested: 2 });
    }

    #[test]
    fn test_wait_handles_height_zero_start() {
        // Grace arithmetic must not underflow on an empty log.
        let tracker = BlockTracker::new(0, 5);
        let err = tracker
            .wait_for_block(2, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, TrackerError::Timeout { requested: 2 });
    }

    #[test]
    fn test_already_reached_height_returns_without_waiting() {
        let tracker = BlockTracker::new(4, 1);
        tracker.wait_for_block(3, Duration::ZERO).unwrap();
        tracker.wait_for_block(4, Duration::ZERO).unwrap();
    }

    #[test]
    fn test_advance_wakes_waiter() {
        let tracker = Arc::new(BlockTracker::new(1, 2));
        let waiter = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || tracker.wait_for_block(3, Duration::from_secs(5)))
        };

        tracker.advance_to(2);
        tracker.advance_to(3);
        waiter.join().unwrap().unwrap();
        assert_eq!(tracker.current_height(), 3);
    }

    #[test]
    fn test_advance_wakes_two_concurrent_waiters() {
        let tracker = Arc::new(BlockTracker::new(1, 1));
        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || tracker.wait_for_block(2, Duration::from_secs(5)))
            })
            .collect();

        tracker.advance_to(2);
        for waiter in waiters {
            waiter.join().unwrap().unwrap();
        }
    }

    #[test]
    fn test_advance_is_monotonic() {
        let tracker = BlockTracker::new(5, 1);
        tracker.advance_to(3);
        assert_eq!(tracker.current_height(), 5);
    }
}
