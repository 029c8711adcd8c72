//! Single-slot overwrite queue.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A blocking queue that holds at most the most recently published value.
///
/// Publishing overwrites an unread value, so a consumer that polls slower
/// than the producer only ever observes the newest item, never a backlog.
/// Closing wakes any blocked consumer.
pub struct LatestSlot<T> {
    slot: Mutex<SlotState<T>>,
    available: Condvar,
}

struct SlotState<T> {
    value: Option<T>,
    closed: bool,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(SlotState {
                value: None,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Publish a value, replacing any unread one.
    pub fn publish(&self, value: T) {
        let mut state = self.slot.lock();
        state.value = Some(value);
        self.available.notify_all();
    }

    /// Mark the slot closed and wake blocked consumers.
    pub fn close(&self) {
        let mut state = self.slot.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Whether the producer side has closed the slot.
    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Block until a value is available or `max_idle` elapses.
    ///
    /// Returns `None` when the slot is closed and drained, or when nothing
    /// arrives within the idle bound.
    pub fn take(&self, max_idle: Duration) -> Option<T> {
        let mut state = self.slot.lock();
        loop {
            if let Some(value) = state.value.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            if self
                .available
                .wait_for(&mut state, max_idle)
                .timed_out()
            {
                return state.value.take();
            }
        }
    }
}
