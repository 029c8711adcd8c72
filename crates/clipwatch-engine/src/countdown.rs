//! Post-roll countdown.

/// Per-frame countdown gating whether a recording session stays open.
///
/// Re-armed to the full post-roll window on every positive detection,
/// decremented by one per frame otherwise, floored at zero.
#[derive(Debug, Clone, Copy)]
pub struct ActivityCountdown {
    window: u32,
    remaining: u32,
}

impl ActivityCountdown {
    /// Create an expired countdown with the given post-roll window.
    pub fn new(window: u32) -> Self {
        Self {
            window,
            remaining: 0,
        }
    }

    /// Reset to the full window.
    pub fn arm(&mut self) {
        self.remaining = self.window;
    }

    /// Decrement by one, floored at zero.
    pub fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Whether the window is still live.
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Frames left in the window.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_expired() {
        let countdown = ActivityCountdown::new(3);
        assert!(!countdown.is_active());
    }

    #[test]
    fn test_ticks_down_to_zero_and_floors() {
        let mut countdown = ActivityCountdown::new(3);
        countdown.arm();

        countdown.tick();
        assert_eq!(countdown.remaining(), 2);
        countdown.tick();
        assert_eq!(countdown.remaining(), 1);
        countdown.tick();
        assert_eq!(countdown.remaining(), 0);
        assert!(!countdown.is_active());

        countdown.tick();
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn test_rearm_resets_the_window() {
        let mut countdown = ActivityCountdown::new(3);
        countdown.arm();
        countdown.tick();
        countdown.tick();
        assert_eq!(countdown.remaining(), 1);

        countdown.arm();
        assert_eq!(countdown.remaining(), 3);
    }
}
