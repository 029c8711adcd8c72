//! Pre-roll ring buffer.

use std::collections::VecDeque;

use clipwatch_capture::Frame;

/// Fixed-capacity buffer of the most recent frames, continuously refreshed
/// while the orchestrator is idle.
pub struct PreRollBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl PreRollBuffer {
    /// Create a buffer holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest once full.
    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Clone the current contents in arrival order. The snapshot is
    /// independent of later pushes.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.iter().cloned().collect()
    }

    /// Drop all buffered frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(sequence: u64) -> Frame {
        let data = Bytes::from(vec![0u8; Frame::rgb24_buffer_size(2, 2)]);
        Frame::new(data, 2, 2, 0, sequence)
    }

    fn sequences(frames: &[Frame]) -> Vec<u64> {
        frames.iter().map(|f| f.sequence).collect()
    }

    #[test]
    fn test_holds_most_recent_frames_in_order() {
        let mut buffer = PreRollBuffer::new(3);
        for sequence in 1..=5 {
            buffer.push(frame(sequence));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(sequences(&buffer.snapshot()), vec![3, 4, 5]);
    }

    #[test]
    fn test_partial_fill_during_warm_up() {
        let mut buffer = PreRollBuffer::new(10);
        buffer.push(frame(1));
        buffer.push(frame(2));

        assert_eq!(buffer.len(), 2);
        assert_eq!(sequences(&buffer.snapshot()), vec![1, 2]);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_pushes() {
        let mut buffer = PreRollBuffer::new(3);
        buffer.push(frame(1));
        buffer.push(frame(2));

        let snapshot = buffer.snapshot();
        buffer.push(frame(3));
        buffer.push(frame(4));

        assert_eq!(sequences(&snapshot), vec![1, 2]);
    }

    #[test]
    fn test_zero_capacity_is_promoted_to_one() {
        let mut buffer = PreRollBuffer::new(0);
        buffer.push(frame(1));
        buffer.push(frame(2));

        assert_eq!(buffer.capacity(), 1);
        assert_eq!(sequences(&buffer.snapshot()), vec![2]);
    }
}
