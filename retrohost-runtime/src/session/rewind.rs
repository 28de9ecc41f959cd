use std::collections::VecDeque;

/// Bounded ring of serialized snapshots, newest at the back.
#[derive(Debug, Default)]
pub struct RewindBuffer {
    capacity: usize,
    interval: u32,
    snapshots: VecDeque<Vec<u8>>,
}

impl RewindBuffer {
    /// `capacity == 0` disables rewind.
    pub fn new(capacity: usize, interval: u32) -> Self {
        Self {
            capacity,
            interval: interval.max(1),
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Whether frame number `frame` should be captured.
    pub fn is_due(&self, frame: u64) -> bool {
        self.is_enabled() && frame % u64::from(self.interval) == 0
    }

    /// Capture a snapshot of `size` bytes, reusing the oldest buffer once the ring is
    /// full. `fill` returns `false` to discard the capture.
    pub fn capture(&mut self, size: usize, fill: impl FnOnce(&mut [u8]) -> bool) -> bool {
        if !self.is_enabled() || size == 0 {
            return false;
        }
        let mut buffer = if self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front().unwrap_or_default()
        } else {
            Vec::new()
        };
        buffer.resize(size, 0);
        if fill(&mut buffer) {
            self.snapshots.push_back(buffer);
            true
        } else {
            false
        }
    }

    /// Take the newest snapshot.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.snapshots.pop_back()
    }
}
