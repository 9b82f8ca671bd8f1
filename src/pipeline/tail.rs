//! Bounded log tail kept by tools for post-failure diagnostics

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Fixed-capacity line buffer, oldest lines evicted first
#[derive(Debug)]
pub struct TailBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl TailBuffer {
    /// Default number of retained lines
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Creates a buffer keeping at most `capacity` lines
    ///
    /// A capacity of zero keeps nothing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Appends a line, evicting the oldest when full
    pub fn push(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Removes and returns every buffered line, oldest first
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        self.lines.lock().drain(..).collect()
    }

    /// Copies the buffered lines without removing them
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// Number of buffered lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Returns true if nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Maximum number of lines
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TailBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
