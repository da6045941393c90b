use std::collections::VecDeque;

/// Upper bound on lines kept per tunnel, also the default.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity FIFO of log lines. Pushing past capacity drops the oldest line.
/// Capacity is clamped to `1..=DEFAULT_CAPACITY`.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, DEFAULT_CAPACITY);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// Copy of the last `max` lines, oldest first.
    pub fn tail(&self, max: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(max);
        self.lines.iter().skip(skip).cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Prefix a line with the local wall-clock time, e.g. "[14:03:59] Tunnel started".
pub fn stamp(line: &str) -> String {
    format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), line)
}
