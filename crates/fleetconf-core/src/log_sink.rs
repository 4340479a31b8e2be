//! Append-only log sink with a bounded queue.
//!
//! Producers never block: when the queue is full the newest entry is
//! discarded and a counter is bumped. A consumer (serial console, telnet,
//! admin endpoint) drains entries in arrival order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Longest entry kept, in bytes. Longer entries are cut on a char boundary.
pub const MAX_ENTRY_BYTES: usize = 256;

/// Best-effort, non-blocking log destination.
pub trait LogSink: Send + Sync {
    fn append(&self, text: &str);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn append(&self, text: &str) {
        (**self).append(text)
    }
}

/// Fixed-capacity FIFO of log lines, drop-newest on overflow.
#[derive(Debug)]
pub struct BoundedLogQueue {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl BoundedLogQueue {
    /// Create a queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Remove and return up to `max` of the oldest entries.
    pub fn drain(&self, max: usize) -> Vec<String> {
        match self.entries.lock() {
            Ok(mut entries) => {
                let n = max.min(entries.len());
                entries.drain(..n).collect()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Entries discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Entries currently queued.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl LogSink for BoundedLogQueue {
    fn append(&self, text: &str) {
        // The lock is only ever held for a push or a drain.
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        if entries.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        entries.push_back(truncate(text, MAX_ENTRY_BYTES).to_string());
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
