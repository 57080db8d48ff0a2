//! Progress reporting and cooperative cancellation
//!
//! The engine reports `(index, total)` once per chunk, whether or not the
//! chunk succeeded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives one tick per processed chunk
pub trait ProgressSink {
    fn tick(&mut self, index: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize),
{
    fn tick(&mut self, index: usize, total: usize) {
        self(index, total)
    }
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&mut self, _index: usize, _total: usize) {}
}

/// Logs progress through `tracing`, at most once per percent
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
    last_percent: Option<usize>,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_percent: None,
        }
    }
}

impl ProgressSink for LogProgress {
    fn tick(&mut self, index: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            (index + 1) * 100 / total
        };
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            tracing::info!(chunk = index + 1, total, percent, "{}", self.label);
        }
    }
}

/// Shared flag checked by the engine between chunks
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |i: usize, t: usize| seen.push((i, t));
            sink.tick(0, 2);
            sink.tick(1, 2);
        }
        assert_eq!(seen, vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_log_progress_dedups_percent() {
        let mut sink = LogProgress::new("Creating new audio");
        for i in 0..1000 {
            sink.tick(i, 1000);
        }
        assert_eq!(sink.last_percent, Some(100));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
