//! Per-session counters and clock, owned by the orchestrator.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SessionTally {
    started: Instant,
    batches: usize,
    assist_requests: usize,
}

impl Default for SessionTally {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTally {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            batches: 0,
            assist_requests: 0,
        }
    }

    /// Restart the clock and zero every counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number the next batch, starting at 1.
    pub fn next_batch(&mut self) -> usize {
        self.batches += 1;
        self.batches
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Count one assistance request if `limit` allows it.
    pub fn try_request(&mut self, limit: usize) -> bool {
        if self.assist_requests >= limit {
            return false;
        }
        self.assist_requests += 1;
        true
    }

    pub fn assist_requests(&self) -> usize {
        self.assist_requests
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
