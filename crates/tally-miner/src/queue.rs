use std::collections::VecDeque;

use crate::request::PendingBlockRequest;

/// FIFO of requests waiting for the worker. A retried request re-enters at
/// the front, ahead of anything queued after it.
#[derive(Debug, Default)]
pub struct MiningQueue {
    requests: VecDeque<PendingBlockRequest>,
}

impl MiningQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, request: PendingBlockRequest) {
        self.requests.push_back(request);
    }

    pub fn push_front(&mut self, request: PendingBlockRequest) {
        self.requests.push_front(request);
    }

    pub fn pop_front(&mut self) -> Option<PendingBlockRequest> {
        self.requests.pop_front()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Resolve every queued request `false` without mining it. Returns how
    /// many were dropped.
    pub fn drain_failed(&mut self) -> usize {
        let dropped = self.requests.len();
        for request in self.requests.drain(..) {
            request.resolve(Ok(false));
        }
        dropped
    }
}
