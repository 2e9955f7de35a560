use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

/// Device work queue.
///
/// Kernels are recorded as launched when enqueued; the host may only read
/// device memory after [`Stream::synchronize`] has drained every pending
/// launch.
#[derive(Debug, Default)]
pub struct Stream {
    launched: AtomicU64,
    completed: AtomicU64,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a kernel launch.
    pub fn launch(&self, kernel: &'static str, elements: usize) {
        let id = self.launched.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(kernel, elements, id, "launch");
    }

    /// Blocks until every launched kernel has completed.
    pub fn synchronize(&self) {
        let launched = self.launched.load(Ordering::Acquire);
        let previous = self.completed.swap(launched, Ordering::AcqRel);
        if previous != launched {
            trace!(drained = launched - previous, "synchronize");
        }
    }

    /// Launches not yet covered by a synchronize.
    pub fn pending(&self) -> u64 {
        let launched = self.launched.load(Ordering::Acquire);
        launched.saturating_sub(self.completed.load(Ordering::Acquire))
    }

    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronize_drains() {
        let stream = Stream::new();
        assert_eq!(stream.pending(), 0);
        stream.launch("fill", 4);
        stream.launch("add", 4);
        assert_eq!(stream.pending(), 2);
        assert_eq!(stream.launched(), 2);
        stream.synchronize();
        assert_eq!(stream.pending(), 0);
        stream.synchronize();
        assert_eq!(stream.pending(), 0);
    }
}
