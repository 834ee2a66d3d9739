use std::time::{Duration, Instant};

use super::backend::{FenceHandle, FenceStatus, GraphicsBackend};

/// How long a single fence poll may block, and when a wait counts as a stall.
#[derive(Debug, Clone)]
pub struct FencePolicy {
    pub poll_timeout: Duration,
    pub warn_after: Duration,
}

impl Default for FencePolicy {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(1),
            warn_after: Duration::from_millis(16),
        }
    }
}

/// A fence placed after the submission of some buffer region.
///
/// Once observed signalled it stays signalled without further queries.
#[derive(Debug)]
pub struct Fence {
    handle: FenceHandle,
    signalled: bool,
}

impl Fence {
    pub fn insert(backend: &mut dyn GraphicsBackend) -> Self {
        Self {
            handle: backend.insert_fence(),
            signalled: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> FenceHandle {
        self.handle
    }

    /// Non-blocking check.
    pub fn poll(&mut self, backend: &mut dyn GraphicsBackend) -> bool {
        if !self.signalled {
            self.signalled = backend.client_wait(self.handle, Duration::ZERO) == FenceStatus::Signalled;
        }
        self.signalled
    }

    /// Blocks until signalled and returns the time spent blocked.
    ///
    /// The wait is never abandoned. A stall beyond `policy.warn_after` is
    /// logged once.
    pub fn wait(&mut self, backend: &mut dyn GraphicsBackend, policy: &FencePolicy) -> Duration {
        if self.poll(backend) {
            return Duration::ZERO;
        }

        let started = Instant::now();
        let mut polls = 0u32;
        let mut warned = false;

        while backend.client_wait(self.handle, policy.poll_timeout) != FenceStatus::Signalled {
            polls += 1;
            let waited = started.elapsed();
            if !warned && waited >= policy.warn_after {
                log::warn!(
                    "long-running fence wait on {:?}: {:?} over {polls} polls",
                    self.handle,
                    waited
                );
                warned = true;
            }
        }

        self.signalled = true;
        let waited = started.elapsed();
        log::trace!("fence {:?} signalled after {:?}", self.handle, waited);
        waited
    }

    pub fn release(self, backend: &mut dyn GraphicsBackend) {
        backend.delete_fence(self.handle);
    }
}
