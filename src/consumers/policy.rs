use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How many orders may be processed concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingPolicy {
    /// One task per delivered message, no limit.
    #[default]
    Unbounded,
    /// At most `n` orders in flight. Once the limit is reached the consumption loop stops
    /// pulling messages until a slot frees up or a fresh channel is announced.
    Bounded(NonZeroUsize),
}

impl ProcessingPolicy {
    /// `Bounded` for a positive limit, `Unbounded` otherwise.
    pub fn from_limit(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Self::Unbounded, Self::Bounded)
    }

    pub(crate) fn limiter(&self) -> Limiter {
        match self {
            Self::Unbounded => Limiter(None),
            Self::Bounded(n) => Limiter(Some(Arc::new(Semaphore::new(n.get())))),
        }
    }
}

/// Enforces a [`ProcessingPolicy`] across the lifetime of a consumption loop.
#[derive(Clone)]
pub(crate) struct Limiter(Option<Arc<Semaphore>>);

impl Limiter {
    /// Wait for a processing slot. Always `None` when unbounded.
    pub(crate) async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.0 {
            None => None,
            // The semaphore is never closed.
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
        }
    }
}
