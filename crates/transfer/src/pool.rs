//! Bounded worker pool for chunk fetches

use hubcas_errors::Error;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-capacity pool of fetch slots.
///
/// Cloning yields another handle to the same slots, so a pool can be scoped
/// to one request or shared by every request of a client.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool; a capacity of zero is raised to one
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a slot; the slot is released when the permit drops
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the underlying semaphore was closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, Error> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_bounded_and_released() {
        let pool = WorkerPool::new(2);
        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn clones_share_capacity() {
        let pool = WorkerPool::new(1);
        let other = pool.clone();
        let _held = pool.acquire().await.unwrap();
        assert_eq!(other.available(), 0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(WorkerPool::new(0).capacity(), 1);
    }
}
