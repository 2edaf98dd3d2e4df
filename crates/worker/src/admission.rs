//! Counting permit pool bounding concurrent heavy operations.
//!
//! The pool size is the hardware's safe concurrency limit and is fixed at
//! construction. Waiters are served in FIFO order. There is no acquire
//! timeout here: how long a caller is willing to wait is decided by the
//! timeout supervisor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use infergate_core::error::CoreError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    outstanding: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Proof of admission. Dropping it returns the permit to the pool.
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    // `Drop::drop` runs before this field is dropped, so the counter is
    // decremented before the semaphore permit is returned.
    _inner: OwnedSemaphorePermit,
    outstanding: Arc<AtomicUsize>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AdmissionController {
    /// Create a pool of `capacity` permits.
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::Validation(
                "permit pool size must be at least 1".to_string(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(CoreError::Validation(format!(
                "permit pool size must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            outstanding: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait for a free permit.
    ///
    /// Only fails after [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> Result<Permit, CoreError> {
        let inner = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal("admission controller is closed".to_string()))?;

        let now = self.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);

        Ok(Permit {
            _inner: inner,
            outstanding: Arc::clone(&self.outstanding),
        })
    }

    /// Refuse all future acquisitions and wake current waiters with an error.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Highest number of permits ever held at the same time.
    pub fn peak_outstanding(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}
