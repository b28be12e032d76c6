//! Global cap on in-flight page fetches, independent of the worker count.
//!
//! Wraps a Tokio semaphore. A [`Permit`] is released when dropped, so every exit
//! path of a fetch (success, error, cancelled future) gives its slot back exactly once.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("limiter capacity must be at least 1")]
    Zero,
    #[error("limiter capacity {0} exceeds {max}", max = Semaphore::MAX_PERMITS)]
    TooLarge(usize),
}

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError::Zero);
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(CapacityError::TooLarge(capacity));
        }
        Ok(Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Wait for a free slot. Never fails; the semaphore is owned here and never closed.
    pub async fn acquire(&self) -> Permit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("limiter semaphore is never closed");

        self.acquired.fetch_add(1, Ordering::Relaxed);
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);

        Permit {
            _permit: permit,
            limiter: self,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest number of simultaneously held permits seen so far.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Right to perform one fetch. Dropping it releases the slot.
#[derive(Debug)]
pub struct Permit<'a> {
    _permit: SemaphorePermit<'a>,
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.limiter.released.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn out_of_range_capacity_is_rejected() {
        assert_eq!(ConcurrencyLimiter::new(0).unwrap_err(), CapacityError::Zero);
        assert_eq!(
            ConcurrencyLimiter::new(usize::MAX).unwrap_err(),
            CapacityError::TooLarge(usize::MAX)
        );
        assert!(ConcurrencyLimiter::new(Semaphore::MAX_PERMITS).is_ok());
        assert_eq!(ConcurrencyLimiter::new(3).unwrap().available(), 3);
    }

    #[tokio::test]
    async fn permit_is_released_on_drop() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        {
            let _p = limiter.acquire().await;
            assert_eq!(limiter.in_flight(), 1);
            assert_eq!(limiter.available(), 0);
        }
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.acquisitions(), limiter.releases());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_more_than_capacity_active() {
        let limiter = Arc::new(ConcurrencyLimiter::new(2).unwrap());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert!(limiter.peak_in_flight() <= 2);
        assert_eq!(limiter.acquisitions(), 5);
        assert_eq!(limiter.releases(), 5);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_leak() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let held = limiter.acquire().await;
        let waited = tokio::time::timeout(Duration::from_millis(10), limiter.acquire()).await;
        assert!(waited.is_err());
        drop(held);
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.acquisitions(), limiter.releases());
    }
}
