//! Admission control: the only state shared between jobs.
//!
//! A semaphore sized to `max_concurrent_jobs` gates entry. Jobs that find it
//! exhausted are either rejected at once or queued for a bounded time,
//! depending on [`AdmissionPolicy`]. Either way an excess request ends in
//! [`ConvertError::Overloaded`]; nothing is dropped silently.

use crate::config::AdmissionPolicy;
use crate::error::ConvertError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct Admission {
    limit: usize,
    policy: AdmissionPolicy,
    slots: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    waiting: AtomicUsize,
}

/// Held for the lifetime of an admitted job. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decrements the waiter count however the wait ends.
struct Waiter<'a>(&'a AtomicUsize);

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Admission {
    pub fn new(limit: usize, policy: AdmissionPolicy) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            policy,
            slots: Arc::new(Semaphore::new(limit)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    fn grant(&self, permit: OwnedSemaphorePermit) -> AdmissionPermit {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        AdmissionPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn overloaded(&self, waited_ms: Option<u64>) -> ConvertError {
        ConvertError::Overloaded {
            in_flight: self.in_flight(),
            limit: self.limit,
            waited_ms,
        }
    }

    /// Take a job slot according to the configured policy.
    pub async fn admit(&self, cancel: &CancellationToken) -> Result<AdmissionPermit, ConvertError> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => return Ok(self.grant(permit)),
            Err(TryAcquireError::Closed) => return Err(self.overloaded(None)),
            Err(TryAcquireError::NoPermits) => {}
        }

        let (max_wait, max_queued) = match self.policy {
            AdmissionPolicy::Reject => return Err(self.overloaded(None)),
            AdmissionPolicy::Queue {
                max_wait,
                max_queued,
            } => (max_wait, max_queued),
        };

        if self.waiting.fetch_add(1, Ordering::SeqCst) >= max_queued {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(self.overloaded(None));
        }
        let _waiter = Waiter(&self.waiting);
        debug!(
            in_flight = self.in_flight(),
            waiting = self.waiting(),
            "All job slots busy; queueing"
        );

        let started = Instant::now();
        let acquire = tokio::time::timeout(max_wait, Arc::clone(&self.slots).acquire_owned());
        tokio::select! {
            res = acquire => match res {
                Ok(Ok(permit)) => Ok(self.grant(permit)),
                Ok(Err(_closed)) => Err(self.overloaded(None)),
                Err(_elapsed) => Err(self.overloaded(Some(started.elapsed().as_millis() as u64))),
            },
            _ = cancel.cancelled() => Err(ConvertError::cancelled("admission")),
        }
    }
}
