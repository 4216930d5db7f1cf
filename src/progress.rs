//! Progress-callback trait for per-job conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to be told
//! when a job starts, as each hop runs, and when the job ends.
//!
//! # Example
//!
//! ```rust
//! use docforge::{ConversionProgressCallback, ConverterConfig, EngineKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct HopCounter {
//!     hops: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for HopCounter {
//!     fn on_hop_complete(&self, _job_id: &str, hop: usize, total: usize, engine: EngineKind, outputs: usize) {
//!         self.hops.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("hop {hop}/{total} ({engine}) wrote {outputs} file(s)");
//!     }
//! }
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(Arc::new(HopCounter { hops: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::engine::EngineKind;
use crate::error::ErrorKind;
use std::sync::Arc;

/// Called by the orchestrator as a job moves through its route.
///
/// Implementations must be `Send + Sync`: different jobs run concurrently
/// and report through the same callback. Every method has a no-op default.
pub trait ConversionProgressCallback: Send + Sync {
    /// The job was admitted and its route computed.
    ///
    /// # Arguments
    /// * `job_id` — job identifier
    /// * `total_hops` — number of engine hops in the route
    fn on_job_start(&self, job_id: &str, total_hops: usize) {
        let _ = (job_id, total_hops);
    }

    /// An engine hop is about to run (1-indexed).
    fn on_hop_start(&self, job_id: &str, hop: usize, total_hops: usize, engine: EngineKind) {
        let _ = (job_id, hop, total_hops, engine);
    }

    /// A hop failed transiently and is being retried.
    fn on_hop_retry(&self, job_id: &str, hop: usize, engine: EngineKind, error: &str) {
        let _ = (job_id, hop, engine, error);
    }

    /// A hop finished; `outputs` is the number of files it produced.
    fn on_hop_complete(
        &self,
        job_id: &str,
        hop: usize,
        total_hops: usize,
        engine: EngineKind,
        outputs: usize,
    ) {
        let _ = (job_id, hop, total_hops, engine, outputs);
    }

    /// The job ended. `error` is `None` on success.
    fn on_job_complete(&self, job_id: &str, artifacts: usize, error: Option<ErrorKind>) {
        let _ = (job_id, artifacts, error);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        hops: AtomicUsize,
        retries: AtomicUsize,
        finished: Mutex<Option<Option<ErrorKind>>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_hop_complete(&self, _: &str, _: usize, _: usize, _: EngineKind, _: usize) {
            self.hops.fetch_add(1, Ordering::SeqCst);
        }

        fn on_hop_retry(&self, _: &str, _: usize, _: EngineKind, _: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _: &str, _: usize, error: Option<ErrorKind>) {
            *self.finished.lock().unwrap() = Some(error);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start("j", 2);
        cb.on_hop_start("j", 1, 2, EngineKind::Office);
        cb.on_hop_retry("j", 1, EngineKind::Office, "timeout");
        cb.on_hop_complete("j", 1, 2, EngineKind::Office, 1);
        cb.on_job_complete("j", 1, None);
    }

    #[test]
    fn recorder_receives_events() {
        let r = Recorder::default();
        r.on_hop_complete("j", 1, 2, EngineKind::Office, 1);
        r.on_hop_retry("j", 2, EngineKind::Office, "timeout");
        r.on_hop_complete("j", 2, 2, EngineKind::Pdf, 3);
        r.on_job_complete("j", 3, Some(ErrorKind::EngineTimeout));
        assert_eq!(r.hops.load(Ordering::SeqCst), 2);
        assert_eq!(r.retries.load(Ordering::SeqCst), 1);
        assert_eq!(
            *r.finished.lock().unwrap(),
            Some(Some(ErrorKind::EngineTimeout))
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_job_start("j", 1);
    }
}
