//! Best-effort telemetry: bounded queue, periodic batched delivery, capped
//! exponential backoff.
//!
//! ## Flush cycle
//!
//! ```text
//! tick ─► endpoint configured? ── no ──► Disabled
//!              │ yes
//!         queue empty? ── yes ──► Idle
//!              │ no
//!         drain whole queue (lock held only for the drain)
//!              │
//!         serialise + deliver (queue lock released)
//!            ┌─┴──────────────┐
//!         success          failure
//!     backoff = floor   requeue batch at front, backoff = min(2×, ceiling)
//!                        worker waits `backoff` before the next tick
//! ```
//!
//! Producers (`enqueue`) and the flush path share only the queue, guarded
//! by one `parking_lot::Mutex`. The producer never waits on network I/O.

pub mod queue;
pub mod record;
pub mod sink;
pub mod worker;

pub use queue::{EventQueue, MAX_QUEUE_SIZE};
pub use record::{new_session_id, RecordContext, TelemetryEvent, TelemetryRecord};
pub use sink::TelemetrySink;
#[cfg(feature = "http")]
pub use sink::HttpSink;
pub use worker::TelemetryWorker;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::detection::{ActionToken, Detection};

/// Default period between flush attempts.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(5_000);
/// Backoff after a successful delivery.
pub const BACKOFF_FLOOR: Duration = Duration::from_millis(1_000);
/// Backoff never grows beyond this.
pub const BACKOFF_CEILING: Duration = Duration::from_millis(60_000);
/// Per-request connect/read/write timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for `TelemetryUploader`.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Collector base URL. `None` or blank disables telemetry.
    pub base_url: Option<String>,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
    pub request_timeout: Duration,
    pub client_id: String,
    pub app_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            flush_interval: FLUSH_INTERVAL,
            max_queue_size: MAX_QUEUE_SIZE,
            backoff_floor: BACKOFF_FLOOR,
            backoff_ceiling: BACKOFF_CEILING,
            request_timeout: REQUEST_TIMEOUT,
            client_id: "placeholder".into(),
            app_version: concat!("wayfinder-", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TelemetryConfig {
    /// Trimmed base URL without a trailing slash; `None` when telemetry is off.
    pub fn endpoint(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }
}

/// Result of one flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No endpoint configured.
    Disabled,
    /// Nothing queued.
    Idle,
    Delivered { events: usize },
    /// Delivery failed; the worker should wait `backoff` before retrying.
    Failed { requeued: usize, backoff: Duration },
}

#[derive(Debug, Default)]
pub struct TelemetryDiagnostics {
    pub events_enqueued: AtomicUsize,
    pub events_evicted: AtomicUsize,
    pub batches_sent: AtomicUsize,
    pub events_sent: AtomicUsize,
    pub batches_failed: AtomicUsize,
    /// Events lost because a failed batch no longer fit in the queue.
    pub events_dropped: AtomicUsize,
}

impl TelemetryDiagnostics {
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_evicted: self.events_evicted.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub events_enqueued: usize,
    pub events_evicted: usize,
    pub batches_sent: usize,
    pub events_sent: usize,
    pub batches_failed: usize,
    pub events_dropped: usize,
}

/// Queue + delivery state shared by producers and the flush worker.
pub struct TelemetryUploader {
    config: TelemetryConfig,
    session_id: String,
    queue: Mutex<EventQueue>,
    /// Also serialises flushes: only one cycle can hold the sink.
    sink: Mutex<Option<Box<dyn TelemetrySink>>>,
    enabled: bool,
    backoff: Mutex<Duration>,
    diagnostics: TelemetryDiagnostics,
}

impl TelemetryUploader {
    /// Build an uploader that posts to `config.base_url`. With no endpoint
    /// configured the uploader still queues events but never flushes them.
    ///
    /// An endpoint the HTTP sink rejects also leaves telemetry disabled;
    /// guidance never depends on delivery.
    #[cfg(feature = "http")]
    pub fn new(config: TelemetryConfig) -> Self {
        let sink: Option<Box<dyn TelemetrySink>> = match config.endpoint() {
            Some(base) => match HttpSink::new(base, config.request_timeout) {
                Ok(sink) => Some(Box::new(sink)),
                Err(e) => {
                    warn!(error = %e, "telemetry disabled: unusable endpoint");
                    None
                }
            },
            None => {
                info!("telemetry disabled: no endpoint configured");
                None
            }
        };
        Self::build(config, sink)
    }

    /// Build an uploader that delivers through `sink`.
    pub fn with_sink<S: TelemetrySink>(config: TelemetryConfig, sink: S) -> Self {
        Self::build(config, Some(Box::new(sink)))
    }

    /// Build an uploader with no delivery backend.
    pub fn disabled(config: TelemetryConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: TelemetryConfig, sink: Option<Box<dyn TelemetrySink>>) -> Self {
        let queue = EventQueue::new(config.max_queue_size);
        let backoff = config.backoff_floor;
        Self {
            session_id: new_session_id(),
            queue: Mutex::new(queue),
            enabled: sink.is_some(),
            sink: Mutex::new(sink),
            backoff: Mutex::new(backoff),
            diagnostics: TelemetryDiagnostics::default(),
            config,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a decision for delivery. CLEAR is ignored.
    ///
    /// Takes the queue lock only long enough to append (and possibly evict).
    pub fn enqueue(&self, token: ActionToken, detections: &[Detection]) {
        self.enqueue_at(token, detections, chrono::Utc::now().timestamp());
    }

    /// `enqueue` with an explicit client timestamp (unix seconds).
    pub fn enqueue_at(&self, token: ActionToken, detections: &[Detection], timestamp_seconds: i64) {
        if token.is_clear() {
            return;
        }
        let event = TelemetryEvent::new(token, detections.to_vec(), timestamp_seconds);
        let evicted = self.queue.lock().push(event);

        self.diagnostics
            .events_enqueued
            .fetch_add(1, Ordering::Relaxed);
        if evicted.is_some() {
            self.diagnostics
                .events_evicted
                .fetch_add(1, Ordering::Relaxed);
            debug!("telemetry queue full, evicted oldest event");
        }
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Copy of the queued events, oldest first.
    pub fn pending_events(&self) -> Vec<TelemetryEvent> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Delay the worker applies after the next failure's doubling.
    pub fn current_backoff(&self) -> Duration {
        *self.backoff.lock()
    }

    pub fn diagnostics(&self) -> TelemetrySnapshot {
        self.diagnostics.snapshot()
    }

    /// Run exactly one flush cycle. Never sleeps; on failure the returned
    /// `backoff` tells the caller how long to pause.
    pub fn flush_once(&self) -> FlushOutcome {
        let mut sink_guard = self.sink.lock();
        let Some(sink) = sink_guard.as_mut() else {
            return FlushOutcome::Disabled;
        };

        let batch = {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return FlushOutcome::Idle;
            }
            queue.drain_all()
        };

        let ctx = RecordContext {
            client_id: &self.config.client_id,
            session_id: &self.session_id,
            app_version: &self.config.app_version,
        };
        let records = record::build_batch(&batch, ctx);

        match sink.deliver(&records) {
            Ok(()) => {
                *self.backoff.lock() = self.config.backoff_floor;
                self.diagnostics.batches_sent.fetch_add(1, Ordering::Relaxed);
                self.diagnostics
                    .events_sent
                    .fetch_add(batch.len(), Ordering::Relaxed);
                debug!(batch = batch.len(), "flushed telemetry events");
                FlushOutcome::Delivered {
                    events: batch.len(),
                }
            }
            Err(e) => {
                drop(records);
                let failed = batch.len();
                let requeued = self.queue.lock().requeue_front(batch);
                let backoff = {
                    let mut backoff = self.backoff.lock();
                    *backoff = backoff
                        .saturating_mul(2)
                        .min(self.config.backoff_ceiling);
                    *backoff
                };

                self.diagnostics
                    .batches_failed
                    .fetch_add(1, Ordering::Relaxed);
                self.diagnostics
                    .events_dropped
                    .fetch_add(failed - requeued, Ordering::Relaxed);
                warn!(
                    error = %e,
                    batch = failed,
                    requeued,
                    backoff_ms = backoff.as_millis() as u64,
                    "telemetry flush failed, requeueing events"
                );
                FlushOutcome::Failed { requeued, backoff }
            }
        }
    }
}

impl std::fmt::Debug for TelemetryUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryUploader")
            .field("session_id", &self.session_id)
            .field("endpoint", &self.config.endpoint())
            .finish_non_exhaustive()
    }
}
