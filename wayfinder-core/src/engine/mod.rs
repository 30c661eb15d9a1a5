//! `GuidanceEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! GuidanceEngine::new()
//!     └─► start()        → telemetry worker spawned, status = Running
//!         └─► stop()     → worker signalled + joined, status = Stopped
//! ```
//!
//! Frames may be fed with `handle_frame` in any state; only telemetry
//! delivery depends on the worker. `start()`/`stop()` called in the wrong
//! state return an error rather than panicking.
//!
//! ## Threading
//!
//! `handle_frame` runs on the caller's thread (the frame source). It never
//! blocks on the network: telemetry is appended to the bounded queue and
//! delivered by the worker thread.

pub mod controller;

pub use controller::{DiagnosticsSnapshot, FrameController, FrameOutcome};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    detection::{ActionToken, Detection},
    error::{Result, WayfinderError},
    feedback::{dispatcher::CUE_RATE_LIMIT, ActuatorHandle, CueDispatcher, Dispatch},
    inference::{DetectorHandle, Frame},
    ipc::events::{DecisionEvent, EngineStatus, EngineStatusEvent},
    planning::{DecisionEngine, FrameGeometry},
    telemetry::{FlushOutcome, TelemetryConfig, TelemetryUploader, TelemetryWorker},
};

/// Broadcast channel capacity: 256 decision events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Default sampling stride: one detection pass per 15 camera frames.
pub const FRAME_STRIDE: u64 = 15;

/// Configuration for `GuidanceEngine`.
#[derive(Debug, Clone)]
pub struct GuidanceConfig {
    /// Run detection on every Nth frame. 0 is treated as 1. Default: 15.
    pub frame_stride: u64,
    /// Minimum spacing between non-STOP cues. Default: 1000 ms.
    pub cue_rate_limit: Duration,
    /// Pixel space of the detector output. Default: 320×320.
    pub reference_frame: FrameGeometry,
    pub telemetry: TelemetryConfig,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            frame_stride: FRAME_STRIDE,
            cue_rate_limit: CUE_RATE_LIMIT,
            reference_frame: FrameGeometry::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// The top-level engine handle.
///
/// `GuidanceEngine` is `Send + Sync`; all fields use interior mutability.
/// Wrap in `Arc<GuidanceEngine>` to feed frames from one thread while
/// another observes decisions or controls the lifecycle.
pub struct GuidanceEngine {
    config: GuidanceConfig,
    controller: FrameController,
    dispatcher: Arc<CueDispatcher>,
    telemetry: Arc<TelemetryUploader>,
    worker: Mutex<Option<TelemetryWorker>>,
    status: Mutex<EngineStatus>,
    decision_tx: broadcast::Sender<DecisionEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
}

impl GuidanceEngine {
    /// Create a new engine delivering telemetry over HTTP to
    /// `config.telemetry.base_url`. A missing or unusable endpoint leaves
    /// telemetry disabled; cues work either way.
    #[cfg(feature = "http")]
    pub fn new(config: GuidanceConfig, detector: DetectorHandle, actuator: ActuatorHandle) -> Self {
        let telemetry = Arc::new(TelemetryUploader::new(config.telemetry.clone()));
        Self::with_telemetry(config, detector, actuator, telemetry)
    }

    /// Create an engine around a caller-built uploader.
    pub fn with_telemetry(
        config: GuidanceConfig,
        detector: DetectorHandle,
        actuator: ActuatorHandle,
        telemetry: Arc<TelemetryUploader>,
    ) -> Self {
        let (decision_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(32);
        let dispatcher = Arc::new(CueDispatcher::with_rate_limit(
            actuator,
            config.cue_rate_limit,
        ));
        let controller = FrameController::new(
            detector,
            DecisionEngine::new(config.reference_frame),
            Arc::clone(&dispatcher),
            Arc::clone(&telemetry),
            config.frame_stride,
            decision_tx.clone(),
        );

        Self {
            config,
            controller,
            dispatcher,
            telemetry,
            worker: Mutex::new(None),
            status: Mutex::new(EngineStatus::Idle),
            decision_tx,
            status_tx,
        }
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    /// Start the telemetry worker on the configured flush interval.
    ///
    /// # Errors
    /// - `WayfinderError::AlreadyRunning` if already started.
    pub fn start(&self) -> Result<()> {
        let ticks = crossbeam_channel::tick(self.config.telemetry.flush_interval);
        self.start_with_ticker(ticks)
    }

    /// Start the telemetry worker driven by `ticks`.
    pub fn start_with_ticker(&self, ticks: Receiver<Instant>) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(WayfinderError::AlreadyRunning);
        }

        *worker = Some(TelemetryWorker::spawn_with_ticker(
            Arc::clone(&self.telemetry),
            ticks,
        )?);
        drop(worker);

        self.set_status(EngineStatus::Running, None);
        info!(
            stride = self.controller.stride(),
            telemetry = self.telemetry.is_enabled(),
            session_id = self.telemetry.session_id(),
            "guidance engine started"
        );
        Ok(())
    }

    /// Stop the telemetry worker and wait for it to exit. Queued events
    /// stay in memory and are delivered if the engine is restarted.
    ///
    /// # Errors
    /// - `WayfinderError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Err(WayfinderError::NotRunning);
        };
        worker.shutdown()?;
        self.set_status(EngineStatus::Stopped, None);
        info!(pending = self.telemetry.pending(), "guidance engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Feed one camera frame. `None` when skipped by the sampling stride.
    pub fn handle_frame(&self, frame: &Frame) -> Option<FrameOutcome> {
        self.controller.handle_frame(frame)
    }

    /// Decide on detections produced outside the engine.
    pub fn process_detections(&self, frame_seq: u64, detections: Vec<Detection>) -> FrameOutcome {
        self.controller.process(frame_seq, detections)
    }

    /// Re-announce the last dispatched cue, ignoring the rate limit.
    pub fn repeat_last_cue(&self) -> Dispatch {
        self.dispatcher.repeat_last_cue()
    }

    pub fn last_token(&self) -> ActionToken {
        self.controller.last_token()
    }

    /// Zero session counters and forget the last cue. Telemetry already
    /// queued is kept.
    pub fn reset_session(&self) {
        self.controller.reset_stats();
        info!("session statistics reset");
    }

    /// Run one flush cycle on the caller's thread.
    pub fn flush_telemetry(&self) -> FlushOutcome {
        self.telemetry.flush_once()
    }

    pub fn subscribe_decisions(&self) -> broadcast::Receiver<DecisionEvent> {
        self.decision_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.controller.diagnostics_snapshot()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryUploader> {
        &self.telemetry
    }

    pub fn dispatcher(&self) -> &Arc<CueDispatcher> {
        &self.dispatcher
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl std::fmt::Debug for GuidanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceEngine")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}
