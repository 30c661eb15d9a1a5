//! Per-frame orchestration.
//!
//! ## Stages (per frame)
//!
//! ```text
//! 1. Count the frame; skip unless it is the stride-th one
//! 2. Detector::infer → detections (errors degrade to an empty set)
//! 3. DecisionEngine::evaluate → ActionToken
//! 4. CueDispatcher::emit (rate-limited, STOP bypasses)
//! 5. TelemetryUploader::enqueue for every non-CLEAR decision
//! 6. Broadcast DecisionEvent
//! ```
//!
//! Nothing here touches the network: enqueue only appends under the queue
//! lock, delivery happens on the telemetry worker.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, trace};

use crate::{
    detection::{ActionToken, Detection},
    feedback::{CueDispatcher, Dispatch},
    inference::{DetectorHandle, Frame},
    ipc::events::DecisionEvent,
    planning::DecisionEngine,
    telemetry::TelemetryUploader,
};

#[derive(Debug, Default)]
pub struct ControllerDiagnostics {
    pub frames_processed: AtomicUsize,
    pub detector_errors: AtomicUsize,
    pub cues_dispatched: AtomicUsize,
    pub cues_suppressed: AtomicUsize,
    pub events_enqueued: AtomicUsize,
}

impl ControllerDiagnostics {
    pub fn reset(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.detector_errors.store(0, Ordering::Relaxed);
        self.cues_dispatched.store(0, Ordering::Relaxed);
        self.cues_suppressed.store(0, Ordering::Relaxed);
        self.events_enqueued.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub frames_in: u64,
    pub frames_processed: usize,
    pub detector_errors: usize,
    pub cues_dispatched: usize,
    pub cues_suppressed: usize,
    pub events_enqueued: usize,
    pub stop_count: usize,
    pub veer_count: usize,
    pub actuator_errors: usize,
}

/// What happened to one sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub token: ActionToken,
    pub dispatch: Dispatch,
    pub detections: Vec<Detection>,
}

/// Wires detector → decision engine → {dispatcher, telemetry}.
pub struct FrameController {
    detector: DetectorHandle,
    engine: DecisionEngine,
    dispatcher: Arc<CueDispatcher>,
    telemetry: Arc<TelemetryUploader>,
    /// Run detection on every `stride`-th frame (≥ 1).
    stride: u64,
    last_token: Mutex<ActionToken>,
    /// Set after the first detector failure so later ones log at debug.
    detector_error_reported: AtomicBool,
    diagnostics: ControllerDiagnostics,
    decision_tx: broadcast::Sender<DecisionEvent>,
    seq: AtomicU64,
}

impl FrameController {
    pub fn new(
        detector: DetectorHandle,
        engine: DecisionEngine,
        dispatcher: Arc<CueDispatcher>,
        telemetry: Arc<TelemetryUploader>,
        stride: u64,
        decision_tx: broadcast::Sender<DecisionEvent>,
    ) -> Self {
        Self {
            detector,
            engine,
            dispatcher,
            telemetry,
            stride: stride.max(1),
            last_token: Mutex::new(ActionToken::Clear),
            detector_error_reported: AtomicBool::new(false),
            diagnostics: ControllerDiagnostics::default(),
            decision_tx,
            seq: AtomicU64::new(0),
        }
    }

    /// Process one frame from the source.
    ///
    /// Returns `None` when the frame is skipped by the sampling stride.
    /// Never fails: detector and actuator errors are contained here.
    pub fn handle_frame(&self, frame: &Frame) -> Option<FrameOutcome> {
        let count = self.dispatcher.stats().record_frame();
        if count % self.stride != 0 {
            trace!(frame = frame.seq, "frame skipped by stride");
            return None;
        }
        self.diagnostics
            .frames_processed
            .fetch_add(1, Ordering::Relaxed);

        let detections = self.detect(frame);
        Some(self.process(frame.seq, detections))
    }

    /// Decide and act on an already-detected set, bypassing the detector and
    /// the stride. Used by hosts that run detection themselves.
    pub fn process(&self, frame_seq: u64, detections: Vec<Detection>) -> FrameOutcome {
        let decision = self.engine.evaluate(&detections);
        let token = decision.token;
        *self.last_token.lock() = token;

        let dispatch = self.dispatcher.emit(token, &detections);
        match dispatch {
            Dispatch::Dispatched => {
                self.diagnostics
                    .cues_dispatched
                    .fetch_add(1, Ordering::Relaxed);
            }
            Dispatch::Suppressed => {
                self.diagnostics
                    .cues_suppressed
                    .fetch_add(1, Ordering::Relaxed);
            }
            Dispatch::Ignored => {}
        }

        if !token.is_clear() {
            self.telemetry.enqueue(token, &detections);
            self.diagnostics
                .events_enqueued
                .fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            frame = frame_seq,
            token = ?token,
            zone = ?decision.zone,
            height_ratio = decision.height_ratio,
            dispatch = ?dispatch,
            "frame decided"
        );

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.decision_tx.send(DecisionEvent {
            seq,
            frame: frame_seq,
            token,
            dispatched: dispatch.is_dispatched(),
            detections: detections.clone(),
        });

        FrameOutcome {
            token,
            dispatch,
            detections,
        }
    }

    /// Most recent decision, including CLEAR.
    pub fn last_token(&self) -> ActionToken {
        *self.last_token.lock()
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Zero session counters and forget the last decision and cue.
    pub fn reset_stats(&self) {
        self.dispatcher.reset();
        self.diagnostics.reset();
        *self.last_token.lock() = ActionToken::Clear;
        self.detector_error_reported.store(false, Ordering::Relaxed);
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        let stats = self.dispatcher.stats().snapshot();
        DiagnosticsSnapshot {
            frames_in: stats.frame_count,
            frames_processed: self.diagnostics.frames_processed.load(Ordering::Relaxed),
            detector_errors: self.diagnostics.detector_errors.load(Ordering::Relaxed),
            cues_dispatched: self.diagnostics.cues_dispatched.load(Ordering::Relaxed),
            cues_suppressed: self.diagnostics.cues_suppressed.load(Ordering::Relaxed),
            events_enqueued: self.diagnostics.events_enqueued.load(Ordering::Relaxed),
            stop_count: stats.stop_count,
            veer_count: stats.veer_count,
            actuator_errors: stats.actuator_errors,
        }
    }

    fn detect(&self, frame: &Frame) -> Vec<Detection> {
        match self.detector.infer(frame) {
            Ok(detections) => detections,
            Err(e) => {
                self.diagnostics
                    .detector_errors
                    .fetch_add(1, Ordering::Relaxed);
                if !self.detector_error_reported.swap(true, Ordering::Relaxed) {
                    error!(error = %e, frame = frame.seq, "detector failed, treating frame as empty");
                } else {
                    debug!(error = %e, frame = frame.seq, "detector failed");
                }
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for FrameController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameController")
            .field("stride", &self.stride)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
