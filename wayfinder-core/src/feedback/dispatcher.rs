//! Rate-limited cue dispatch.
//!
//! ## Rules
//!
//! ```text
//! CLEAR                          → ignored (no actuation, no state change)
//! STOP                           → always dispatched
//! other, now - last ≥ rate_limit → dispatched
//! other, now - last <  rate_limit → suppressed (dropped, never retried)
//! ```
//!
//! The "now vs last cue" comparison and the timestamp update happen under
//! one lock, so two frames decided concurrently cannot both slip past the
//! limiter. Actuation runs after the lock is released.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::detection::{ActionToken, Detection};
use crate::feedback::{render_message, vibration_pattern, ActuatorHandle, SpeechPriority};

/// Minimum spacing between non-STOP cues.
pub const CUE_RATE_LIMIT: Duration = Duration::from_millis(1000);

/// What `emit` did with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// CLEAR, or nothing to repeat.
    Ignored,
    /// Dropped by the rate limiter.
    Suppressed,
    /// Handed to the actuator.
    Dispatched,
}

impl Dispatch {
    pub fn is_dispatched(self) -> bool {
        self == Dispatch::Dispatched
    }
}

/// Last dispatched cue, replayed by `repeat_last_cue`.
#[derive(Debug, Clone)]
pub struct CueState {
    pub last_token: ActionToken,
    pub last_detections: Vec<Detection>,
    /// `None` until the first cue of the session.
    pub last_cue_at: Option<Instant>,
}

impl Default for CueState {
    fn default() -> Self {
        Self {
            last_token: ActionToken::Clear,
            last_detections: Vec::new(),
            last_cue_at: None,
        }
    }
}

/// Session statistics. All counters reset together via `reset`.
#[derive(Debug, Default)]
pub struct CueStats {
    /// Frames seen by the frame controller.
    pub frame_count: AtomicU64,
    /// Dispatched STOP decisions.
    pub stop_count: AtomicUsize,
    /// Dispatched SLIGHT_LEFT / SLIGHT_RIGHT decisions.
    pub veer_count: AtomicUsize,
    pub suppressed: AtomicUsize,
    pub actuator_errors: AtomicUsize,
}

impl CueStats {
    pub fn record_frame(&self) -> u64 {
        self.frame_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset(&self) {
        self.frame_count.store(0, Ordering::Relaxed);
        self.stop_count.store(0, Ordering::Relaxed);
        self.veer_count.store(0, Ordering::Relaxed);
        self.suppressed.store(0, Ordering::Relaxed);
        self.actuator_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CueStatsSnapshot {
        CueStatsSnapshot {
            frame_count: self.frame_count.load(Ordering::Relaxed),
            stop_count: self.stop_count.load(Ordering::Relaxed),
            veer_count: self.veer_count.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            actuator_errors: self.actuator_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueStatsSnapshot {
    pub frame_count: u64,
    pub stop_count: usize,
    pub veer_count: usize,
    pub suppressed: usize,
    pub actuator_errors: usize,
}

/// Wraps an actuator with the cue rate limiter and session state.
///
/// `CueDispatcher` is `Send + Sync`; share it via `Arc` if frames are
/// decided on more than one thread.
pub struct CueDispatcher {
    actuator: ActuatorHandle,
    rate_limit: Duration,
    state: Mutex<CueState>,
    stats: CueStats,
}

impl CueDispatcher {
    pub fn new(actuator: ActuatorHandle) -> Self {
        Self::with_rate_limit(actuator, CUE_RATE_LIMIT)
    }

    pub fn with_rate_limit(actuator: ActuatorHandle, rate_limit: Duration) -> Self {
        Self {
            actuator,
            rate_limit,
            state: Mutex::new(CueState::default()),
            stats: CueStats::default(),
        }
    }

    /// Dispatch `token` unless it is CLEAR or rate-limited.
    pub fn emit(&self, token: ActionToken, detections: &[Detection]) -> Dispatch {
        self.emit_at(token, detections, Instant::now())
    }

    /// `emit` with an explicit clock reading.
    pub fn emit_at(&self, token: ActionToken, detections: &[Detection], now: Instant) -> Dispatch {
        if token.is_clear() {
            return Dispatch::Ignored;
        }

        {
            let mut state = self.state.lock();
            let elapsed_ok = state
                .last_cue_at
                .map(|last| now.saturating_duration_since(last) >= self.rate_limit)
                .unwrap_or(true);

            if !elapsed_ok && token != ActionToken::Stop {
                self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!(token = ?token, "cue suppressed by rate limiter");
                return Dispatch::Suppressed;
            }

            state.last_cue_at = Some(now);
            state.last_token = token;
            state.last_detections = detections.to_vec();
        }

        match token {
            ActionToken::Stop => {
                self.stats.stop_count.fetch_add(1, Ordering::Relaxed);
            }
            ActionToken::SlightLeft | ActionToken::SlightRight => {
                self.stats.veer_count.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        self.actuate(token, detections);
        Dispatch::Dispatched
    }

    /// Replay the most recent dispatched cue, bypassing the rate limiter.
    pub fn repeat_last_cue(&self) -> Dispatch {
        self.repeat_last_cue_at(Instant::now())
    }

    pub fn repeat_last_cue_at(&self, now: Instant) -> Dispatch {
        let (token, detections) = {
            let mut state = self.state.lock();
            if state.last_token.is_clear() {
                return Dispatch::Ignored;
            }
            state.last_cue_at = Some(now);
            (state.last_token, state.last_detections.clone())
        };

        debug!(token = ?token, "repeating last cue");
        self.actuate(token, &detections);
        Dispatch::Dispatched
    }

    /// Snapshot of the last dispatched cue.
    pub fn state(&self) -> CueState {
        self.state.lock().clone()
    }

    pub fn stats(&self) -> &CueStats {
        &self.stats
    }

    /// Start a new session: forget the last cue and zero all counters.
    pub fn reset(&self) {
        *self.state.lock() = CueState::default();
        self.stats.reset();
    }

    fn actuate(&self, token: ActionToken, detections: &[Detection]) {
        let mut actuator = self.actuator.0.lock();

        if let Some(pattern) = vibration_pattern(token) {
            if let Err(e) = actuator.vibrate(pattern) {
                self.stats.actuator_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, token = ?token, "vibration failed");
            }
        }

        let Some(message) = render_message(token, detections) else {
            return;
        };
        if let Err(e) = actuator.request_attention() {
            warn!(error = %e, "audio attention request failed");
        }
        match actuator.speak(&message, SpeechPriority::FlushAndReplace) {
            Ok(()) => debug!(token = ?token, message = %message, "cue dispatched"),
            Err(e) => {
                self.stats.actuator_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, token = ?token, "speech failed");
            }
        }
    }
}

impl std::fmt::Debug for CueDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CueDispatcher")
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}
