//! Cue actuation: the `Actuator` capability plus the rate-limited dispatcher.
//!
//! The core only decides *what* to say and *when*. How speech is
//! synthesised and how vibration is rendered belongs to the `Actuator`
//! implementation (platform TTS, a haptics driver, a log sink in tests).

pub mod dispatcher;
pub mod log;

pub use dispatcher::{CueDispatcher, CueState, CueStats, CueStatsSnapshot, Dispatch};
pub use log::LogActuator;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::detection::{ActionToken, Detection};
use crate::error::Result;

/// Fallback object name when a cue has no detections attached.
pub const FALLBACK_OBJECT_NAME: &str = "obstacle";

/// How a new utterance interacts with speech already in progress.
///
/// Cues always pre-empt: a stale instruction is worse than none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechPriority {
    /// Drop anything queued or speaking and say this now.
    FlushAndReplace,
}

/// Contract for speech + haptics backends.
///
/// Both effects are best-effort and fail independently; the dispatcher
/// logs failures and carries on.
pub trait Actuator: Send + 'static {
    /// Speak `message`.
    fn speak(&mut self, message: &str, priority: SpeechPriority) -> Result<()>;

    /// Play a vibration waveform: alternating off/on durations, starting
    /// with an initial delay.
    fn vibrate(&mut self, pattern: &[Duration]) -> Result<()>;

    /// Ask the platform for the audio attention channel (transient focus,
    /// ducking other audio) before speaking. Default: no-op.
    fn request_attention(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Thread-safe reference-counted handle to any `Actuator` implementor.
#[derive(Clone)]
pub struct ActuatorHandle(pub Arc<Mutex<dyn Actuator>>);

impl ActuatorHandle {
    /// Wrap any `Actuator` in an `ActuatorHandle`.
    pub fn new<A: Actuator>(actuator: A) -> Self {
        Self(Arc::new(Mutex::new(actuator)))
    }
}

impl std::fmt::Debug for ActuatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorHandle").finish_non_exhaustive()
    }
}

const STOP_PATTERN: [Duration; 2] = [Duration::ZERO, Duration::from_millis(600)];
const VEER_PATTERN: [Duration; 4] = [
    Duration::ZERO,
    Duration::from_millis(120),
    Duration::from_millis(80),
    Duration::from_millis(120),
];
const CAUTION_PATTERN: [Duration; 2] = [Duration::ZERO, Duration::from_millis(200)];

/// Vibration waveform for a token: one long pulse for STOP, a short double
/// pulse for a veer, one short pulse for CAUTION. `None` for CLEAR.
pub fn vibration_pattern(token: ActionToken) -> Option<&'static [Duration]> {
    match token {
        ActionToken::Stop => Some(&STOP_PATTERN),
        ActionToken::SlightLeft | ActionToken::SlightRight => Some(&VEER_PATTERN),
        ActionToken::Caution => Some(&CAUTION_PATTERN),
        ActionToken::Clear => None,
    }
}

/// Spoken verb for a token. `None` for CLEAR.
pub fn verb(token: ActionToken) -> Option<&'static str> {
    match token {
        ActionToken::Stop => Some("stop"),
        ActionToken::SlightLeft => Some("move left"),
        ActionToken::SlightRight => Some("move right"),
        ActionToken::Caution => Some("caution"),
        ActionToken::Clear => None,
    }
}

/// Render `"{object} ahead, {verb}"` using the first detection's label.
pub fn render_message(token: ActionToken, detections: &[Detection]) -> Option<String> {
    let verb = verb(token)?;
    let object = detections
        .first()
        .map(|d| d.label.as_str())
        .unwrap_or(FALLBACK_OBJECT_NAME);
    Some(format!("{object} ahead, {verb}"))
}
