//! # wayfinder-core
//!
//! Obstacle-guidance engine SDK: detections in, spoken and haptic cues out.
//!
//! ## Architecture
//!
//! ```text
//! Frame source → FrameController (stride sampling)
//!                     │
//!              Detector::infer
//!                     │
//!              DecisionEngine → ActionToken
//!                ┌────┴─────────────┐
//!         CueDispatcher      TelemetryUploader queue
//!        (rate limit, STOP         │
//!         bypass) → Actuator  TelemetryWorker thread → TelemetrySink
//!                     │
//!          broadcast::Sender<DecisionEvent>
//! ```
//!
//! The frame path never waits on the network. Telemetry is best-effort:
//! bounded, batched, and retried with capped exponential backoff.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod detection;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod inference;
pub mod ipc;
pub mod planning;
pub mod telemetry;

// Convenience re-exports for downstream crates
pub use detection::{ActionToken, Detection};
pub use engine::{GuidanceConfig, GuidanceEngine};
pub use error::WayfinderError;
pub use feedback::{Actuator, ActuatorHandle, LogActuator, SpeechPriority};
pub use inference::{Detector, DetectorHandle, Frame, ScriptedDetector, StubDetector};
pub use ipc::events::{DecisionEvent, EngineStatus, EngineStatusEvent};
pub use planning::{DecisionEngine, FrameGeometry, Zone};
pub use telemetry::{TelemetryConfig, TelemetrySink, TelemetryUploader};

#[cfg(feature = "http")]
pub use telemetry::HttpSink;
