//! Events broadcast by the guidance engine.
//!
//! | Event | Emitted when |
//! |-------|--------------|
//! | `DecisionEvent` | a sampled frame has been decided |
//! | `EngineStatusEvent` | the engine starts or stops |

use serde::{Deserialize, Serialize};

use crate::detection::{ActionToken, Detection};

// ---------------------------------------------------------------------------
// Decision events
// ---------------------------------------------------------------------------

/// One decided frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Source frame sequence number.
    pub frame: u64,
    pub token: ActionToken,
    /// Whether the cue reached the actuator (false for CLEAR and suppressed cues).
    pub dispatched: bool,
    pub detections: Vec<Detection>,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Created, telemetry worker not started.
    Idle,
    /// Accepting frames with the telemetry worker running.
    Running,
    /// Worker stopped; the engine may be restarted.
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_event_serializes_with_camel_case_fields() {
        let event = DecisionEvent {
            seq: 4,
            frame: 60,
            token: ActionToken::SlightLeft,
            dispatched: true,
            detections: vec![Detection::new("person", 0.8, 200.0, 100.0, 40.0, 90.0)],
        };

        let json = serde_json::to_value(&event).expect("serialize decision event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["frame"], 60);
        assert_eq!(json["token"], "SLIGHT_LEFT");
        assert_eq!(json["dispatched"], true);
        assert_eq!(json["detections"][0]["centerX"], 200.0);

        let round_trip: DecisionEvent =
            serde_json::from_value(json).expect("deserialize decision event");
        assert_eq!(round_trip.token, ActionToken::SlightLeft);
        assert_eq!(round_trip.detections.len(), 1);
    }

    #[test]
    fn engine_status_serializes_lowercase() {
        let event = EngineStatusEvent {
            status: EngineStatus::Running,
            detail: None,
        };
        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "running");
        assert!(serde_json::from_str::<EngineStatus>(r#""Running""#).is_err());
    }
}
