//! Per-frame perception types shared by every stage of the pipeline.
//!
//! `Detection` is what the detector hands over for one frame; `ActionToken`
//! is what the decision engine hands back. Both derive serde so they can be
//! replayed from disk and mirrored in telemetry.

use serde::{Deserialize, Serialize};

/// One object reported by the detector for a single frame.
///
/// Coordinates and sizes are in the detector's pixel space (see
/// `FrameGeometry`). Confidence is expected in [0.0, 1.0] but is never
/// validated here; filtering by confidence is the detector's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Class label, e.g. `"person"` or `"bench"`.
    pub label: String,
    pub confidence: f32,
    /// Horizontal center of the bounding box.
    pub center_x: f32,
    /// Vertical center of the bounding box.
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    /// Estimated free distance to the object, when the detector provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f32>,
}

impl Detection {
    pub fn new(
        label: impl Into<String>,
        confidence: f32,
        center_x: f32,
        center_y: f32,
        width: f32,
        height: f32,
    ) -> Self {
        Self {
            label: label.into(),
            confidence,
            center_x,
            center_y,
            width,
            height,
            distance_meters: None,
        }
    }

    pub fn with_distance(mut self, meters: f32) -> Self {
        self.distance_meters = Some(meters);
        self
    }
}

/// Navigation action chosen for a frame.
///
/// `Clear` is the neutral state: it is never actuated and never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionToken {
    Clear,
    Stop,
    SlightLeft,
    SlightRight,
    Caution,
}

impl ActionToken {
    /// Severity rank, highest first: STOP > SLIGHT_LEFT/SLIGHT_RIGHT > CAUTION > CLEAR.
    pub fn severity(self) -> u8 {
        match self {
            ActionToken::Stop => 3,
            ActionToken::SlightLeft | ActionToken::SlightRight => 2,
            ActionToken::Caution => 1,
            ActionToken::Clear => 0,
        }
    }

    pub fn is_clear(self) -> bool {
        self == ActionToken::Clear
    }

    pub fn is_veer(self) -> bool {
        matches!(self, ActionToken::SlightLeft | ActionToken::SlightRight)
    }

    /// Stable upper-case name, used as the utterance id for speech.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionToken::Clear => "CLEAR",
            ActionToken::Stop => "STOP",
            ActionToken::SlightLeft => "SLIGHT_LEFT",
            ActionToken::SlightRight => "SLIGHT_RIGHT",
            ActionToken::Caution => "CAUTION",
        }
    }
}

impl std::fmt::Display for ActionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
