//! Obstacle classification: detections in, one `ActionToken` out.
//!
//! ## Algorithm
//!
//! ```text
//! 1. Drop detections whose label is not in NAVIGATION_CLASSES.
//! 2. Zone each remaining detection by normalised center x:
//!      x < 0.33 → LEFT,  x > 0.67 → RIGHT,  otherwise CENTER
//! 3. CENTER non-empty → most confident CENTER detection:
//!      h/H > 0.40 → STOP
//!      h/H > 0.25 → veer away from its side
//!      otherwise  → CAUTION
//! 4. Else LEFT ∪ RIGHT non-empty → most confident side detection:
//!      h/H > 0.25 → veer away from its side
//!      h/H > 0.15 → CAUTION
//! 5. Otherwise CLEAR.
//! ```
//!
//! The engine is a pure function of its input plus the fixed frame
//! geometry. Confidence only breaks ties inside a zone; it is never
//! thresholded here.

pub mod zone;

pub use zone::Zone;

use tracing::debug;

use crate::detection::{ActionToken, Detection};

/// Normalised x below which a detection is in the LEFT zone.
pub const LEFT_ZONE_END: f32 = 0.33;
/// Normalised x above which a detection is in the RIGHT zone.
pub const RIGHT_ZONE_START: f32 = 0.67;
/// CENTER obstacles taller than this fraction of the frame trigger STOP.
pub const CRITICAL_HEIGHT_RATIO: f32 = 0.40;
/// Obstacles taller than this fraction of the frame trigger a veer.
pub const WARNING_HEIGHT_RATIO: f32 = 0.25;
/// Side obstacles taller than this fraction of the frame trigger CAUTION.
pub const SIDE_CAUTION_RATIO: f32 = 0.15;

/// Labels that matter for walking navigation. Everything else is ignored.
pub const NAVIGATION_CLASSES: &[&str] = &[
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "bus",
    "truck",
    "train",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "dog",
    "cat",
    "chair",
    "couch",
    "bed",
    "potted plant",
    "dining table",
    "backpack",
    "handbag",
    "suitcase",
    "umbrella",
];

/// Returns `true` if `label` is navigation-relevant.
pub fn is_navigation_class(label: &str) -> bool {
    NAVIGATION_CLASSES.contains(&label)
}

/// Size of the detector's coordinate space, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: f32,
    pub height: f32,
}

impl FrameGeometry {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameGeometry {
    /// 320×320, the detector's model input size.
    fn default() -> Self {
        Self::new(320.0, 320.0)
    }
}

/// Full outcome of one decision, including which detection drove it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub token: ActionToken,
    /// Zone of the deciding detection, if one was selected.
    pub zone: Option<Zone>,
    /// Index into the input slice of the deciding detection.
    pub subject: Option<usize>,
    /// Height ratio of the deciding detection (0.0 when none).
    pub height_ratio: f32,
}

impl Decision {
    fn clear() -> Self {
        Self {
            token: ActionToken::Clear,
            zone: None,
            subject: None,
            height_ratio: 0.0,
        }
    }
}

/// Stateless decision engine bound to a reference frame size.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine {
    frame: FrameGeometry,
}

impl DecisionEngine {
    pub fn new(frame: FrameGeometry) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> FrameGeometry {
        self.frame
    }

    /// Map a detection set to the navigation action for this frame.
    pub fn decide(&self, detections: &[Detection]) -> ActionToken {
        self.evaluate(detections).token
    }

    /// Like `decide`, but also reports which detection drove the outcome.
    pub fn evaluate(&self, detections: &[Detection]) -> Decision {
        if detections.is_empty() {
            debug!("decision: CLEAR (no detections)");
            return Decision::clear();
        }

        let relevant: Vec<(usize, &Detection, Zone)> = detections
            .iter()
            .enumerate()
            .filter(|(_, det)| is_navigation_class(&det.label))
            .map(|(idx, det)| (idx, det, self.zone_of(det)))
            .collect();

        debug!(
            relevant = relevant.len(),
            total = detections.len(),
            "navigation-relevant detections"
        );

        if relevant.is_empty() {
            debug!("decision: CLEAR (no navigation-relevant obstacles)");
            return Decision::clear();
        }

        for (idx, det, zone) in &relevant {
            debug!(
                idx,
                label = %det.label,
                zone = ?zone,
                cx = det.center_x,
                h = det.height,
                height_ratio = self.height_ratio(det),
                "zoned detection"
            );
        }

        // Priority 1: anything directly ahead.
        let center = most_confident(relevant.iter().filter(|(_, _, z)| *z == Zone::Center));
        if let Some((idx, det, zone)) = center {
            let ratio = self.height_ratio(det);
            let token = if ratio > CRITICAL_HEIGHT_RATIO {
                ActionToken::Stop
            } else if ratio > WARNING_HEIGHT_RATIO {
                self.steer_away(det)
            } else {
                ActionToken::Caution
            };
            debug!(label = %det.label, height_ratio = ratio, token = ?token, "center decision");
            return Decision {
                token,
                zone: Some(zone),
                subject: Some(idx),
                height_ratio: ratio,
            };
        }

        // Priority 2: large obstacles at the sides.
        let side = most_confident(relevant.iter().filter(|(_, _, z)| z.is_side()));
        if let Some((idx, det, zone)) = side {
            let ratio = self.height_ratio(det);
            let token = if ratio > WARNING_HEIGHT_RATIO {
                Some(self.steer_away(det))
            } else if ratio > SIDE_CAUTION_RATIO {
                Some(ActionToken::Caution)
            } else {
                None
            };
            if let Some(token) = token {
                debug!(label = %det.label, zone = ?zone, height_ratio = ratio, token = ?token, "side decision");
                return Decision {
                    token,
                    zone: Some(zone),
                    subject: Some(idx),
                    height_ratio: ratio,
                };
            }
        }

        debug!("decision: CLEAR (obstacles too small or in safe zones)");
        Decision::clear()
    }

    /// Horizontal zone of a detection's center.
    pub fn zone_of(&self, det: &Detection) -> Zone {
        let normalized = if self.frame.width > 0.0 {
            det.center_x / self.frame.width
        } else {
            0.5
        };
        Zone::from_normalized_x(normalized)
    }

    /// Bounding-box height over frame height; a proxy for proximity.
    pub fn height_ratio(&self, det: &Detection) -> f32 {
        if self.frame.height > 0.0 {
            det.height / self.frame.height
        } else {
            0.0
        }
    }

    /// Steer toward the side with more clearance.
    fn steer_away(&self, det: &Detection) -> ActionToken {
        if det.center_x < self.frame.width / 2.0 {
            ActionToken::SlightRight
        } else {
            ActionToken::SlightLeft
        }
    }
}

/// Highest confidence wins; the first one seen wins ties. NaN ranks lowest.
fn most_confident<'r, 'd: 'r, I>(candidates: I) -> Option<(usize, &'d Detection, Zone)>
where
    I: Iterator<Item = &'r (usize, &'d Detection, Zone)>,
{
    fn rank(confidence: f32) -> f32 {
        if confidence.is_nan() {
            f32::NEG_INFINITY
        } else {
            confidence
        }
    }

    candidates.fold(None, |best, &(idx, det, zone)| match best {
        Some((_, current, _)) if rank(det.confidence) <= rank(current.confidence) => best,
        _ => Some((idx, det, zone)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(label: &str, conf: f32, cx: f32, h: f32) -> Detection {
        Detection::new(label, conf, cx, 100.0, 40.0, h)
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(FrameGeometry::new(320.0, 320.0))
    }

    #[test]
    fn empty_input_is_clear() {
        assert_eq!(engine().decide(&[]), ActionToken::Clear);
    }

    #[test]
    fn non_navigation_labels_are_ignored_even_when_huge() {
        let dets = vec![
            det("laptop", 0.99, 160.0, 300.0),
            det("cup", 0.95, 50.0, 300.0),
            det("Person", 0.95, 160.0, 300.0),
        ];
        assert_eq!(engine().decide(&dets), ActionToken::Clear);
    }

    #[test]
    fn tall_center_obstacle_stops_regardless_of_confidence() {
        let dets = vec![det("bench", 0.0, 160.0, 140.0)];
        assert_eq!(engine().decide(&dets), ActionToken::Stop);
    }

    #[test]
    fn person_at_center_with_large_height_is_stop() {
        let dets = vec![Detection::new("person", 0.9, 160.0, 100.0, 60.0, 140.0)];
        let decision = engine().evaluate(&dets);
        assert_eq!(decision.token, ActionToken::Stop);
        assert_eq!(decision.zone, Some(Zone::Center));
        assert_eq!(decision.subject, Some(0));
        assert_relative_eq!(decision.height_ratio, 0.4375, epsilon = 1e-6);
    }

    #[test]
    fn warning_height_left_of_middle_veers_right() {
        let dets = vec![Detection::new("person", 0.9, 110.0, 100.0, 60.0, 90.0)];
        assert_eq!(engine().decide(&dets), ActionToken::SlightRight);
    }

    #[test]
    fn warning_height_right_of_middle_veers_left() {
        let dets = vec![det("person", 0.9, 200.0, 90.0)];
        assert_eq!(engine().decide(&dets), ActionToken::SlightLeft);
    }

    #[test]
    fn exact_middle_counts_as_right_side() {
        let dets = vec![det("person", 0.9, 160.0, 90.0)];
        assert_eq!(engine().decide(&dets), ActionToken::SlightLeft);
    }

    #[test]
    fn small_center_obstacle_is_caution() {
        let dets = vec![det("chair", 0.6, 160.0, 20.0)];
        assert_eq!(engine().decide(&dets), ActionToken::Caution);
    }

    #[test]
    fn center_beats_larger_side_obstacle() {
        let dets = vec![
            det("car", 0.99, 10.0, 300.0),
            det("chair", 0.3, 160.0, 10.0),
        ];
        assert_eq!(engine().decide(&dets), ActionToken::Caution);
    }

    #[test]
    fn higher_confidence_center_detection_decides() {
        let dets = vec![
            det("person", 0.5, 160.0, 200.0),
            det("dog", 0.8, 160.0, 20.0),
        ];
        assert_eq!(engine().decide(&dets), ActionToken::Caution);

        let dets = vec![
            det("person", 0.8, 160.0, 200.0),
            det("dog", 0.5, 160.0, 20.0),
        ];
        assert_eq!(engine().decide(&dets), ActionToken::Stop);
    }

    #[test]
    fn confidence_ties_go_to_first_detection() {
        let dets = vec![
            det("person", 0.7, 160.0, 20.0),
            det("person", 0.7, 160.0, 200.0),
        ];
        let decision = engine().evaluate(&dets);
        assert_eq!(decision.token, ActionToken::Caution);
        assert_eq!(decision.subject, Some(0));
    }

    #[test]
    fn large_left_obstacle_veers_right() {
        let dets = vec![det("bus", 0.9, 40.0, 100.0)];
        let decision = engine().evaluate(&dets);
        assert_eq!(decision.token, ActionToken::SlightRight);
        assert_eq!(decision.zone, Some(Zone::Left));
    }

    #[test]
    fn large_right_obstacle_veers_left() {
        let dets = vec![det("bus", 0.9, 300.0, 100.0)];
        assert_eq!(engine().decide(&dets), ActionToken::SlightLeft);
    }

    #[test]
    fn medium_side_obstacle_is_caution() {
        let dets = vec![det("bench", 0.9, 300.0, 60.0)];
        assert_eq!(engine().decide(&dets), ActionToken::Caution);
    }

    #[test]
    fn tiny_side_obstacle_is_clear() {
        let dets = vec![det("bench", 0.9, 300.0, 30.0), det("dog", 0.4, 20.0, 10.0)];
        assert_eq!(engine().decide(&dets), ActionToken::Clear);
    }

    #[test]
    fn most_confident_side_detection_decides_across_both_sides() {
        let dets = vec![
            det("bench", 0.4, 300.0, 200.0),
            det("dog", 0.9, 20.0, 60.0),
        ];
        assert_eq!(engine().decide(&dets), ActionToken::Caution);
    }

    #[test]
    fn zone_boundaries_are_center_inclusive() {
        let eng = DecisionEngine::new(FrameGeometry::new(100.0, 100.0));
        assert_eq!(eng.zone_of(&det("person", 1.0, 33.0, 1.0)), Zone::Center);
        assert_eq!(eng.zone_of(&det("person", 1.0, 67.0, 1.0)), Zone::Center);
        assert_eq!(eng.zone_of(&det("person", 1.0, 32.9, 1.0)), Zone::Left);
        assert_eq!(eng.zone_of(&det("person", 1.0, 67.1, 1.0)), Zone::Right);
    }

    #[test]
    fn malformed_dimensions_degrade_to_non_significant() {
        let dets = vec![
            Detection::new("person", 0.9, 300.0, 100.0, -5.0, -80.0),
            Detection::new("car", 0.0, 10.0, 100.0, 0.0, 0.0),
        ];
        assert_eq!(engine().decide(&dets), ActionToken::Clear);

        let center = vec![Detection::new("person", 0.9, 160.0, 100.0, 0.0, -80.0)];
        assert_eq!(engine().decide(&center), ActionToken::Caution);
    }

    #[test]
    fn height_ratio_uses_reference_frame_height() {
        let eng = DecisionEngine::new(FrameGeometry::new(640.0, 480.0));
        assert_relative_eq!(eng.height_ratio(&det("person", 1.0, 0.0, 120.0)), 0.25);
        // 0.25 is not strictly above the warning ratio.
        assert_eq!(eng.decide(&[det("person", 1.0, 320.0, 120.0)]), ActionToken::Caution);
    }
}
