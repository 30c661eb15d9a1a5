//! Telemetry events and their wire representation.
//!
//! ## Wire format
//!
//! One JSON array per flush, `POST {base_url}/ingest_event`:
//!
//! ```json
//! [{
//!   "client_id": "placeholder",
//!   "session_id": "3f2b…",
//!   "t_client": 1718000000,
//!   "events": ["obstacle_center", "stop"],
//!   "classes": ["person"],
//!   "confidence": 0.9,
//!   "free_ahead_m": 2.5,
//!   "app": "wayfinder-0.1.0"
//! }]
//! ```
//!
//! `classes`, `confidence` and `free_ahead_m` are omitted when absent.

use serde::Serialize;
use uuid::Uuid;

use crate::detection::{ActionToken, Detection};

/// One non-CLEAR decision awaiting delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub token: ActionToken,
    pub detections: Vec<Detection>,
    /// Unix seconds at enqueue time.
    pub timestamp_seconds: i64,
}

impl TelemetryEvent {
    pub fn new(token: ActionToken, detections: Vec<Detection>, timestamp_seconds: i64) -> Self {
        Self {
            token,
            detections,
            timestamp_seconds,
        }
    }
}

/// `(zone, action)` pair reported for a token. `None` for CLEAR.
pub fn zone_action(token: ActionToken) -> Option<(&'static str, &'static str)> {
    match token {
        ActionToken::Stop => Some(("obstacle_center", "stop")),
        ActionToken::SlightLeft => Some(("obstacle_center", "veer_left")),
        ActionToken::SlightRight => Some(("obstacle_center", "veer_right")),
        ActionToken::Caution => Some(("obstacle_detected", "caution")),
        ActionToken::Clear => None,
    }
}

/// Identity fields stamped onto every record of a batch.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub client_id: &'a str,
    pub session_id: &'a str,
    pub app_version: &'a str,
}

/// Serialised form of one `TelemetryEvent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord<'a> {
    pub client_id: &'a str,
    pub session_id: &'a str,
    pub t_client: i64,
    pub events: [&'static str; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_ahead_m: Option<f32>,
    pub app: &'a str,
}

impl<'a> TelemetryRecord<'a> {
    /// Build the wire record for `event`. Returns `None` for CLEAR events.
    pub fn from_event(event: &'a TelemetryEvent, ctx: RecordContext<'a>) -> Option<Self> {
        let (zone, action) = zone_action(event.token)?;
        let leading = event.detections.first();
        let classes = leading.map(|_| {
            event
                .detections
                .iter()
                .map(|d| d.label.as_str())
                .collect::<Vec<_>>()
        });

        Some(Self {
            client_id: ctx.client_id,
            session_id: ctx.session_id,
            t_client: event.timestamp_seconds,
            events: [zone, action],
            classes,
            confidence: leading.map(|d| d.confidence),
            free_ahead_m: leading.and_then(|d| d.distance_meters),
            app: ctx.app_version,
        })
    }
}

/// Build the records for a whole batch, skipping anything unreportable.
pub fn build_batch<'a>(
    events: &'a [TelemetryEvent],
    ctx: RecordContext<'a>,
) -> Vec<TelemetryRecord<'a>> {
    events
        .iter()
        .filter_map(|e| TelemetryRecord::from_event(e, ctx))
        .collect()
}

/// Random per-process session identifier in hyphenated UUID-v4 form.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CTX: RecordContext<'static> = RecordContext {
        client_id: "placeholder",
        session_id: "session-1",
        app_version: "wayfinder-test",
    };

    #[test]
    fn stop_event_serializes_with_classes_confidence_and_distance() {
        let event = TelemetryEvent::new(
            ActionToken::Stop,
            vec![
                Detection::new("person", 0.9, 160.0, 100.0, 60.0, 140.0).with_distance(2.5),
                Detection::new("dog", 0.6, 20.0, 100.0, 20.0, 30.0),
            ],
            1_718_000_000,
        );

        let record = TelemetryRecord::from_event(&event, CTX).expect("stop is reportable");
        let json = serde_json::to_value(&record).expect("serialize record");

        assert_eq!(json["client_id"], "placeholder");
        assert_eq!(json["session_id"], "session-1");
        assert_eq!(json["t_client"], 1_718_000_000i64);
        assert_eq!(json["events"], serde_json::json!(["obstacle_center", "stop"]));
        assert_eq!(json["classes"], serde_json::json!(["person", "dog"]));
        let conf = json["confidence"].as_f64().expect("confidence is a number");
        assert_relative_eq!(conf, 0.9, epsilon = 1e-5);
        let dist = json["free_ahead_m"].as_f64().expect("distance is a number");
        assert_relative_eq!(dist, 2.5, epsilon = 1e-5);
        assert_eq!(json["app"], "wayfinder-test");
    }

    #[test]
    fn optional_fields_are_omitted_without_detections() {
        let event = TelemetryEvent::new(ActionToken::Caution, vec![], 5);
        let record = TelemetryRecord::from_event(&event, CTX).expect("caution is reportable");
        let json = serde_json::to_value(&record).expect("serialize record");

        assert_eq!(json["events"], serde_json::json!(["obstacle_detected", "caution"]));
        assert!(json.get("classes").is_none());
        assert!(json.get("confidence").is_none());
        assert!(json.get("free_ahead_m").is_none());
    }

    #[test]
    fn distance_is_omitted_when_leading_detection_has_none() {
        let event = TelemetryEvent::new(
            ActionToken::SlightLeft,
            vec![Detection::new("bench", 0.5, 0.0, 0.0, 1.0, 1.0)],
            5,
        );
        let json = serde_json::to_value(TelemetryRecord::from_event(&event, CTX))
            .expect("serialize record");
        assert_eq!(json["events"][1], "veer_left");
        assert!(json.get("free_ahead_m").is_none());
    }

    #[test]
    fn clear_events_are_never_serialized() {
        let events = vec![
            TelemetryEvent::new(ActionToken::Clear, vec![], 1),
            TelemetryEvent::new(ActionToken::SlightRight, vec![], 2),
        ];
        let batch = build_batch(&events, CTX);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].events, ["obstacle_center", "veer_right"]);
    }

    #[test]
    fn session_ids_are_uuid_shaped_and_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        let groups: Vec<&str> = a.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'));

        let parsed = Uuid::parse_str(&a).expect("session id parses as a UUID");
        assert_eq!(parsed.get_version_num(), 4);
    }
}
