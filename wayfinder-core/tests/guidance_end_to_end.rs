use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;
use wayfinder_core::engine::{GuidanceConfig, GuidanceEngine};
use wayfinder_core::error::{Result, WayfinderError};
use wayfinder_core::feedback::{Actuator, ActuatorHandle, Dispatch, SpeechPriority};
use wayfinder_core::inference::{DetectorHandle, Frame, ScriptedDetector};
use wayfinder_core::telemetry::{FlushOutcome, TelemetryConfig, TelemetryRecord, TelemetryUploader};
use wayfinder_core::telemetry::TelemetrySink;
use wayfinder_core::{ActionToken, Detection};

#[derive(Debug, Clone, PartialEq)]
enum Cue {
    Vibrate(Vec<u64>),
    Attention,
    Speak(String),
}

#[derive(Clone, Default)]
struct RecordingActuator {
    cues: Arc<Mutex<Vec<Cue>>>,
}

impl Actuator for RecordingActuator {
    fn speak(&mut self, message: &str, priority: SpeechPriority) -> Result<()> {
        assert_eq!(priority, SpeechPriority::FlushAndReplace);
        self.cues.lock().push(Cue::Speak(message.to_string()));
        Ok(())
    }

    fn vibrate(&mut self, pattern: &[Duration]) -> Result<()> {
        self.cues
            .lock()
            .push(Cue::Vibrate(pattern.iter().map(|d| d.as_millis() as u64).collect()));
        Ok(())
    }

    fn request_attention(&mut self) -> Result<()> {
        self.cues.lock().push(Cue::Attention);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    batches: Arc<Mutex<Vec<serde_json::Value>>>,
    fail_next: Arc<Mutex<u32>>,
}

impl TelemetrySink for RecordingSink {
    fn deliver(&mut self, batch: &[TelemetryRecord<'_>]) -> Result<()> {
        {
            let mut fail = self.fail_next.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(WayfinderError::Delivery { status: 500 });
            }
        }
        self.batches.lock().push(serde_json::to_value(batch)?);
        Ok(())
    }
}

struct Harness {
    engine: GuidanceEngine,
    cues: Arc<Mutex<Vec<Cue>>>,
    batches: Arc<Mutex<Vec<serde_json::Value>>>,
    fail_next: Arc<Mutex<u32>>,
}

fn harness(script: Vec<Vec<Detection>>, stride: u64) -> Harness {
    let actuator = RecordingActuator::default();
    let cues = Arc::clone(&actuator.cues);
    let sink = RecordingSink::default();
    let batches = Arc::clone(&sink.batches);
    let fail_next = Arc::clone(&sink.fail_next);

    let config = GuidanceConfig {
        frame_stride: stride,
        telemetry: TelemetryConfig {
            base_url: Some("http://collector.test".into()),
            backoff_floor: Duration::from_millis(5),
            backoff_ceiling: Duration::from_millis(20),
            ..TelemetryConfig::default()
        },
        ..GuidanceConfig::default()
    };
    let telemetry = Arc::new(TelemetryUploader::with_sink(config.telemetry.clone(), sink));
    let engine = GuidanceEngine::with_telemetry(
        config,
        DetectorHandle::new(ScriptedDetector::new(script)),
        ActuatorHandle::new(actuator),
        telemetry,
    );

    Harness {
        engine,
        cues,
        batches,
        fail_next,
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < timeout, "condition not met within {timeout:?}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn person(cx: f32, h: f32) -> Detection {
    Detection::new("person", 0.9, cx, 160.0, 60.0, h)
}

#[test]
fn centered_tall_person_triggers_stop_cue_and_telemetry() {
    let h = harness(vec![vec![person(160.0, 140.0)]], 1);

    let outcome = h.engine.handle_frame(&Frame::empty(0)).expect("processed");
    assert_eq!(outcome.token, ActionToken::Stop);
    assert_eq!(outcome.dispatch, Dispatch::Dispatched);

    assert_eq!(
        &*h.cues.lock(),
        &vec![
            Cue::Vibrate(vec![0, 600]),
            Cue::Attention,
            Cue::Speak("person ahead, stop".into()),
        ]
    );
    assert_eq!(h.engine.telemetry().pending(), 1);
    assert_eq!(h.engine.diagnostics_snapshot().stop_count, 1);
}

#[test]
fn medium_person_on_the_left_veers_right() {
    let h = harness(vec![vec![person(100.0, 90.0)]], 1);

    let outcome = h.engine.handle_frame(&Frame::empty(0)).expect("processed");
    assert_eq!(outcome.token, ActionToken::SlightRight);
    assert!(h
        .cues
        .lock()
        .contains(&Cue::Speak("person ahead, move right".into())));
    assert!(h.cues.lock().contains(&Cue::Vibrate(vec![0, 120, 80, 120])));
    assert_eq!(h.engine.diagnostics_snapshot().veer_count, 1);
}

#[test]
fn empty_frame_is_clear_and_silent() {
    let h = harness(vec![vec![]], 1);

    let outcome = h.engine.handle_frame(&Frame::empty(0)).expect("processed");
    assert_eq!(outcome.token, ActionToken::Clear);
    assert_eq!(outcome.dispatch, Dispatch::Ignored);
    assert!(h.cues.lock().is_empty());
    assert_eq!(h.engine.telemetry().pending(), 0);
    assert_eq!(h.engine.flush_telemetry(), FlushOutcome::Idle);
}

#[test]
fn repeated_veer_is_rate_limited_but_stop_bypasses() {
    let h = harness(
        vec![
            vec![person(100.0, 90.0)],
            vec![person(100.0, 90.0)],
            vec![person(160.0, 140.0)],
        ],
        1,
    );

    let outcomes: Vec<Dispatch> = (0..3)
        .map(|i| {
            h.engine
                .handle_frame(&Frame::empty(i))
                .expect("processed")
                .dispatch
        })
        .collect();

    assert_eq!(
        outcomes,
        vec![Dispatch::Dispatched, Dispatch::Suppressed, Dispatch::Dispatched]
    );
    let spoken: Vec<Cue> = h
        .cues
        .lock()
        .iter()
        .filter(|c| matches!(c, Cue::Speak(_)))
        .cloned()
        .collect();
    assert_eq!(
        spoken,
        vec![
            Cue::Speak("person ahead, move right".into()),
            Cue::Speak("person ahead, stop".into()),
        ]
    );
    // Every non-CLEAR decision is reported, suppressed or not.
    assert_eq!(h.engine.telemetry().pending(), 3);
}

#[test]
fn stride_skips_frames_between_detections() {
    let h = harness(vec![vec![person(160.0, 140.0)]], 15);

    for i in 0..14 {
        assert!(h.engine.handle_frame(&Frame::empty(i)).is_none());
    }
    let outcome = h.engine.handle_frame(&Frame::empty(14)).expect("15th frame");
    assert_eq!(outcome.token, ActionToken::Stop);

    let snap = h.engine.diagnostics_snapshot();
    assert_eq!(snap.frames_in, 15);
    assert_eq!(snap.frames_processed, 1);
}

#[test]
fn decisions_are_broadcast_in_order() {
    let h = harness(vec![vec![], vec![person(160.0, 140.0)]], 1);
    let mut rx = h.engine.subscribe_decisions();

    h.engine.handle_frame(&Frame::empty(7));
    h.engine.handle_frame(&Frame::empty(8));

    let first = rx.try_recv().expect("first decision");
    let second = rx.try_recv().expect("second decision");
    assert_eq!((first.seq, first.frame, first.token), (0, 7, ActionToken::Clear));
    assert!(!first.dispatched);
    assert_eq!((second.seq, second.frame, second.token), (1, 8, ActionToken::Stop));
    assert!(second.dispatched);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn worker_delivers_queued_events_after_a_failed_attempt() {
    let h = harness(
        vec![vec![person(160.0, 140.0).with_distance(1.5)], vec![person(260.0, 60.0)]],
        1,
    );
    *h.fail_next.lock() = 1;

    h.engine.handle_frame(&Frame::empty(0));
    h.engine.handle_frame(&Frame::empty(1));
    assert_eq!(h.engine.telemetry().pending(), 2);

    let (tick_tx, tick_rx) = crossbeam_channel::unbounded();
    h.engine.start_with_ticker(tick_rx).expect("start");

    tick_tx.send(Instant::now()).expect("tick");
    wait_until(Duration::from_secs(2), || {
        h.engine.telemetry().diagnostics().batches_failed == 1
    });
    assert_eq!(h.engine.telemetry().pending(), 2);

    tick_tx.send(Instant::now()).expect("tick");
    wait_until(Duration::from_secs(2), || h.batches.lock().len() == 1);

    let batch = h.batches.lock()[0].clone();
    let records = batch.as_array().expect("batch is an array");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["events"], serde_json::json!(["obstacle_center", "stop"]));
    assert_eq!(records[0]["classes"], serde_json::json!(["person"]));
    assert_eq!(records[0]["session_id"], h.engine.telemetry().session_id());
    assert_eq!(records[1]["events"], serde_json::json!(["obstacle_detected", "caution"]));
    assert!(records[1].get("free_ahead_m").is_none());

    assert_eq!(h.engine.telemetry().pending(), 0);
    h.engine.stop().expect("stop");
}
