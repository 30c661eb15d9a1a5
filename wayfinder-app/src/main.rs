mod replay;
mod settings;

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use wayfinder_core::feedback::{ActuatorHandle, LogActuator};
use wayfinder_core::inference::{DetectorHandle, Frame};
use wayfinder_core::telemetry::FlushOutcome;
use wayfinder_core::GuidanceEngine;

use replay::{load_frames, ReplayDetector};
use settings::{default_settings_path, load_settings, save_settings};

fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("wayfinder=info,wayfinder_core=info")
            }),
        )
        .init();

    let Some(replay_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: wayfinder <detections.jsonl>");
        std::process::exit(2);
    };

    let settings_path = default_settings_path();
    let mut app_settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &app_settings) {
            warn!(error = %e, settings_path = ?settings_path, "could not write default settings");
        }
    }
    app_settings.apply_env_overrides();
    info!(
        settings_path = ?settings_path,
        frame_stride = app_settings.frame_stride,
        telemetry_url = ?app_settings.telemetry_url,
        replay_fps = app_settings.replay_fps,
        "runtime settings loaded"
    );

    // ── Engine setup ──────────────────────────────────────────────────────
    let detector = ReplayDetector::new(load_frames(&replay_path)?);
    if detector.is_empty() {
        warn!(path = ?replay_path, "replay file has no frames");
    }
    let frame_count = detector.len() as u64;
    info!(path = ?replay_path, frames = frame_count, "replay loaded");

    let engine = GuidanceEngine::new(
        app_settings.guidance_config(),
        DetectorHandle::new(detector),
        ActuatorHandle::new(LogActuator::new()),
    );
    if app_settings.telemetry_url.is_some() && !engine.telemetry().is_enabled() {
        warn!("telemetry endpoint rejected, continuing without telemetry");
    }

    let mut decisions = engine.subscribe_decisions();
    let observer = thread::Builder::new()
        .name("wayfinder-decisions".into())
        .spawn(move || {
            let mut dispatched = 0usize;
            loop {
                match decisions.blocking_recv() {
                    Ok(event) if event.dispatched => {
                        dispatched += 1;
                        info!(frame = event.frame, token = %event.token, "cue");
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "decision observer lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
            dispatched
        })?;

    engine.start()?;

    // ── Replay ────────────────────────────────────────────────────────────
    let interval = app_settings.frame_interval();
    let started = Instant::now();
    for seq in 0..frame_count {
        engine.handle_frame(&Frame::empty(seq));
        if !interval.is_zero() {
            let due = interval.saturating_mul(u32::try_from(seq + 1).unwrap_or(u32::MAX));
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                thread::sleep(wait);
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────
    engine.stop()?;
    match engine.flush_telemetry() {
        FlushOutcome::Failed { requeued, .. } => {
            warn!(pending = requeued, "final telemetry flush failed")
        }
        outcome => info!(?outcome, "final telemetry flush"),
    }

    let snapshot = engine.diagnostics_snapshot();
    let telemetry = engine.telemetry().diagnostics();
    drop(engine);
    let observed = observer
        .join()
        .map_err(|_| anyhow::anyhow!("decision observer panicked"))?;

    info!(
        frames_in = snapshot.frames_in,
        frames_processed = snapshot.frames_processed,
        cues = snapshot.cues_dispatched,
        suppressed = snapshot.cues_suppressed,
        stops = snapshot.stop_count,
        veers = snapshot.veer_count,
        observed,
        events_sent = telemetry.events_sent,
        "replay finished"
    );
    Ok(())
}
