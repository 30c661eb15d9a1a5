//! Placeholder detectors that need no model files.
//!
//! `StubDetector` models a device with no model loaded. `ScriptedDetector`
//! replays pre-recorded detection sets, one per frame, so the full
//! decision/cue/telemetry pipeline can be exercised end-to-end.

use std::collections::VecDeque;

use tracing::debug;

use crate::detection::Detection;
use crate::error::{Result, WayfinderError};
use crate::inference::{Detector, Frame};

/// Detector with no model: every call fails with `ModelNotLoaded`.
#[derive(Debug, Default)]
pub struct StubDetector;

impl StubDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for StubDetector {
    fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Err(WayfinderError::ModelNotLoaded)
    }
}

/// Returns queued detection sets in order, then empty sets forever.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Vec<Detection>>,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Vec<Detection>>,
    {
        Self {
            script: script.into_iter().collect(),
            calls: 0,
        }
    }

    pub fn push(&mut self, detections: Vec<Detection>) {
        self.script.push_back(detections);
    }

    /// Detection sets not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Detector for ScriptedDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        let detections = self.script.pop_front().unwrap_or_default();
        debug!(
            frame = frame.seq,
            count = detections.len(),
            "ScriptedDetector::infer"
        );
        Ok(detections)
    }
}
