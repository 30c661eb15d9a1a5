//! Recorded detections replayed as a frame source.
//!
//! File format: JSON lines, one camera frame per line, each line an array
//! of detections in the detector's pixel space. Blank lines are frames
//! with nothing detected.
//!
//! ```text
//! [{"label":"person","confidence":0.9,"centerX":160,"centerY":160,"width":60,"height":140}]
//! []
//! ```

use std::fs;
use std::path::Path;

use anyhow::Context;
use wayfinder_core::error::Result;
use wayfinder_core::inference::{Detector, Frame};
use wayfinder_core::Detection;

pub fn parse_frames(raw: &str) -> anyhow::Result<Vec<Vec<Detection>>> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(line).with_context(|| format!("line {}: invalid detections", i + 1))
        })
        .collect()
}

pub fn load_frames(path: &Path) -> anyhow::Result<Vec<Vec<Detection>>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading replay file {}", path.display()))?;
    parse_frames(&raw)
}

/// Detector that answers each frame with the detections recorded for its
/// sequence number, so sampling skips recorded frames exactly as it would
/// skip live ones.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    frames: Vec<Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let recorded = usize::try_from(frame.seq)
            .ok()
            .and_then(|i| self.frames.get(i))
            .cloned()
            .unwrap_or_default();
        Ok(recorded)
    }
}
