//! `LogActuator`: renders cues as tracing events instead of audio/haptics.
//!
//! Used by headless hosts and replay runs where no speech or vibration
//! backend exists.

use std::time::Duration;

use tracing::info;

use crate::error::Result;
use crate::feedback::{Actuator, SpeechPriority};

#[derive(Debug, Default)]
pub struct LogActuator {
    spoken: u64,
    vibrations: u64,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> u64 {
        self.spoken
    }

    pub fn vibrations(&self) -> u64 {
        self.vibrations
    }
}

impl Actuator for LogActuator {
    fn speak(&mut self, message: &str, priority: SpeechPriority) -> Result<()> {
        self.spoken += 1;
        info!(text = message, ?priority, "cue spoken");
        Ok(())
    }

    fn vibrate(&mut self, pattern: &[Duration]) -> Result<()> {
        self.vibrations += 1;
        let pattern_ms: Vec<u128> = pattern.iter().map(Duration::as_millis).collect();
        info!(?pattern_ms, "cue vibration");
        Ok(())
    }
}
