//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wayfinder_core::planning::FrameGeometry;
use wayfinder_core::telemetry::{TelemetryConfig, MAX_QUEUE_SIZE};
use wayfinder_core::GuidanceConfig;

pub const ENV_TELEMETRY_URL: &str = "WAYFINDER_TELEMETRY_URL";
pub const ENV_FRAME_STRIDE: &str = "WAYFINDER_FRAME_STRIDE";
pub const ENV_SETTINGS: &str = "WAYFINDER_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub telemetry_url: Option<String>,
    pub client_id: String,
    pub frame_stride: u64,
    pub cue_rate_limit_ms: u64,
    pub reference_width: f32,
    pub reference_height: f32,
    pub flush_interval_ms: u64,
    pub max_queue_size: usize,
    /// Nominal camera frame rate used to pace replay.
    pub replay_fps: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            telemetry_url: None,
            client_id: "placeholder".into(),
            frame_stride: 15,
            cue_rate_limit_ms: 1_000,
            reference_width: 320.0,
            reference_height: 320.0,
            flush_interval_ms: 5_000,
            max_queue_size: MAX_QUEUE_SIZE,
            replay_fps: 30.0,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.telemetry_url = self
            .telemetry_url
            .as_ref()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let client_id = self.client_id.trim();
        self.client_id = if client_id.is_empty() {
            "placeholder".into()
        } else {
            client_id.into()
        };
        self.frame_stride = self.frame_stride.clamp(1, 300);
        self.cue_rate_limit_ms = self.cue_rate_limit_ms.clamp(100, 10_000);
        self.reference_width = clamp_dimension(self.reference_width);
        self.reference_height = clamp_dimension(self.reference_height);
        self.flush_interval_ms = self.flush_interval_ms.clamp(500, 600_000);
        self.max_queue_size = self.max_queue_size.clamp(1, 10_000);
        self.replay_fps = if self.replay_fps.is_finite() {
            self.replay_fps.clamp(0.0, 240.0)
        } else {
            30.0
        };
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_TELEMETRY_URL) {
            self.telemetry_url = Some(url);
        }
        if let Some(stride) = lookup(ENV_FRAME_STRIDE).and_then(|s| s.trim().parse().ok()) {
            self.frame_stride = stride;
        }
        self.normalize();
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Delay between replayed frames. Zero replays as fast as possible.
    pub fn frame_interval(&self) -> Duration {
        if self.replay_fps > 0.0 {
            Duration::from_secs_f32(1.0 / self.replay_fps)
        } else {
            Duration::ZERO
        }
    }

    pub fn guidance_config(&self) -> GuidanceConfig {
        GuidanceConfig {
            frame_stride: self.frame_stride,
            cue_rate_limit: Duration::from_millis(self.cue_rate_limit_ms),
            reference_frame: FrameGeometry::new(self.reference_width, self.reference_height),
            telemetry: TelemetryConfig {
                base_url: self.telemetry_url.clone(),
                flush_interval: Duration::from_millis(self.flush_interval_ms),
                max_queue_size: self.max_queue_size,
                client_id: self.client_id.clone(),
                ..TelemetryConfig::default()
            },
        }
    }
}

fn clamp_dimension(raw: f32) -> f32 {
    if raw.is_finite() {
        raw.clamp(1.0, 8192.0)
    } else {
        320.0
    }
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os(ENV_SETTINGS) {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Wayfinder")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("wayfinder")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
