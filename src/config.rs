// src/config.rs
// 会话配置：默认值与原始系统一致，可从 JSON 文件覆盖
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::drivers::buffer::MAX_WINDOW_SAMPLES;
use crate::drivers::{ArtifactConfig, Emotion, MoodConfig, SenseError};
use crate::indicator::Rgb;
// 所有时间参数的上限：一天
const MAX_SPAN_MS: u64 = 86_400_000;
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub device_id: String,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Dwell in the relax phase before placement starts.
    pub relax_dwell_ms: u64,
    /// Minimum time the buffering phase stays visible.
    pub min_buffer_display_ms: u64,
    pub breathing_tick_ms: u64,
}
impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            relax_dwell_ms: 5_000,
            min_buffer_display_ms: 2_000,
            breathing_tick_ms: 80,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionColors {
    pub happy: Rgb,
    pub angry: Rgb,
    pub relaxed: Rgb,
    pub bored: Rgb,
}
impl Default for EmotionColors {
    fn default() -> Self {
        Self {
            happy: Rgb::new(255, 255, 0),
            angry: Rgb::new(255, 0, 0),
            relaxed: Rgb::new(0, 0, 255),
            bored: Rgb::new(0, 255, 0),
        }
    }
}
impl EmotionColors {
    pub fn for_emotion(&self, emotion: Emotion) -> Rgb {
        match emotion {
            Emotion::Happy => self.happy,
            Emotion::Angry => self.angry,
            Emotion::Relaxed => self.relaxed,
            Emotion::Bored => self.bored,
        }
    }
}
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Serial port of the LED controller; no port means no indicator.
    pub port: Option<String>,
    pub baud_rate: u32,
}
impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
        }
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sampling_rate_hz: f64,
    pub window_seconds: f64,
    pub channel_names: Vec<String>,
    pub frontal_left: String,
    pub frontal_right: String,
    pub artifact: ArtifactConfig,
    pub mood: MoodConfig,
    pub timing: TimingConfig,
    pub colors: EmotionColors,
    pub devices: Vec<DeviceConfig>,
    pub indicator: IndicatorConfig,
    /// Device index selected right after start-up.
    pub auto_select_device: Option<usize>,
}
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 4.0,
            window_seconds: 10.0,
            channel_names: ["F5", "F6", "C3", "C4", "P7", "P8", "O1", "O2"]
                .into_iter()
                .map(String::from)
                .collect(),
            frontal_left: "F5".into(),
            frontal_right: "F6".into(),
            artifact: ArtifactConfig::default(),
            mood: MoodConfig::default(),
            timing: TimingConfig::default(),
            colors: EmotionColors::default(),
            devices: vec![
                DeviceConfig {
                    name: "Crown A".into(),
                    device_id: "crown-a".into(),
                },
                DeviceConfig {
                    name: "Crown B".into(),
                    device_id: "crown-b".into(),
                },
            ],
            indicator: IndicatorConfig::default(),
            auto_select_device: None,
        }
    }
}
impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SenseError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
    pub fn channel_count(&self) -> usize {
        self.channel_names.len()
    }
    /// Samples held by the baseline window (rate x seconds, rounded up).
    pub fn window_capacity(&self) -> usize {
        (self.sampling_rate_hz * self.window_seconds).ceil() as usize
    }
    pub fn channel_index(&self, name: &str) -> Result<usize, SenseError> {
        self.channel_names
            .iter()
            .position(|channel| channel == name)
            .ok_or_else(|| SenseError::UnknownChannel(name.to_owned()))
    }
    pub fn validate(&self) -> Result<(), SenseError> {
        let max_span_secs = MAX_SPAN_MS as f64 / 1000.0;
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return Err(SenseError::InvalidSampleRate);
        }
        if 1.0 / self.sampling_rate_hz > max_span_secs {
            return Err(SenseError::InvalidConfig(
                "sampling period must not exceed one day".into(),
            ));
        }
        if !(self.window_seconds > 0.0 && self.window_seconds <= max_span_secs) {
            return Err(SenseError::InvalidConfig(
                "window_seconds must be positive and at most one day".into(),
            ));
        }
        if self.sampling_rate_hz * self.window_seconds > MAX_WINDOW_SAMPLES as f64 {
            return Err(SenseError::InvalidConfig(format!(
                "baseline window exceeds {MAX_WINDOW_SAMPLES} samples"
            )));
        }
        if self.channel_names.is_empty() {
            return Err(SenseError::InvalidConfig("no channels configured".into()));
        }
        self.channel_index(&self.frontal_left)?;
        self.channel_index(&self.frontal_right)?;
        if self.artifact.z_threshold.is_nan() || self.artifact.z_threshold <= 0.0 {
            return Err(SenseError::InvalidConfig(
                "artifact z_threshold must be positive".into(),
            ));
        }
        if self.timing.breathing_tick_ms == 0 {
            return Err(SenseError::InvalidConfig(
                "breathing_tick_ms must be greater than zero".into(),
            ));
        }
        for (name, ms) in [
            ("relax_dwell_ms", self.timing.relax_dwell_ms),
            ("min_buffer_display_ms", self.timing.min_buffer_display_ms),
            ("breathing_tick_ms", self.timing.breathing_tick_ms),
        ] {
            if ms > MAX_SPAN_MS {
                return Err(SenseError::InvalidConfig(format!(
                    "{name} {ms} exceeds one day"
                )));
            }
        }
        self.mood.validate()
    }
}
