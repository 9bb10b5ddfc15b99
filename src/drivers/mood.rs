use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use crate::drivers::sample::{Band, Sample};
use crate::drivers::buffer::MAX_WINDOW_SAMPLES;
use crate::drivers::SenseError;
/// Floor applied to alpha power before logs and divisions.
pub const POWER_FLOOR: f64 = 1e-6;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Angry,
    Bored,
    Relaxed,
}
impl Emotion {
    /// Quadrant rule on (valence, arousal). Zero counts as positive on both axes.
    pub fn classify(valence: f64, arousal: f64) -> Self {
        match (valence >= 0.0, arousal >= 0.0) {
            (true, true) => Emotion::Happy,
            (false, true) => Emotion::Angry,
            (false, false) => Emotion::Bored,
            (true, false) => Emotion::Relaxed,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Bored => "bored",
            Emotion::Relaxed => "relaxed",
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoodReading {
    pub valence: f64,
    pub arousal: f64,
    pub emotion: Emotion,
}
/// Last values published by the estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoodState {
    pub last_valence: f64,
    pub last_arousal: f64,
    pub last_emotion: Option<Emotion>,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    pub valence_window: usize,
    pub valence_step: usize,
    pub arousal_window: usize,
    pub arousal_step: usize,
}
impl Default for MoodConfig {
    fn default() -> Self {
        // 20 s / 10 s of data at 4 Hz, stepping by half a window
        Self {
            valence_window: 80,
            valence_step: 40,
            arousal_window: 40,
            arousal_step: 20,
        }
    }
}
impl MoodConfig {
    pub fn validate(&self) -> Result<(), SenseError> {
        for (name, window, step) in [
            ("valence", self.valence_window, self.valence_step),
            ("arousal", self.arousal_window, self.arousal_step),
        ] {
            if window == 0 || step == 0 || step > window || window > MAX_WINDOW_SAMPLES {
                return Err(SenseError::InvalidConfig(format!(
                    "{name} window {window} with step {step}: need 0 < step <= window <= {MAX_WINDOW_SAMPLES}"
                )));
            }
        }
        Ok(())
    }
}
/// Sample buffer that slides by `step` once it fills, keeping the overlap.
#[derive(Clone, Debug)]
pub struct OverlapBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    step: usize,
}
impl OverlapBuffer {
    pub fn new(capacity: usize, step: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            step,
        }
    }
    /// Pushes a sample, dropping the oldest if the buffer would overflow.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
    /// Drops the oldest `step` samples.
    pub fn slide(&mut self) {
        let count = self.step.min(self.samples.len());
        self.samples.drain(..count);
    }
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
/// The valence and arousal buffers fed with every live sample.
#[derive(Clone, Debug)]
pub struct MoodWindow {
    pub valence: OverlapBuffer,
    pub arousal: OverlapBuffer,
}
impl MoodWindow {
    pub fn new(config: &MoodConfig) -> Self {
        Self {
            valence: OverlapBuffer::new(config.valence_window, config.valence_step),
            arousal: OverlapBuffer::new(config.arousal_window, config.arousal_step),
        }
    }
    pub fn push(&mut self, sample: &Sample) {
        self.valence.push(sample.clone());
        self.arousal.push(sample.clone());
    }
    /// Slides both buffers after an estimate was emitted.
    pub fn slide(&mut self) {
        self.valence.slide();
        self.arousal.slide();
    }
    pub fn clear(&mut self) {
        self.valence.clear();
        self.arousal.clear();
    }
}
/// Frontal-asymmetry valence and beta/alpha arousal over overlapping windows.
#[derive(Clone, Debug)]
pub struct MoodEstimator {
    left_channel: usize,
    right_channel: usize,
}
impl MoodEstimator {
    pub fn new(left_channel: usize, right_channel: usize) -> Self {
        Self {
            left_channel,
            right_channel,
        }
    }
    /// `ln(alpha[right]) - ln(alpha[left])`; 0 when alpha was missing.
    pub fn valence_score(&self, sample: &Sample) -> f64 {
        if !sample.has_band(Band::Alpha) {
            return 0.0;
        }
        let left = sample.value(Band::Alpha, self.left_channel).max(POWER_FLOOR);
        let right = sample.value(Band::Alpha, self.right_channel).max(POWER_FLOOR);
        right.ln() - left.ln()
    }
    /// Ratio of mean beta to mean alpha; 0 when either band was missing.
    pub fn arousal_score(&self, sample: &Sample) -> f64 {
        if !sample.has_band(Band::Alpha) || !sample.has_band(Band::Beta) {
            return 0.0;
        }
        let beta = sample.band(Band::Beta).mean().unwrap_or(0.0);
        let alpha = sample.band(Band::Alpha).mean().unwrap_or(0.0);
        beta / alpha.max(POWER_FLOOR)
    }
    /// Produces a reading once the valence buffer is full, without touching
    /// the window; the caller slides it afterwards.
    ///
    /// Until the arousal buffer fills on its own, arousal is averaged over
    /// the valence buffer instead.
    pub fn estimate(&self, window: &MoodWindow) -> Option<MoodReading> {
        if !window.valence.is_full() {
            return None;
        }
        let valence = finite_mean(window.valence.iter().map(|s| self.valence_score(s)));
        let arousal_source = if window.arousal.is_full() {
            &window.arousal
        } else {
            &window.valence
        };
        let arousal = finite_mean(arousal_source.iter().map(|s| self.arousal_score(s)));
        Some(MoodReading {
            valence,
            arousal,
            emotion: Emotion::classify(valence, arousal),
        })
    }
}
/// Mean of the finite scores; 0 when none are finite.
fn finite_mean(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .filter(|score| score.is_finite())
        .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
