//! Fused normalisation and artifact rejection.
//!
//! Every (band, channel) value is scored against its own rolling window
//! (median/MAD, computed after the value was pushed). In-range values are
//! replaced by their robust z-score; outliers are frozen at the previous
//! output and accumulate a streak. Streak counts across all pairs drive one
//! global, hysteretic alert.
use std::collections::VecDeque;
use log::trace;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use crate::drivers::buffer::SlidingWindowStore;
use crate::drivers::sample::{Band, Sample};
use crate::drivers::stats::robust_stats;
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// |z| above this marks the value as an artifact.
    pub z_threshold: f64,
    /// One pair held this many consecutive samples raises the alert.
    pub single_channel_streak: u32,
    /// Two or more pairs held this many consecutive samples raise the alert.
    pub multi_channel_streak: u32,
}
impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            single_channel_streak: 8,
            multi_channel_streak: 5,
        }
    }
}
/// Hold flag and consecutive-artifact streak for one (band, channel).
/// `held == false` always comes with `streak == 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelHold {
    pub held: bool,
    pub streak: u32,
}
/// Hold state for every (band, channel) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactState {
    holds: Array2<ChannelHold>, // bands x channels
}
impl ArtifactState {
    pub fn new(channel_count: usize) -> Self {
        Self {
            holds: Array2::default((Band::COUNT, channel_count)),
        }
    }
    pub fn get(&self, band: Band, channel: usize) -> ChannelHold {
        self.holds[[band.index(), channel]]
    }
    pub fn held_count(&self) -> usize {
        self.holds.iter().filter(|hold| hold.held).count()
    }
    fn streaks_at_least(&self, threshold: u32) -> usize {
        self.holds
            .iter()
            .filter(|hold| hold.streak >= threshold)
            .count()
    }
}
/// Outcome of scoring one value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub output: f64,
    pub z: f64,
    pub hold: ChannelHold,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertTransition {
    Raised,
    Cleared,
    Unchanged,
}
#[derive(Clone, Debug)]
pub struct ArtifactDetector {
    config: ArtifactConfig,
}
impl ArtifactDetector {
    pub fn new(config: ArtifactConfig) -> Self {
        Self { config }
    }
    /// Scores `raw` against `window`, which must already contain it.
    ///
    /// `last_output` is what this pair emitted for the previous sample; a
    /// held value repeats it (or 0 when there is none).
    pub fn classify(
        &self,
        raw: f64,
        window: &VecDeque<f64>,
        previous: ChannelHold,
        last_output: Option<f64>,
    ) -> Classification {
        let stats = robust_stats(window);
        let z = stats.z_score(raw);
        if z.abs() > self.config.z_threshold {
            Classification {
                output: last_output.unwrap_or(0.0),
                z,
                hold: ChannelHold {
                    held: true,
                    streak: previous.streak.saturating_add(1),
                },
            }
        } else {
            Classification {
                output: z,
                z,
                hold: ChannelHold::default(),
            }
        }
    }
    /// Classifies every pair of `sample` against `window` (already pushed).
    /// Returns the normalised frame (bands x channels) and the next hold state.
    pub fn classify_sample(
        &self,
        sample: &Sample,
        window: &SlidingWindowStore,
        state: &ArtifactState,
        previous_output: Option<&Array2<f64>>,
    ) -> (Array2<f64>, ArtifactState) {
        let channels = sample.channel_count();
        let mut output = Array2::zeros((Band::COUNT, channels));
        let mut next = ArtifactState::new(channels);
        for band in Band::ALL {
            for channel in 0..channels {
                let idx = [band.index(), channel];
                let result = self.classify(
                    sample.value(band, channel),
                    window.snapshot(band, channel),
                    state.get(band, channel),
                    previous_output.map(|frame| frame[idx]),
                );
                if result.hold.held {
                    trace!(
                        "{} ch{channel} held at z={:.2} (streak {})",
                        band.as_str(),
                        result.z,
                        result.hold.streak
                    );
                }
                output[idx] = result.output;
                next.holds[idx] = result.hold;
            }
        }
        (output, next)
    }
    /// Recomputes the global alert from the streak counters.
    ///
    /// Raised when one pair reaches the single-channel streak or two pairs
    /// reach the multi-channel streak; cleared only when neither holds.
    pub fn update_alert(&self, state: &ArtifactState, active: bool) -> (bool, AlertTransition) {
        let single = state.streaks_at_least(self.config.single_channel_streak);
        let multi = state.streaks_at_least(self.config.multi_channel_streak);
        if !active && (single >= 1 || multi >= 2) {
            (true, AlertTransition::Raised)
        } else if active && single == 0 && multi < 2 {
            (false, AlertTransition::Cleared)
        } else {
            (active, AlertTransition::Unchanged)
        }
    }
}
