use std::collections::BTreeMap;
use log::{debug, warn};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use crate::drivers::SenseError;
/// Frequency bands delivered by the band-power stream, in storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}
impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];
    pub const COUNT: usize = Self::ALL.len();
    pub fn index(self) -> usize {
        self as usize
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|band| band.as_str() == name)
    }
}
/// One reading exactly as the stream hands it over: band name to per-channel
/// power. Bands may be missing; unknown band names are tolerated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowerReading {
    #[serde(default)]
    pub timestamp_ms: u64,
    pub data: BTreeMap<String, Vec<f64>>,
}
impl BandPowerReading {
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            data: BTreeMap::new(),
        }
    }
    pub fn with_band(mut self, band: Band, values: Vec<f64>) -> Self {
        self.data.insert(band.as_str().to_owned(), values);
        self
    }
    /// Reading with every band set to the same per-channel values.
    #[cfg(test)]
    pub fn uniform(timestamp_ms: u64, values: &[f64]) -> Self {
        Band::ALL
            .into_iter()
            .fold(Self::new(timestamp_ms), |reading, band| {
                reading.with_band(band, values.to_vec())
            })
    }
}
/// A complete sample: every band present, fixed channel count.
///
/// Bands that were absent (or had the wrong channel count) in the source
/// reading are zero vectors and flagged as not present, so downstream
/// indexing never goes out of range.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp_ms: u64,
    power: Array2<f64>, // bands x channels
    present: [bool; Band::COUNT],
}
impl Sample {
    pub fn zeros(timestamp_ms: u64, channel_count: usize) -> Self {
        Self {
            timestamp_ms,
            power: Array2::zeros((Band::COUNT, channel_count)),
            present: [false; Band::COUNT],
        }
    }
    pub fn from_reading(reading: &BandPowerReading, channel_count: usize) -> Self {
        let mut sample = Self::zeros(reading.timestamp_ms, channel_count);
        for (name, values) in &reading.data {
            let Some(band) = Band::from_name(name) else {
                debug!("ignoring unknown band {name}");
                continue;
            };
            if values.len() != channel_count {
                let err = SenseError::ChannelMismatch {
                    band: name.clone(),
                    expected: channel_count,
                    actual: values.len(),
                };
                warn!("{err}; zero-filling");
                continue;
            }
            sample.set_band(band, values);
        }
        sample
    }
    pub fn set_band(&mut self, band: Band, values: &[f64]) {
        let mut row = self.power.row_mut(band.index());
        for (slot, value) in row.iter_mut().zip(values) {
            *slot = *value;
        }
        self.present[band.index()] = true;
    }
    pub fn channel_count(&self) -> usize {
        self.power.ncols()
    }
    pub fn has_band(&self, band: Band) -> bool {
        self.present[band.index()]
    }
    pub fn band(&self, band: Band) -> ArrayView1<'_, f64> {
        self.power.row(band.index())
    }
    /// Panics if `channel` is out of range; the channel set is fixed per session.
    pub fn value(&self, band: Band, channel: usize) -> f64 {
        self.power[[band.index(), channel]]
    }
}
