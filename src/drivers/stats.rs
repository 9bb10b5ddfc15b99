//! Robust location/scale estimates used to normalise band power.
//!
//! The median and the median absolute deviation (MAD) replace mean/std so a
//! handful of artifact samples inside the window cannot drag the baseline
//! along with them.

/// Normal-consistency constant: MAD * 1.4826 estimates sigma for Gaussian data.
pub const MAD_SCALE: f64 = 1.4826;

/// Median and scaled MAD of one window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobustStats {
    pub median: f64,
    pub mad: f64,
}
impl RobustStats {
    /// Robust z-score of `value` relative to this window.
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.median) / self.mad
    }
}
impl Default for RobustStats {
    fn default() -> Self {
        Self {
            median: 0.0,
            mad: 1.0,
        }
    }
}

/// Median of `values`; `0.0` for an empty input. Sorts a copy.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Computes median and scaled MAD in one pass over the window.
///
/// An empty window yields `(0, 1)`. A degenerate window whose scaled MAD is
/// zero (or not a number) reports a MAD of `1.0`, so callers can always divide
/// by it.
pub fn robust_stats<'a>(values: impl IntoIterator<Item = &'a f64>) -> RobustStats {
    let values: Vec<f64> = values.into_iter().copied().collect();
    if values.is_empty() {
        return RobustStats::default();
    }
    let med = median(&values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let scaled = median(&deviations) * MAD_SCALE;
    let mad = if scaled == 0.0 || scaled.is_nan() {
        1.0
    } else {
        scaled
    };
    RobustStats { median: med, mad }
}
