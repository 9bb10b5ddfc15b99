use std::collections::VecDeque;
use crate::drivers::sample::{Band, Sample};
use crate::drivers::SenseError;
/// Upper bound for any rolling window, in samples.
pub const MAX_WINDOW_SAMPLES: usize = 1_000_000;
/// Rolling baseline window: the most recent `capacity` raw values for every
/// (band, channel) pair.
#[derive(Clone, Debug)]
pub struct SlidingWindowStore {
    per_band: Vec<Vec<VecDeque<f64>>>, // band -> channel -> values
    channel_count: usize,
    capacity: usize,
}
impl SlidingWindowStore {
    pub fn new(channel_count: usize, capacity: usize) -> Result<Self, SenseError> {
        if capacity == 0 || capacity > MAX_WINDOW_SAMPLES {
            return Err(SenseError::InvalidConfig(format!(
                "sliding window capacity {capacity} outside 1..={MAX_WINDOW_SAMPLES}"
            )));
        }
        let per_band = Band::ALL
            .iter()
            .map(|_| {
                (0..channel_count)
                    .map(|_| VecDeque::with_capacity(capacity + 1))
                    .collect()
            })
            .collect();
        Ok(Self {
            per_band,
            channel_count,
            capacity,
        })
    }
    /// Number of samples currently held (identical across pairs).
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.per_band
            .first()
            .and_then(|channels| channels.first())
            .map(VecDeque::len)
            .unwrap_or(0)
    }
    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }
    /// Appends one value per (band, channel), evicting the oldest on overflow.
    pub fn push(&mut self, sample: &Sample) {
        debug_assert_eq!(sample.channel_count(), self.channel_count);
        for band in Band::ALL {
            for (channel, queue) in self.per_band[band.index()].iter_mut().enumerate() {
                queue.push_back(sample.value(band, channel));
                if queue.len() > self.capacity {
                    queue.pop_front();
                }
            }
        }
    }
    pub fn extend<'a>(&mut self, samples: impl IntoIterator<Item = &'a Sample>) {
        for sample in samples {
            self.push(sample);
        }
    }
    /// Current contents for one pair, oldest first.
    ///
    /// Panics on an out-of-range channel: the channel set is validated once
    /// when the session starts.
    pub fn snapshot(&self, band: Band, channel: usize) -> &VecDeque<f64> {
        &self.per_band[band.index()][channel]
    }
}
