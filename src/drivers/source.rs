use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::config::DeviceConfig;
use crate::drivers::sample::{Band, BandPowerReading};
use crate::drivers::SenseError;
/// Item delivered on a stream subscription. `Error` is terminal.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem<T> {
    Data(T),
    Error(String),
}
/// Per-channel signal quality as reported by the headset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalQuality {
    pub channels: Vec<f64>,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Accelerometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}
/// Consumer end of one stream. Dropping it cancels the producer.
pub struct Subscription<T> {
    name: &'static str,
    rx: Receiver<StreamItem<T>>,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}
impl<T> Subscription<T> {
    /// Next pending item without blocking. A producer that went away is
    /// reported once as a terminal error.
    pub fn poll(&mut self) -> Option<StreamItem<T>> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(item) => {
                if matches!(item, StreamItem::Error(_)) {
                    self.finished = true;
                }
                Some(item)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                Some(StreamItem::Error(format!("{} stream closed", self.name)))
            }
        }
    }
}
impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        debug!("{} subscription cancelled", self.name);
    }
}
/// Producer end of one stream.
pub struct Publisher<T> {
    tx: Sender<StreamItem<T>>,
    cancelled: Arc<AtomicBool>,
}
impl<T> Publisher<T> {
    /// Returns `false` once the subscriber has gone away.
    pub fn send(&self, item: StreamItem<T>) -> bool {
        !self.is_cancelled() && self.tx.send(item).is_ok()
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
/// One producer, one consumer, cancelable from the consumer side.
pub fn stream<T>(name: &'static str) -> (Publisher<T>, Subscription<T>) {
    let (tx, rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    (
        Publisher {
            tx,
            cancelled: Arc::clone(&cancelled),
        },
        Subscription {
            name,
            rx,
            cancelled,
            finished: false,
        },
    )
}
/// A connected headset exposing its three feeds.
pub trait BandPowerSource: Send {
    fn band_power(&mut self) -> Result<Subscription<BandPowerReading>, SenseError>;
    fn signal_quality(&mut self) -> Result<Subscription<SignalQuality>, SenseError>;
    fn accelerometer(&mut self) -> Result<Subscription<Accelerometer>, SenseError>;
}
/// Opens a source for a configured device.
pub trait DeviceConnector: Send {
    fn connect(&mut self, device: &DeviceConfig) -> Result<Box<dyn BandPowerSource>, SenseError>;
}
#[cfg(test)]
pub use manual::{ManualConnector, ManualFeed, ManualSource};
/// Synthetic headset: noisy band power at a fixed rate with occasional
/// injected spikes, each feed produced on its own thread.
pub struct SimulatedSource {
    channel_count: usize,
    sampling_rate_hz: f64,
    spike_probability: f64,
}
impl SimulatedSource {
    pub fn new(channel_count: usize, sampling_rate_hz: f64) -> Result<Self, SenseError> {
        if sampling_rate_hz <= 0.0 {
            return Err(SenseError::InvalidSampleRate);
        }
        Ok(Self {
            channel_count,
            sampling_rate_hz,
            spike_probability: 0.01,
        })
    }
    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sampling_rate_hz)
    }
}
fn band_base_power(band: Band) -> f64 {
    match band {
        Band::Delta => 12.0,
        Band::Theta => 6.0,
        Band::Alpha => 5.0,
        Band::Beta => 3.0,
        Band::Gamma => 1.0,
    }
}
fn spawn_producer<T: Send + 'static>(
    name: &'static str,
    period: Duration,
    mut next: impl FnMut(u64) -> T + Send + 'static,
) -> Subscription<T> {
    let (publisher, subscription) = stream(name);
    thread::spawn(move || {
        let mut tick = 0u64;
        while publisher.send(StreamItem::Data(next(tick))) {
            tick += 1;
            thread::sleep(period);
        }
        debug!("{name} producer stopped after {tick} items");
    });
    subscription
}
impl BandPowerSource for SimulatedSource {
    fn band_power(&mut self) -> Result<Subscription<BandPowerReading>, SenseError> {
        let channels = self.channel_count;
        let spike_probability = self.spike_probability;
        let period = self.period();
        let period_ms = period.as_millis() as u64;
        Ok(spawn_producer("band-power", period, move |tick| {
            let mut rng = rand::thread_rng();
            let phase = tick as f64 * 0.05;
            Band::ALL
                .into_iter()
                .fold(BandPowerReading::new(tick * period_ms), |reading, band| {
                    let values = (0..channels)
                        .map(|c| {
                            let base = band_base_power(band) * (1.0 + 0.2 * (phase + c as f64).sin());
                            let noise = rng.gen_range(-0.1..0.1_f64) * base;
                            let spike = if rng.gen_bool(spike_probability) {
                                base * 10.0
                            } else {
                                0.0
                            };
                            (base + noise + spike).max(0.0)
                        })
                        .collect();
                    reading.with_band(band, values)
                })
        }))
    }
    fn signal_quality(&mut self) -> Result<Subscription<SignalQuality>, SenseError> {
        let channels = self.channel_count;
        Ok(spawn_producer("signal-quality", Duration::from_secs(1), move |_| {
            let mut rng = rand::thread_rng();
            SignalQuality {
                channels: (0..channels).map(|_| rng.gen_range(0.5..1.5)).collect(),
            }
        }))
    }
    fn accelerometer(&mut self) -> Result<Subscription<Accelerometer>, SenseError> {
        Ok(spawn_producer("accelerometer", Duration::from_millis(100), |_| {
            let mut rng = rand::thread_rng();
            Accelerometer {
                x: rng.gen_range(-0.02..0.02),
                y: rng.gen_range(-0.02..0.02),
                z: 1.0 + rng.gen_range(-0.02..0.02),
            }
        }))
    }
}
/// Hands out a fresh [`SimulatedSource`] for any configured device.
pub struct SimulatedConnector {
    channel_count: usize,
    sampling_rate_hz: f64,
}
impl SimulatedConnector {
    pub fn new(channel_count: usize, sampling_rate_hz: f64) -> Self {
        Self {
            channel_count,
            sampling_rate_hz,
        }
    }
}
impl DeviceConnector for SimulatedConnector {
    fn connect(&mut self, device: &DeviceConfig) -> Result<Box<dyn BandPowerSource>, SenseError> {
        debug!("simulating {} ({})", device.name, device.device_id);
        Ok(Box::new(SimulatedSource::new(
            self.channel_count,
            self.sampling_rate_hz,
        )?))
    }
}
