// src/session.rs
// 会话控制器：阶段切换 + 每个样本的处理流水线
//
// All mutable session state lives here. Time-dependent transitions take an
// explicit `now` so the engine drives them with the wall clock and tests with
// a simulated one.
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use log::{debug, error, info, trace, warn};
use ndarray::Array2;
use crate::config::SessionConfig;
use crate::drivers::{
    Accelerometer, AlertTransition, ArtifactDetector, ArtifactState, Band, BandPowerReading,
    BandPowerSource, DeviceConnector, Emotion, MoodEstimator, MoodState, MoodWindow, Sample,
    SenseError, SignalQuality, SlidingWindowStore, StreamItem, Subscription,
};
use crate::indicator::{Breathing, Indicator, Rgb};
use crate::types::{SessionEvent, SessionPhase};
struct ConnectedDevice {
    name: String,
    source: Box<dyn BandPowerSource>,
}
/// Raw samples collected while the baseline fills.
struct BaselineBuffer {
    samples: Vec<Sample>,
    started: Instant,
}
/// Who currently owns the indicator colour.
#[derive(Default)]
struct Lighting {
    breathing: Option<(Breathing, Instant)>, // animation + next tick
    mood_color: Option<Rgb>,
    manual_override: Option<Rgb>,
    pending_emotion: Option<Emotion>, // latest emotion seen under an override
    failed: bool,
}
pub struct SessionController {
    config: SessionConfig,
    connector: Box<dyn DeviceConnector>,
    indicator: Box<dyn Indicator>,
    events: Sender<SessionEvent>,
    detector: ArtifactDetector,
    estimator: MoodEstimator,
    device: Option<ConnectedDevice>,
    band_power: Option<Subscription<BandPowerReading>>,
    signal_quality: Option<Subscription<SignalQuality>>,
    accelerometer: Option<Subscription<Accelerometer>>,
    phase: SessionPhase,
    resume_phase: Option<SessionPhase>,
    relax_deadline: Option<Instant>,
    baseline: Option<BaselineBuffer>,
    live_due: Option<Instant>,
    window: Option<SlidingWindowStore>,
    artifacts: ArtifactState,
    alert_active: bool,
    previous_output: Option<Array2<f64>>,
    mood_window: MoodWindow,
    mood: MoodState,
    lighting: Lighting,
}
impl SessionController {
    pub fn new(
        config: SessionConfig,
        connector: Box<dyn DeviceConnector>,
        indicator: Box<dyn Indicator>,
        events: Sender<SessionEvent>,
    ) -> Result<Self, SenseError> {
        config.validate()?;
        let estimator = MoodEstimator::new(
            config.channel_index(&config.frontal_left)?,
            config.channel_index(&config.frontal_right)?,
        );
        Ok(Self {
            detector: ArtifactDetector::new(config.artifact),
            estimator,
            artifacts: ArtifactState::new(config.channel_count()),
            mood_window: MoodWindow::new(&config.mood),
            config,
            connector,
            indicator,
            events,
            device: None,
            band_power: None,
            signal_quality: None,
            accelerometer: None,
            phase: SessionPhase::Idle,
            resume_phase: None,
            relax_deadline: None,
            baseline: None,
            live_due: None,
            window: None,
            alert_active: false,
            previous_output: None,
            mood: MoodState::default(),
            lighting: Lighting::default(),
        })
    }
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }
    #[cfg(test)]
    pub fn alert_active(&self) -> bool {
        self.alert_active
    }
    #[cfg(test)]
    pub fn mood(&self) -> MoodState {
        self.mood
    }
    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }
    #[cfg(test)]
    pub fn artifacts(&self) -> &ArtifactState {
        &self.artifacts
    }
    #[cfg(test)]
    pub fn window(&self) -> Option<&SlidingWindowStore> {
        self.window.as_ref()
    }
    fn emit(&self, event: SessionEvent) {
        self.events.send(event).ok();
    }
    // ============================================================
    // 阶段切换
    // ============================================================
    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            info!("session phase {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
        self.emit(SessionEvent::SessionPhase(phase));
    }
    /// Moves to `phase`, or records it as the resume target while the
    /// placement-assist diversion is showing.
    fn advance_to(&mut self, phase: SessionPhase) {
        if self.phase == SessionPhase::PlacementAssist {
            debug!("deferring {phase:?} until placement assist completes");
            self.resume_phase = Some(phase);
        } else {
            self.set_phase(phase);
        }
    }
    /// Disconnects any current device and connects to configured device `index`,
    /// then runs the startup sequence.
    pub fn select_device(&mut self, index: usize, now: Instant) {
        self.disconnect();
        let Some(device) = self.config.devices.get(index).cloned() else {
            let err = SenseError::UnknownDevice(index);
            warn!("{err}");
            self.emit(SessionEvent::DeviceError(err.to_string()));
            return;
        };
        info!("connecting to {} ({})", device.name, device.device_id);
        match self.connector.connect(&device) {
            Ok(source) => {
                self.device = Some(ConnectedDevice {
                    name: device.name.clone(),
                    source,
                });
                self.emit(SessionEvent::DeviceConnected(device.name));
                self.start_baseline(now);
            }
            Err(err) => {
                error!("connect to {} failed: {err}", device.name);
                self.emit(SessionEvent::DeviceError(err.to_string()));
                self.set_phase(SessionPhase::Idle);
            }
        }
    }
    /// Drops every subscription, the rolling buffers and the device handle.
    pub fn disconnect(&mut self) {
        self.unsubscribe_all();
        self.clear_data_buffers();
        if let Some(device) = self.device.take() {
            info!("disconnected from {}", device.name);
        }
    }
    fn unsubscribe_all(&mut self) {
        self.band_power = None;
        self.signal_quality = None;
        self.accelerometer = None;
        self.relax_deadline = None;
        self.baseline = None;
        self.live_due = None;
    }
    /// Startup sequence: side-channel subscriptions, relax dwell, then placement.
    pub fn start_baseline(&mut self, now: Instant) {
        self.unsubscribe_all();
        self.clear_data_buffers();
        let Some(device) = self.device.as_mut() else {
            self.emit(SessionEvent::DeviceError(SenseError::NotConnected.to_string()));
            return;
        };
        let accelerometer = device.source.accelerometer();
        let signal_quality = device.source.signal_quality();
        match accelerometer {
            Ok(sub) => self.accelerometer = Some(sub),
            Err(err) => self.emit(SessionEvent::DeviceError(err.to_string())),
        }
        match signal_quality {
            Ok(sub) => self.signal_quality = Some(sub),
            Err(err) => self.emit(SessionEvent::DeviceError(err.to_string())),
        }
        self.resume_phase = None;
        self.set_phase(SessionPhase::Relax);
        self.relax_deadline = Some(now + Duration::from_millis(self.config.timing.relax_dwell_ms));
    }
    pub fn start_placement_assist(&mut self) {
        if self.phase != SessionPhase::PlacementAssist {
            self.resume_phase = Some(self.phase);
            self.set_phase(SessionPhase::PlacementAssist);
        }
    }
    /// Ends placement assist, or starts buffering when placement was awaited.
    pub fn placement_complete(&mut self, now: Instant) {
        match self.phase {
            SessionPhase::PlacementAssist => {
                let resume = self.resume_phase.take().unwrap_or(SessionPhase::Live);
                self.set_phase(resume);
                // the same confirmation also ends a pending placement
                if resume == SessionPhase::Placement {
                    self.start_buffering(now);
                }
            }
            SessionPhase::Placement => self.start_buffering(now),
            other => debug!("placement-complete ignored in {other:?}"),
        }
    }
    /// Re-collects the baseline on the connected device, skipping relax/placement.
    pub fn reset_session(&mut self, now: Instant) {
        if self.device.is_none() {
            self.emit(SessionEvent::DeviceError(SenseError::NotConnected.to_string()));
            return;
        }
        self.band_power = None;
        self.live_due = None;
        self.relax_deadline = None;
        self.resume_phase = None;
        self.start_buffering(now);
    }
    fn start_buffering(&mut self, now: Instant) {
        self.band_power = None;
        self.clear_data_buffers();
        self.set_phase(SessionPhase::Buffering);
        self.start_breathing(now);
        let Some(device) = self.device.as_mut() else {
            self.emit(SessionEvent::DeviceError(SenseError::NotConnected.to_string()));
            return;
        };
        match device.source.band_power() {
            Ok(sub) => {
                self.band_power = Some(sub);
                self.baseline = Some(BaselineBuffer {
                    samples: Vec::with_capacity(self.config.window_capacity()),
                    started: now,
                });
            }
            Err(err) => self.fail_session(err.to_string()),
        }
    }
    /// Fatal stream failure: report, drop subscriptions and park in idle.
    fn fail_session(&mut self, message: String) {
        error!("session aborted: {message}");
        self.emit(SessionEvent::DeviceError(message));
        self.unsubscribe_all();
        self.clear_data_buffers();
        self.resume_phase = None;
        if self.lighting.breathing.is_some() {
            self.stop_breathing();
        }
        self.set_phase(SessionPhase::Idle);
    }
    /// Clears every rolling buffer. Calling it twice equals calling it once.
    pub fn clear_data_buffers(&mut self) {
        self.window = None;
        self.artifacts = ArtifactState::new(self.config.channel_count());
        self.alert_active = false;
        self.previous_output = None;
        self.mood_window.clear();
        self.mood.last_valence = 0.0;
        self.mood.last_arousal = 0.0;
    }
    /// Full restart: disconnect, forget overrides and the last emotion, go idle.
    pub fn clear_all_state(&mut self) {
        self.disconnect();
        self.resume_phase = None;
        self.lighting.manual_override = None;
        self.lighting.pending_emotion = None;
        self.lighting.mood_color = None;
        self.mood.last_emotion = None;
        self.stop_breathing();
        self.set_phase(SessionPhase::Idle);
        self.emit(SessionEvent::ResetUi);
    }
    // ============================================================
    // 指示灯
    // ============================================================
    fn write_indicator(&mut self, color: Rgb) {
        let result = self.indicator.set_color(color);
        self.report_indicator(result);
    }
    fn report_indicator(&mut self, result: Result<(), SenseError>) {
        match result {
            Ok(()) => self.lighting.failed = false,
            Err(err) => {
                warn!("indicator write failed: {err}");
                if !self.lighting.failed {
                    self.lighting.failed = true;
                    self.emit(SessionEvent::DeviceError(err.to_string()));
                }
            }
        }
    }
    fn start_breathing(&mut self, now: Instant) {
        if self.lighting.breathing.is_some()
            || self.lighting.manual_override.is_some()
            || self.lighting.mood_color.is_some()
        {
            return;
        }
        self.lighting.breathing = Some((Breathing::default(), now));
    }
    fn stop_breathing(&mut self) {
        self.lighting.breathing = None;
        let result = self.indicator.off();
        self.report_indicator(result);
    }
    /// Writes an owned colour; breathing is suspended while one is set.
    fn apply_color(&mut self, color: Rgb) {
        self.lighting.breathing = None;
        self.write_indicator(color);
    }
    pub fn set_manual_override(&mut self, color: Rgb) {
        info!("manual indicator override {color:?}");
        self.lighting.manual_override = Some(color);
        self.apply_color(color);
    }
    /// Hands the indicator back: the colour of the latest emotion (one seen
    /// under the override wins), otherwise breathing while a session runs.
    pub fn clear_manual_override(&mut self, now: Instant) {
        if self.lighting.manual_override.take().is_none() {
            return;
        }
        info!("manual indicator override cleared");
        if let Some(emotion) = self.lighting.pending_emotion.take() {
            self.mood.last_emotion = Some(emotion);
            self.lighting.mood_color = Some(self.config.colors.for_emotion(emotion));
        }
        if let Some(color) = self.lighting.mood_color {
            self.apply_color(color);
        } else if matches!(self.phase, SessionPhase::Buffering | SessionPhase::Live) {
            self.start_breathing(now);
        }
    }
    fn tick_breathing(&mut self, now: Instant) {
        let tick = Duration::from_millis(self.config.timing.breathing_tick_ms);
        let Some((breathing, next)) = self.lighting.breathing.as_mut() else {
            return;
        };
        if now < *next {
            return;
        }
        let color = breathing.next_color();
        // skip missed ticks rather than replaying them
        *next = (*next + tick).max(now);
        self.write_indicator(color);
    }
    // ============================================================
    // 定时器 + 数据流
    // ============================================================
    /// Drains pending stream items and fires due timers.
    pub fn tick(&mut self, now: Instant) {
        self.pump_side_channels();
        if self.relax_deadline.map_or(false, |due| now >= due) {
            self.relax_deadline = None;
            self.advance_to(SessionPhase::Placement);
        }
        while let Some(item) = self.band_power.as_mut().and_then(|sub| sub.poll()) {
            match item {
                StreamItem::Data(reading) => self.on_band_power(&reading, now),
                StreamItem::Error(message) => self.on_band_power_error(message),
            }
        }
        if self.live_due.map_or(false, |due| now >= due) {
            self.live_due = None;
            self.enter_live();
        }
        self.tick_breathing(now);
    }
    fn pump_side_channels(&mut self) {
        while let Some(item) = self.signal_quality.as_mut().and_then(|sub| sub.poll()) {
            match item {
                StreamItem::Data(quality) => self.emit(SessionEvent::SignalQuality(quality.channels)),
                StreamItem::Error(message) => {
                    warn!("signal quality stream failed: {message}");
                    self.signal_quality = None;
                    self.emit(SessionEvent::DeviceError(message));
                }
            }
        }
        while let Some(item) = self.accelerometer.as_mut().and_then(|sub| sub.poll()) {
            match item {
                StreamItem::Data(sample) => self.emit(SessionEvent::Accelerometer(sample)),
                StreamItem::Error(message) => {
                    warn!("accelerometer stream failed: {message}");
                    self.accelerometer = None;
                    self.emit(SessionEvent::DeviceError(message));
                }
            }
        }
    }
    fn on_band_power_error(&mut self, message: String) {
        if self.baseline.is_some() {
            self.fail_session(message);
        } else {
            warn!("band power stream failed: {message}");
            self.band_power = None;
            self.emit(SessionEvent::DeviceError(message));
        }
    }
    /// Feeds one reading to whichever stage owns the band-power stream.
    pub fn on_band_power(&mut self, reading: &BandPowerReading, now: Instant) {
        let sample = Sample::from_reading(reading, self.config.channel_count());
        if self.baseline.is_some() {
            self.buffer_sample(sample, now);
        } else if self.window.is_some() {
            self.process_live(sample);
        } else {
            trace!("dropping sample at {} ms: no active stage", reading.timestamp_ms);
        }
    }
    fn buffer_sample(&mut self, sample: Sample, now: Instant) {
        let target = self.config.window_capacity();
        let window_span = Duration::from_secs_f64(self.config.window_seconds);
        let Some(baseline) = self.baseline.as_mut() else {
            return;
        };
        baseline.samples.push(sample);
        let count = baseline.samples.len();
        let elapsed = now.saturating_duration_since(baseline.started);
        let started = baseline.started;
        self.emit(SessionEvent::BufferProgress(
            (count as f64 / target as f64).min(1.0),
        ));
        if count < target || elapsed < window_span {
            return;
        }
        let Some(baseline) = self.baseline.take() else {
            return;
        };
        // stop the baseline stream before anything else subscribes
        self.band_power = None;
        let mut window = match SlidingWindowStore::new(self.config.channel_count(), target) {
            Ok(window) => window,
            Err(err) => {
                self.fail_session(err.to_string());
                return;
            }
        };
        window.extend(&baseline.samples);
        self.window = Some(window);
        self.artifacts = ArtifactState::new(self.config.channel_count());
        self.alert_active = false;
        self.previous_output = None;
        info!("baseline filled with {count} samples after {elapsed:?}");
        let min_display = Duration::from_millis(self.config.timing.min_buffer_display_ms);
        self.live_due = Some(started + min_display.max(elapsed));
    }
    fn enter_live(&mut self) {
        self.emit(SessionEvent::BaselineComplete);
        self.advance_to(SessionPhase::Live);
        let Some(device) = self.device.as_mut() else {
            self.emit(SessionEvent::DeviceError(SenseError::NotConnected.to_string()));
            return;
        };
        match device.source.band_power() {
            Ok(sub) => self.band_power = Some(sub),
            Err(err) => {
                error!("live stream unavailable: {err}");
                self.emit(SessionEvent::DeviceError(err.to_string()));
            }
        }
    }
    /// Window push, artifact scoring, alert, normalised output, then mood.
    fn process_live(&mut self, sample: Sample) {
        let Some(window) = self.window.as_mut() else {
            return;
        };
        window.push(&sample);
        let (normalized, artifacts) = self.detector.classify_sample(
            &sample,
            window,
            &self.artifacts,
            self.previous_output.as_ref(),
        );
        self.artifacts = artifacts;
        let (active, transition) = self.detector.update_alert(&self.artifacts, self.alert_active);
        self.alert_active = active;
        match transition {
            AlertTransition::Raised => {
                warn!(
                    "artifact alert raised ({} channels held)",
                    self.artifacts.held_count()
                );
                self.emit(SessionEvent::ArtifactAlert);
            }
            AlertTransition::Cleared => info!("artifact alert cleared"),
            AlertTransition::Unchanged => {}
        }
        let frame: BTreeMap<Band, Vec<f64>> = Band::ALL
            .into_iter()
            .map(|band| (band, normalized.row(band.index()).to_vec()))
            .collect();
        self.emit(SessionEvent::NormalizedData(frame));
        self.previous_output = Some(normalized);
        self.update_mood(&sample);
    }
    fn update_mood(&mut self, sample: &Sample) {
        self.mood_window.push(sample);
        let Some(reading) = self.estimator.estimate(&self.mood_window) else {
            return;
        };
        self.mood_window.slide();
        self.mood.last_valence = reading.valence;
        self.mood.last_arousal = reading.arousal;
        debug!(
            "mood valence={:.3} arousal={:.3} -> {}",
            reading.valence,
            reading.arousal,
            reading.emotion.as_str()
        );
        if self.lighting.manual_override.is_some() {
            self.lighting.pending_emotion = Some(reading.emotion);
        } else if self.mood.last_emotion != Some(reading.emotion) {
            self.mood.last_emotion = Some(reading.emotion);
            let color = self.config.colors.for_emotion(reading.emotion);
            self.lighting.mood_color = Some(color);
            self.apply_color(color);
        }
        self.emit(SessionEvent::Mood(reading));
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{channel, Receiver};
    use crate::drivers::{ManualConnector, ManualFeed, MoodConfig, MoodReading};
    use crate::indicator::RecordingIndicator;
    const CHANNELS: usize = 8;
    struct Rig {
        controller: SessionController,
        feed: ManualFeed,
        indicator: RecordingIndicator,
        events: Receiver<SessionEvent>,
        t0: Instant,
        clock_ms: u64,
    }
    impl Rig {
        fn with_config(config: SessionConfig) -> Self {
            let feed = ManualFeed::new();
            let indicator = RecordingIndicator::default();
            let (tx, events) = channel();
            let controller = SessionController::new(
                config,
                Box::new(ManualConnector::new(feed.clone())),
                Box::new(indicator.clone()),
                tx,
            )
            .unwrap();
            Self {
                controller,
                feed,
                indicator,
                events,
                t0: Instant::now(),
                clock_ms: 0,
            }
        }
        fn new() -> Self {
            Self::with_config(SessionConfig::default())
        }
        fn now(&self) -> Instant {
            self.t0 + Duration::from_millis(self.clock_ms)
        }
        fn advance(&mut self, ms: u64) {
            self.clock_ms += ms;
            let now = self.now();
            self.controller.tick(now);
        }
        fn drain(&self) -> Vec<SessionEvent> {
            self.events.try_iter().collect()
        }
        fn push(&self, reading: BandPowerReading) {
            assert!(self.feed.push_band_power(reading));
        }
        /// Connect, sit through relax, confirm placement: phase is buffering.
        fn into_buffering(&mut self) {
            let now = self.now();
            self.controller.select_device(0, now);
            self.advance(5_000);
            assert_eq!(self.controller.phase(), SessionPhase::Placement);
            let now = self.now();
            self.controller.placement_complete(now);
            assert_eq!(self.controller.phase(), SessionPhase::Buffering);
        }
        /// Fill the baseline with `reading` at 4 Hz until live.
        fn into_live(&mut self, reading: &BandPowerReading) {
            self.into_buffering();
            for _ in 0..40 {
                self.advance(250);
                self.push(reading.clone());
            }
            self.advance(250);
            assert_eq!(self.controller.phase(), SessionPhase::Live);
        }
    }
    fn flat() -> BandPowerReading {
        BandPowerReading::uniform(0, &[2.0; CHANNELS])
    }
    fn phases(events: &[SessionEvent]) -> Vec<SessionPhase> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::SessionPhase(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
    #[test]
    fn startup_sequence_walks_relax_then_placement() {
        let mut rig = Rig::new();
        let now = rig.now();
        rig.controller.select_device(1, now);
        rig.advance(4_999);
        assert_eq!(rig.controller.phase(), SessionPhase::Relax);
        rig.advance(1);
        assert_eq!(rig.controller.phase(), SessionPhase::Placement);
        let events = rig.drain();
        assert_eq!(events[0], SessionEvent::DeviceConnected("Crown B".into()));
        assert_eq!(phases(&events), vec![SessionPhase::Relax, SessionPhase::Placement]);
    }
    #[test]
    fn unknown_device_reports_error_and_stays_idle() {
        let mut rig = Rig::new();
        let now = rig.now();
        rig.controller.select_device(7, now);
        assert_eq!(rig.controller.phase(), SessionPhase::Idle);
        assert!(!rig.controller.is_connected());
        assert!(matches!(rig.drain().as_slice(), [SessionEvent::DeviceError(_)]));
    }
    #[test]
    fn live_requires_both_count_and_elapsed_time() {
        let mut rig = Rig::new();
        rig.into_buffering();
        // a burst of 40 samples inside one second fills the count only
        for _ in 0..40 {
            rig.push(flat());
        }
        rig.advance(1_000);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        let progress: Vec<f64> = rig
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::BufferProgress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 40);
        assert_eq!(progress[0], 1.0 / 40.0);
        assert_eq!(*progress.last().unwrap(), 1.0);
        // time passing without samples does not advance either
        rig.advance(9_500);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        rig.push(flat());
        rig.advance(0);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
        let events = rig.drain();
        assert!(events.contains(&SessionEvent::BaselineComplete));
        assert_eq!(phases(&events), vec![SessionPhase::Live]);
        assert_eq!(rig.controller.window().unwrap().len(), 40);
    }
    #[test]
    fn elapsed_time_alone_is_not_enough() {
        let mut rig = Rig::new();
        rig.into_buffering();
        for _ in 0..10 {
            rig.advance(1_200);
            rig.push(flat());
        }
        rig.advance(1_200);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
    }
    #[test]
    fn steady_four_hz_stream_goes_live_after_ten_seconds() {
        let mut rig = Rig::new();
        rig.into_live(&flat());
        assert_eq!(rig.feed.band_power_subscriptions(), 2);
        assert!(rig.feed.band_power_active());
        rig.drain();
        rig.push(flat());
        rig.advance(250);
        let events = rig.drain();
        let frame = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::NormalizedData(frame) => Some(frame.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(frame.len(), Band::COUNT);
        assert!(frame.values().all(|v| v.len() == CHANNELS && v.iter().all(|z| *z == 0.0)));
    }
    #[test]
    fn minimum_buffer_display_delays_live() {
        let mut config = SessionConfig::default();
        config.window_seconds = 1.0;
        config.timing.min_buffer_display_ms = 2_000;
        let mut rig = Rig::with_config(config);
        rig.into_buffering();
        for _ in 0..4 {
            rig.advance(250);
            rig.push(flat());
        }
        rig.advance(250);
        // baseline is full after ~1.25 s but the phase holds until 2 s
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        assert!(!rig.drain().contains(&SessionEvent::BaselineComplete));
        assert!(!rig.feed.band_power_active());
        rig.advance(749);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        rig.advance(1);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
        assert!(rig.drain().contains(&SessionEvent::BaselineComplete));
    }
    #[test]
    fn missing_bands_in_baseline_are_zero_filled() {
        let mut rig = Rig::new();
        let partial = BandPowerReading::new(0).with_band(Band::Alpha, vec![3.0; CHANNELS]);
        rig.into_live(&partial);
        let window = rig.controller.window().unwrap();
        assert!(window.snapshot(Band::Gamma, 7).iter().all(|v| *v == 0.0));
        assert!(window.snapshot(Band::Alpha, 0).iter().all(|v| *v == 3.0));
    }
    #[test]
    fn artifact_burst_raises_one_alert() {
        let mut rig = Rig::new();
        let base = |i: usize| {
            let mut reading = flat();
            reading.data.insert("beta".into(), {
                let mut beta = vec![2.0; CHANNELS];
                beta[3] = 10.0 + (i % 5) as f64 * 0.1;
                beta
            });
            reading
        };
        rig.into_buffering();
        for i in 0..40 {
            rig.advance(250);
            rig.push(base(i));
        }
        rig.advance(250);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
        rig.drain();
        let mut spike = base(0);
        spike.data.get_mut("beta").unwrap()[3] = 104.0;
        for _ in 0..8 {
            rig.push(spike.clone());
        }
        rig.advance(250);
        assert!(rig.controller.alert_active());
        assert_eq!(rig.controller.artifacts().get(Band::Beta, 3).streak, 8);
        let alerts = rig
            .drain()
            .iter()
            .filter(|e| **e == SessionEvent::ArtifactAlert)
            .count();
        assert_eq!(alerts, 1);
        rig.push(base(2));
        rig.advance(250);
        assert!(!rig.controller.alert_active());
    }
    #[test]
    fn mood_drives_indicator_only_on_change() {
        let mut config = SessionConfig::default();
        config.mood = MoodConfig {
            valence_window: 8,
            valence_step: 4,
            arousal_window: 4,
            arousal_step: 2,
        };
        let mut rig = Rig::with_config(config);
        // right alpha > left alpha, beta > alpha: happy
        let mut happy = BandPowerReading::uniform(0, &[1.0; CHANNELS]);
        let mut alpha = vec![1.0; CHANNELS];
        alpha[1] = 2.0;
        happy.data.insert("alpha".into(), alpha);
        happy.data.insert("beta".into(), vec![4.0; CHANNELS]);
        rig.into_live(&happy);
        rig.indicator.clear();
        rig.drain();
        for _ in 0..16 {
            rig.push(happy.clone());
        }
        rig.advance(250);
        let moods: Vec<MoodReading> = rig
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Mood(m) => Some(m),
                _ => None,
            })
            .collect();
        // first at 8 samples, then every 4
        assert_eq!(moods.len(), 3);
        assert!(moods.iter().all(|m| m.emotion == Emotion::Happy));
        assert_eq!(rig.indicator.colors(), vec![Rgb::new(255, 255, 0)]);
        assert_eq!(rig.controller.mood().last_emotion, Some(Emotion::Happy));
        assert!(rig.controller.mood().last_valence > 0.0);
    }
    #[test]
    fn mood_colour_follows_emotion_changes() {
        let mut config = SessionConfig::default();
        config.mood = MoodConfig {
            valence_window: 8,
            valence_step: 4,
            arousal_window: 4,
            arousal_step: 2,
        };
        let mut rig = Rig::with_config(config);
        let frontal = |left: f64, right: f64| {
            let mut reading = BandPowerReading::uniform(0, &[1.0; CHANNELS]);
            let mut alpha = vec![1.0; CHANNELS];
            alpha[0] = left;
            alpha[1] = right;
            reading.data.insert("alpha".into(), alpha);
            reading.data.insert("beta".into(), vec![4.0; CHANNELS]);
            reading
        };
        let happy = frontal(1.0, 2.0);
        let angry = frontal(2.0, 1.0);
        let yellow = Rgb::new(255, 255, 0);
        let red = Rgb::new(255, 0, 0);
        rig.into_live(&happy);
        rig.indicator.clear();
        for _ in 0..8 {
            rig.push(happy.clone());
        }
        rig.advance(250);
        assert_eq!(rig.indicator.colors(), vec![yellow]);
        for _ in 0..8 {
            rig.push(angry.clone());
        }
        rig.advance(250);
        assert_eq!(rig.indicator.colors(), vec![yellow, red]);
        assert_eq!(rig.controller.mood().last_emotion, Some(Emotion::Angry));
        // the emotion turns happy again while the colour is overridden
        let purple = Rgb::new(128, 0, 128);
        rig.controller.set_manual_override(purple);
        for _ in 0..8 {
            rig.push(happy.clone());
        }
        rig.advance(250);
        assert_eq!(rig.indicator.colors(), vec![yellow, red, purple]);
        assert_eq!(rig.controller.mood().last_emotion, Some(Emotion::Angry));
        let now = rig.now();
        rig.controller.clear_manual_override(now);
        assert_eq!(rig.indicator.colors(), vec![yellow, red, purple, yellow]);
        assert_eq!(rig.controller.mood().last_emotion, Some(Emotion::Happy));
    }
    #[test]
    fn manual_override_suppresses_mood_and_breathing() {
        let mut config = SessionConfig::default();
        config.mood = MoodConfig {
            valence_window: 4,
            valence_step: 2,
            arousal_window: 2,
            arousal_step: 1,
        };
        let mut rig = Rig::with_config(config);
        rig.into_buffering();
        let purple = Rgb::new(128, 0, 128);
        rig.controller.set_manual_override(purple);
        rig.indicator.clear();
        for _ in 0..40 {
            rig.advance(250);
            rig.push(flat());
        }
        rig.advance(250);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
        rig.drain();
        for _ in 0..8 {
            rig.push(flat());
        }
        rig.advance(250);
        // moods are still published, but neither breathing nor mood colour
        // reaches the indicator
        let moods = rig
            .drain()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Mood(_)))
            .count();
        assert_eq!(moods, 3);
        assert!(rig.indicator.colors().is_empty());
        assert_eq!(rig.controller.mood().last_emotion, None);
        let now = rig.now();
        rig.controller.clear_manual_override(now);
        rig.advance(80);
        assert!(!rig.indicator.colors().is_empty());
    }
    #[test]
    fn breathing_runs_while_buffering() {
        let mut rig = Rig::new();
        rig.into_buffering();
        rig.indicator.clear();
        rig.advance(80);
        rig.advance(80);
        rig.advance(80);
        assert_eq!(rig.indicator.colors().len(), 3);
        rig.controller.clear_all_state();
        assert_eq!(rig.indicator.last(), Some(Rgb::OFF));
        rig.indicator.clear();
        rig.advance(400);
        assert!(rig.indicator.colors().is_empty());
    }
    #[test]
    fn placement_assist_restores_interrupted_phase() {
        let mut rig = Rig::new();
        let now = rig.now();
        rig.controller.select_device(0, now);
        rig.controller.start_placement_assist();
        assert_eq!(rig.controller.phase(), SessionPhase::PlacementAssist);
        // relax expiring during assist becomes the resume target
        rig.advance(5_000);
        assert_eq!(rig.controller.phase(), SessionPhase::PlacementAssist);
        rig.drain();
        // one confirmation restores placement and completes it
        let now = rig.now();
        rig.controller.placement_complete(now);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        assert_eq!(
            phases(&rig.drain()),
            vec![SessionPhase::Placement, SessionPhase::Buffering]
        );
        assert_eq!(rig.feed.band_power_subscriptions(), 1);
        rig.controller.start_placement_assist();
        rig.controller.start_placement_assist();
        let now = rig.now();
        rig.controller.placement_complete(now);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        assert_eq!(rig.feed.band_power_subscriptions(), 1);
    }
    #[test]
    fn placement_assist_during_relax_resumes_relax() {
        let mut rig = Rig::new();
        let now = rig.now();
        rig.controller.select_device(0, now);
        rig.advance(1_000);
        rig.controller.start_placement_assist();
        let now = rig.now();
        rig.controller.placement_complete(now);
        assert_eq!(rig.controller.phase(), SessionPhase::Relax);
        assert_eq!(rig.feed.band_power_subscriptions(), 0);
        rig.advance(4_000);
        assert_eq!(rig.controller.phase(), SessionPhase::Placement);
    }
    #[test]
    fn placement_assist_from_idle_falls_back_to_live_when_nothing_remembered() {
        let mut rig = Rig::new();
        rig.controller.phase = SessionPhase::PlacementAssist;
        let now = rig.now();
        rig.controller.placement_complete(now);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
    }
    #[test]
    fn stream_error_during_buffering_resets_to_idle() {
        let mut rig = Rig::new();
        rig.into_buffering();
        rig.push(flat());
        assert!(rig.feed.fail_band_power("headset offline"));
        rig.advance(250);
        assert_eq!(rig.controller.phase(), SessionPhase::Idle);
        let events = rig.drain();
        assert!(events.contains(&SessionEvent::DeviceError("headset offline".into())));
        assert!(!rig.feed.band_power_active());
        // the device stays connected; a new baseline can be started
        let now = rig.now();
        rig.controller.start_baseline(now);
        assert_eq!(rig.controller.phase(), SessionPhase::Relax);
    }
    #[test]
    fn stream_error_while_live_is_reported_not_fatal() {
        let mut rig = Rig::new();
        rig.into_live(&flat());
        rig.drain();
        assert!(rig.feed.fail_band_power("dropout"));
        rig.advance(250);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
        assert_eq!(rig.drain(), vec![SessionEvent::DeviceError("dropout".into())]);
    }
    #[test]
    fn side_channels_are_forwarded() {
        let mut rig = Rig::new();
        let now = rig.now();
        rig.controller.select_device(0, now);
        rig.drain();
        rig.feed.push_accelerometer(Accelerometer { x: 0.0, y: 0.1, z: 1.0 });
        rig.feed.push_signal_quality(SignalQuality { channels: vec![1.0; CHANNELS] });
        rig.advance(10);
        let events = rig.drain();
        assert!(events.contains(&SessionEvent::Accelerometer(Accelerometer { x: 0.0, y: 0.1, z: 1.0 })));
        assert!(events.contains(&SessionEvent::SignalQuality(vec![1.0; CHANNELS])));
    }
    #[test]
    fn clearing_buffers_twice_equals_once() {
        let mut rig = Rig::new();
        rig.into_live(&flat());
        rig.controller.clear_data_buffers();
        let once = (
            rig.controller.window().is_none(),
            rig.controller.artifacts().clone(),
            rig.controller.alert_active(),
            rig.controller.mood(),
            rig.controller.mood_window.valence.len(),
        );
        rig.controller.clear_data_buffers();
        let twice = (
            rig.controller.window().is_none(),
            rig.controller.artifacts().clone(),
            rig.controller.alert_active(),
            rig.controller.mood(),
            rig.controller.mood_window.valence.len(),
        );
        assert_eq!(once, twice);
        assert_eq!(once.1, ArtifactState::new(CHANNELS));
        assert!(once.0);
        assert_eq!(once.4, 0);
    }
    #[test]
    fn reset_session_rebuffers_without_resubscribing_side_channels() {
        let mut rig = Rig::new();
        rig.into_live(&flat());
        let now = rig.now();
        rig.controller.reset_session(now);
        assert_eq!(rig.controller.phase(), SessionPhase::Buffering);
        assert!(rig.controller.window().is_none());
        assert_eq!(rig.feed.band_power_subscriptions(), 3);
    }
    #[test]
    fn switching_device_drops_rolling_state() {
        let mut rig = Rig::new();
        let reading = |beta3: f64| {
            let mut reading = flat();
            let mut beta = vec![2.0; CHANNELS];
            beta[3] = beta3;
            reading.data.insert("beta".into(), beta);
            reading
        };
        rig.into_buffering();
        for i in 0..40 {
            rig.advance(250);
            rig.push(reading(10.0 + (i % 5) as f64 * 0.1));
        }
        rig.advance(250);
        assert_eq!(rig.controller.phase(), SessionPhase::Live);
        for _ in 0..8 {
            rig.push(reading(500.0));
        }
        rig.advance(250);
        assert!(rig.controller.alert_active());
        let now = rig.now();
        rig.controller.select_device(1, now);
        assert_eq!(rig.controller.phase(), SessionPhase::Relax);
        assert!(rig.controller.window().is_none());
        assert!(!rig.controller.alert_active());
        assert_eq!(rig.controller.artifacts(), &ArtifactState::new(CHANNELS));
        assert_eq!(rig.controller.mood_window.valence.len(), 0);
        assert!(rig.controller.previous_output.is_none());
    }
    #[test]
    fn full_restart_emits_reset_ui() {
        let mut rig = Rig::new();
        rig.into_live(&flat());
        rig.drain();
        rig.controller.clear_all_state();
        assert_eq!(rig.controller.phase(), SessionPhase::Idle);
        assert!(!rig.controller.is_connected());
        let events = rig.drain();
        assert_eq!(events.last(), Some(&SessionEvent::ResetUi));
    }
    #[test]
    fn indicator_failure_is_reported_once() {
        let mut rig = Rig::new();
        rig.into_buffering();
        rig.drain();
        rig.indicator.set_failing(true);
        rig.advance(80);
        rig.advance(80);
        let errors = rig
            .drain()
            .iter()
            .filter(|e| matches!(e, SessionEvent::DeviceError(_)))
            .count();
        assert_eq!(errors, 1);
    }
}
