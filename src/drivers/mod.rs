// src/drivers/mod.rs
// 纯计算模块：统计、滑动窗口、伪迹检测、情绪估计，以及数据源抽象
pub mod artifact;
pub mod buffer;
pub mod error;
pub mod mood;
pub mod sample;
pub mod source;
pub mod stats;
// 公开导出这些模块里的结构体，方便外部调用
pub use artifact::{AlertTransition, ArtifactConfig, ArtifactDetector, ArtifactState};
pub use buffer::SlidingWindowStore;
pub use error::SenseError;
pub use mood::{Emotion, MoodConfig, MoodEstimator, MoodReading, MoodState, MoodWindow};
pub use sample::{Band, BandPowerReading, Sample};
pub use source::{
    Accelerometer, BandPowerSource, DeviceConnector, SignalQuality, SimulatedConnector, StreamItem,
    Subscription,
};
#[cfg(test)]
pub use source::{ManualConnector, ManualFeed};
