// src/types.rs
use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::drivers::{Accelerometer, Band, MoodReading};
use crate::indicator::Rgb;

// 会话阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Idle,
    Relax,
    Placement,
    PlacementAssist,
    Buffering,
    Live,
}

// 外部控制端发给后台的命令
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum ControlCommand {
    SelectDevice(usize),
    StartBaseline,
    // 重新采集基线 (跳过 relax/placement)
    ResetSession,
    PlacementComplete,
    StartPlacementAssist,
    SetManualColor(Rgb),
    ClearManualColor,
    FullRestart,
    Shutdown,
}

// 后台发给界面的事件 (fire-and-forget)
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionPhase(SessionPhase),
    BufferProgress(f64),
    BaselineComplete,
    NormalizedData(BTreeMap<Band, Vec<f64>>),
    Mood(MoodReading),
    ArtifactAlert,
    DeviceConnected(String),
    DeviceError(String),
    SignalQuality(Vec<f64>),
    Accelerometer(Accelerometer),
    ResetUi,
}
