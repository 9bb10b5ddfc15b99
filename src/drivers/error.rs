use thiserror::Error;
#[derive(Debug, Error)]
pub enum SenseError {
    #[error("sampling rate must be greater than zero")]
    InvalidSampleRate,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown channel {0}")]
    UnknownChannel(String),
    #[error("channel count mismatch in band {band}: expected {expected}, got {actual}")]
    ChannelMismatch {
        band: String,
        expected: usize,
        actual: usize,
    },
    #[error("device index {0} is not configured")]
    UnknownDevice(usize),
    #[error("no device connected")]
    NotConnected,
    #[error("indicator write failed: {0}")]
    Indicator(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}
