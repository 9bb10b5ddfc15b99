// src/indicator.rs
// LED 指示灯：串口写入 "r,g,b\n"，以及空闲时的呼吸灯动画
use std::io::Write;
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::drivers::SenseError;
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
/// Sink for colour commands. Implementations do not report back.
pub trait Indicator: Send {
    fn set_color(&mut self, color: Rgb) -> Result<(), SenseError>;
    fn off(&mut self) -> Result<(), SenseError> {
        self.set_color(Rgb::OFF)
    }
}
/// Arduino-style LED driver on a serial port, one `r,g,b` line per command.
pub struct SerialIndicator {
    port: Box<dyn serialport::SerialPort>,
}
impl SerialIndicator {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("failed to open indicator port {path}"))?;
        Ok(Self { port })
    }
}
impl Indicator for SerialIndicator {
    fn set_color(&mut self, color: Rgb) -> Result<(), SenseError> {
        writeln!(self.port, "{},{},{}", color.r, color.g, color.b)?;
        self.port.flush()?;
        Ok(())
    }
}
/// Used when no indicator port is configured.
pub struct NullIndicator;
impl Indicator for NullIndicator {
    fn set_color(&mut self, _color: Rgb) -> Result<(), SenseError> {
        Ok(())
    }
}
/// Idle animation: three phase-shifted sines cycling through the hue wheel.
#[derive(Clone, Debug, Default)]
pub struct Breathing {
    phase: f64,
}
impl Breathing {
    const STEP: f64 = 0.08;
    pub fn next_color(&mut self) -> Rgb {
        self.phase += Self::STEP;
        let component = |offset: f64| (127.0 * ((self.phase + offset).sin() + 1.0)).round() as u8;
        Rgb::new(component(0.0), component(2.0), component(4.0))
    }
}
#[cfg(test)]
pub use recording::RecordingIndicator;
