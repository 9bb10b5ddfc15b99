// src/main.rs
mod config;
mod drivers;
mod engine;
mod indicator;
mod session;
mod types;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{channel, Sender};
use std::thread;
use anyhow::{Context, Result};
use log::{error, info, warn};
use crate::config::SessionConfig;
use crate::drivers::SimulatedConnector;
use crate::indicator::{Indicator, NullIndicator, SerialIndicator};
use crate::session::SessionController;
use crate::types::ControlCommand;
fn open_indicator(config: &SessionConfig) -> Box<dyn Indicator> {
    match config.indicator.port.as_deref() {
        Some(port) => match SerialIndicator::open(port, config.indicator.baud_rate) {
            Ok(indicator) => {
                info!("indicator on {port} @ {} baud", config.indicator.baud_rate);
                Box::new(indicator)
            }
            Err(err) => {
                // 没有指示灯也能继续运行
                warn!("{err:#}; continuing without indicator");
                Box::new(NullIndicator)
            }
        },
        None => Box::new(NullIndicator),
    }
}
// 从 stdin 逐行读取 JSON 命令
fn spawn_command_reader(tx_cmd: Sender<ControlCommand>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ControlCommand>(line) {
                Ok(cmd) => {
                    if tx_cmd.send(cmd).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("ignoring malformed command {line:?}: {err}"),
            }
        }
        tx_cmd.send(ControlCommand::Shutdown).ok();
    });
}
// 入口函数
fn main() -> Result<()> {
    env_logger::init();
    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(Path::new(&path))?,
        None => SessionConfig::default(),
    };
    let indicator = open_indicator(&config);
    let connector = Box::new(SimulatedConnector::new(
        config.channel_count(),
        config.sampling_rate_hz,
    ));
    let auto_select = config.auto_select_device;
    let (tx, rx) = channel();
    let (tx_cmd, rx_cmd) = channel();
    let controller = SessionController::new(config, connector, indicator, tx.clone())
        .context("failed to set up session")?;
    let engine = engine::spawn_thread(controller, tx, rx_cmd);
    if let Some(index) = auto_select {
        tx_cmd.send(ControlCommand::SelectDevice(index)).ok();
    }
    spawn_command_reader(tx_cmd.clone());
    // 事件以 JSON 行输出到 stdout，供外部界面读取
    let stdout = io::stdout();
    for event in rx {
        let line = serde_json::to_string(&event).context("failed to encode event")?;
        let mut out = stdout.lock();
        if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
            error!("stdout closed; stopping");
            break;
        }
    }
    tx_cmd.send(ControlCommand::Shutdown).ok();
    engine
        .join()
        .map_err(|_| anyhow::anyhow!("session engine panicked"))?;
    Ok(())
}
