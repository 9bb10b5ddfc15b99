// src/engine.rs
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{info, warn};
use crate::session::SessionController;
use crate::types::*;

// 每轮循环的休眠时间 (远小于呼吸灯 80ms 的节拍)
const LOOP_SLEEP: Duration = Duration::from_millis(10);

/// Runs the controller on its own thread until `Shutdown` arrives or the
/// command channel closes. Commands, stream items and timers are all handled
/// on this one thread, so no two handlers ever run at once.
pub fn spawn_thread(
    mut controller: SessionController,
    tx: Sender<SessionEvent>,
    rx_cmd: Receiver<ControlCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("session engine ready");
        tx.send(SessionEvent::SessionPhase(controller.phase())).ok();
        loop {
            // ============================================================
            // 1. 消息处理 (处理控制端发来的命令)
            // ============================================================
            for _ in 0..10 {
                match rx_cmd.try_recv() {
                    Ok(ControlCommand::Shutdown) => {
                        info!("session engine shutting down");
                        controller.clear_all_state();
                        return;
                    }
                    Ok(cmd) => handle_command(&mut controller, cmd, Instant::now()),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        warn!("control channel closed; stopping engine");
                        controller.clear_all_state();
                        return;
                    }
                }
            }

            // ============================================================
            // 2. 数据流 + 定时器
            // ============================================================
            controller.tick(Instant::now());
            thread::sleep(LOOP_SLEEP);
        }
    })
}

pub fn handle_command(controller: &mut SessionController, cmd: ControlCommand, now: Instant) {
    match cmd {
        ControlCommand::SelectDevice(index) => controller.select_device(index, now),
        ControlCommand::StartBaseline => controller.start_baseline(now),
        ControlCommand::ResetSession => controller.reset_session(now),
        ControlCommand::PlacementComplete => controller.placement_complete(now),
        ControlCommand::StartPlacementAssist => controller.start_placement_assist(),
        ControlCommand::SetManualColor(color) => controller.set_manual_override(color),
        ControlCommand::ClearManualColor => controller.clear_manual_override(now),
        ControlCommand::FullRestart => controller.clear_all_state(),
        // handled by the engine loop itself
        ControlCommand::Shutdown => {}
    }
}
