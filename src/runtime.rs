// 50 Hz control loop with watchdog
// Note: if the command source stalls or dies, the watchdog stops the drive instead of
// replaying the last command forever

use std::time::{Duration, Instant};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ};
use crate::drive::{BasicDrive, MotorCommand};
use crate::messages::{DriveCommand, RuntimeHealth};
use crate::motor::MotorOutput;
use crate::telemetry::Telemetry;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("IO error reading commands: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command reader task failed: {0}")]
    Reader(#[from] tokio::task::JoinError),
}

pub struct Runtime<M, T> {
    drive: BasicDrive<M, T>,
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    cmd_timeout: Duration,
    health: RuntimeHealth,
}

impl<M: MotorOutput, T: Telemetry> Runtime<M, T> {
    pub fn new(drive: BasicDrive<M, T>) -> Self {
        Self::with_timeout(drive, CMD_TIMEOUT)
    }

    pub fn with_timeout(drive: BasicDrive<M, T>, cmd_timeout: Duration) -> Self {
        Self {
            drive,
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            cmd_timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: DriveCommand) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Run one control cycle: drive with the latest fresh command, or stop.
    ///
    /// Returns the computed command, `None` when the drive was stopped.
    pub fn tick(&mut self) -> Option<MotorCommand> {
        let cmd_age = self.cmd_received_at.elapsed();

        let fresh = self.latest_cmd.filter(|_| cmd_age <= self.cmd_timeout);

        if let Some(cmd) = fresh {
            if self.health != RuntimeHealth::Ok {
                info!("Commands fresh, driving");
            }
            self.health = RuntimeHealth::Ok;
            Some(self.apply(cmd))
        } else {
            // Watchdog triggered (or nothing received yet) - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            self.drive.stop();
            None
        }
    }

    fn apply(&mut self, cmd: DriveCommand) -> MotorCommand {
        match cmd {
            DriveCommand::Arcade {
                vertical,
                rotation,
                horizontal,
                powered_inputs,
                speed_mode,
            } => self
                .drive
                .arcade_drive(vertical, rotation, horizontal, powered_inputs, speed_mode),
            DriveCommand::Tank {
                left,
                right,
                horizontal,
                powered_inputs,
                speed_mode,
            } => self
                .drive
                .tank_drive(left, right, horizontal, powered_inputs, speed_mode),
        }
    }

    pub fn into_drive(self) -> BasicDrive<M, T> {
        self.drive
    }
}

/// Parse newline-delimited JSON commands until the input closes
async fn read_commands<R>(
    input: R,
    tx: mpsc::UnboundedSender<DriveCommand>,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DriveCommand>(line) {
            Ok(cmd) => {
                if tx.send(cmd).is_err() {
                    break;
                }
            }
            Err(e) => warn!("Failed to parse command: {}", e),
        }
    }
    Ok(())
}

/// Drive from a JSON-lines command stream at `LOOP_HZ` until it closes.
///
/// The drive is stopped before returning.
pub async fn run<M, T, R>(
    drive: BasicDrive<M, T>,
    input: R,
) -> Result<BasicDrive<M, T>, RuntimeError>
where
    M: MotorOutput,
    T: Telemetry,
    R: tokio::io::AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(read_commands(input, tx));

    let mut runtime = Runtime::new(drive);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        let mut closed = false;
        loop {
            match rx.try_recv() {
                Ok(cmd) => runtime.on_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        // 2. Drive (includes watchdog logic)
        runtime.tick();

        if closed {
            info!("Command stream closed");
            break;
        }
    }

    let mut drive = runtime.into_drive();
    drive.stop();
    reader.await??;
    Ok(drive)
}
