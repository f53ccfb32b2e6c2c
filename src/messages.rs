// Message types for the command stream

use serde::{Deserialize, Serialize};

use crate::drive::SpeedMode;

// Command from teleop/scripts -> runtime, one JSON object per line
// e.g. {"mode":"arcade","vertical":0.5,"rotation":0.1,"speed_mode":"fast"}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DriveCommand {
    Arcade {
        vertical: f64,
        rotation: f64,
        #[serde(default)]
        horizontal: f64,
        #[serde(default)]
        powered_inputs: bool,
        #[serde(default)]
        speed_mode: SpeedMode,
    },
    Tank {
        left: f64,
        right: f64,
        #[serde(default)]
        horizontal: f64,
        #[serde(default)]
        powered_inputs: bool,
        #[serde(default)]
        speed_mode: SpeedMode,
    },
}

/// Health status reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
