// Differential drive control
//
// - base: deadband, power curve, speed scaling, output paths, motor ownership
// - basic: arcade and tank mixing for a three-motors-per-side drivetrain

pub mod base;
mod basic;

pub use base::{
    ConfigError, DEADBAND, DriveBase, DriveConfig, DriveError, MotorCommand, Side, SpeedMode,
    set_input_to_power, threshold,
};
pub use basic::{BasicDrive, TELEMETRY_LEFT, TELEMETRY_RIGHT};
