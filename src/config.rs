// Loop timing, watchdog, motor wiring and speed defaults
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Motor configuration
// Serial port for Feetech motor controller
pub const MOTOR_PORT: &str = "/dev/ttyACM0";

// Bus IDs per side, lead first (the remaining two follow it)
pub const LEFT_MOTOR_IDS: [u8; 3] = [1, 2, 3];
pub const RIGHT_MOTOR_IDS: [u8; 3] = [4, 5, 6];

// Speed mode scales. Suggested ranges: slow 0.2 - 0.5, normal 0.6 - 1.0, fast 1.0
pub const DEFAULT_SLOW_SCALE: f64 = 0.4;
pub const DEFAULT_NORMAL_SCALE: f64 = 0.8;
pub const DEFAULT_FAST_SCALE: f64 = 1.0;

// Exponent used when powered inputs are requested
pub const DEFAULT_INPUT_POWER: f64 = 2.0;

// Actuator velocity (raw steps/s) reached at a full-scale command
pub const DEFAULT_MAX_VELOCITY: f64 = 3000.0;
