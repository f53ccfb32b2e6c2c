// Shared drivetrain math and motor ownership
//
// Deadband, input power curve, speed-mode scaling and the two output paths
// (open-loop duty cycle, closed-loop velocity) that every mixing algorithm uses.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{
    DEFAULT_FAST_SCALE, DEFAULT_INPUT_POWER, DEFAULT_MAX_VELOCITY, DEFAULT_NORMAL_SCALE,
    DEFAULT_SLOW_SCALE,
};
use crate::motor::{MotorOutput, Port};

/// Axis values with a smaller magnitude are treated as joystick drift
pub const DEADBAND: f64 = 0.02;

/// Discrete speed selector, chosen by the driver every cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    Slow,
    #[default]
    Normal,
    Fast,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} scale {value} is outside (0, 1]")]
    ScaleOutOfRange { name: &'static str, value: f64 },

    #[error("scales must satisfy slow <= normal <= fast, got {slow} / {normal} / {fast}")]
    ScalesOutOfOrder { slow: f64, normal: f64, fast: f64 },

    #[error("input power {0} must be finite and >= 1")]
    InputPower(f64),

    #[error("max velocity {0} must be finite and > 0")]
    MaxVelocity(f64),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriveError {
    #[error("invalid drive config: {0}")]
    Config(#[from] ConfigError),

    #[error("motor port {0} is assigned more than once")]
    DuplicatePort(Port),
}

/// Tuning for a drivetrain. Fixed once the drive is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub slow_scale: f64,
    pub normal_scale: f64,
    pub fast_scale: f64,
    /// Exponent applied when powered inputs are requested
    pub input_power: f64,
    /// Actuator velocity at a full-scale command
    pub max_velocity: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            slow_scale: DEFAULT_SLOW_SCALE,
            normal_scale: DEFAULT_NORMAL_SCALE,
            fast_scale: DEFAULT_FAST_SCALE,
            input_power: DEFAULT_INPUT_POWER,
            max_velocity: DEFAULT_MAX_VELOCITY,
        }
    }
}

impl DriveConfig {
    /// Default config with the three speed-mode scales replaced
    pub fn with_scales(slow: f64, normal: f64, fast: f64) -> Self {
        Self {
            slow_scale: slow,
            normal_scale: normal,
            fast_scale: fast,
            ..Self::default()
        }
    }

    /// Checks `0 < slow <= normal <= fast <= 1`, `input_power >= 1` and `max_velocity > 0`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("slow", self.slow_scale),
            ("normal", self.normal_scale),
            ("fast", self.fast_scale),
        ] {
            // Written so that NaN fails too
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ScaleOutOfRange { name, value });
            }
        }
        if self.slow_scale > self.normal_scale || self.normal_scale > self.fast_scale {
            return Err(ConfigError::ScalesOutOfOrder {
                slow: self.slow_scale,
                normal: self.normal_scale,
                fast: self.fast_scale,
            });
        }
        if !(self.input_power.is_finite() && self.input_power >= 1.0) {
            return Err(ConfigError::InputPower(self.input_power));
        }
        if !(self.max_velocity.is_finite() && self.max_velocity > 0.0) {
            return Err(ConfigError::MaxVelocity(self.max_velocity));
        }
        Ok(())
    }

    pub fn scale(&self, mode: SpeedMode) -> f64 {
        match mode {
            SpeedMode::Slow => self.slow_scale,
            SpeedMode::Normal => self.normal_scale,
            SpeedMode::Fast => self.fast_scale,
        }
    }
}

/// Zero out values inside the deadband, pass everything else through.
pub fn threshold(value: f64) -> f64 {
    if value.abs() < DEADBAND { 0.0 } else { value }
}

/// Sign-preserving power curve: `sign(value) * |value|^exponent`.
///
/// Keeps 0 at 0 and +-1 at +-1 for any exponent.
pub fn set_input_to_power(value: f64, exponent: f64) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    value.abs().powf(exponent).copysign(value)
}

/// Motors on one side of the drivetrain: the lead gets commands, followers mirror it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub lead: Port,
    pub followers: Vec<Port>,
}

impl Side {
    pub fn new(lead: Port, followers: impl Into<Vec<Port>>) -> Self {
        Self {
            lead,
            followers: followers.into(),
        }
    }

    /// Lead first
    pub fn from_ports(ports: [Port; 3]) -> Self {
        let [lead, followers @ ..] = ports;
        Self::new(lead, followers)
    }

    pub fn ports(&self) -> impl Iterator<Item = Port> + '_ {
        std::iter::once(self.lead).chain(self.followers.iter().copied())
    }
}

/// Normalized per-side output of one drive call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MotorCommand {
    pub left: f64,
    pub right: f64,
}

/// Config, active speed scale and the motors of a two-sided drivetrain.
pub struct DriveBase<M> {
    config: DriveConfig,
    velocity_multiplier: f64,
    left: Side,
    right: Side,
    motors: M,
}

impl<M: MotorOutput> DriveBase<M> {
    /// Validate the config and ports, then bind every follower to its lead
    pub fn new(
        left: Side,
        right: Side,
        config: DriveConfig,
        mut motors: M,
    ) -> Result<Self, DriveError> {
        config.validate()?;

        let mut seen = Vec::new();
        for port in left.ports().chain(right.ports()) {
            if seen.contains(&port) {
                return Err(DriveError::DuplicatePort(port));
            }
            seen.push(port);
        }

        for side in [&left, &right] {
            for &follower in &side.followers {
                motors.follow(follower, side.lead);
            }
        }
        debug!("Drive base: left {:?}, right {:?}, {:?}", left, right, config);

        Ok(Self {
            config,
            velocity_multiplier: config.normal_scale,
            left,
            right,
            motors,
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Make the scale for `mode` the active multiplier and return it
    pub fn select_scale(&mut self, mode: SpeedMode) -> f64 {
        self.velocity_multiplier = self.config.scale(mode);
        self.velocity_multiplier
    }

    /// Multiplier set by the last `select_scale`
    pub fn velocity_multiplier(&self) -> f64 {
        self.velocity_multiplier
    }

    /// Unscaled command in [-1, 1] to actuator velocity units for `mode`
    pub fn velocity_output(&self, normalized: f64, mode: SpeedMode) -> f64 {
        self.config.max_velocity * self.config.scale(mode) * normalized
    }

    /// Duty cycle to both lead motors
    pub fn set_open_loop(&mut self, left: f64, right: f64) {
        self.motors.set_open_loop(self.left.lead, left);
        self.motors.set_open_loop(self.right.lead, right);
    }

    /// Velocity targets to both lead motors
    pub fn set_closed_loop_velocity(&mut self, left: f64, right: f64) {
        self.motors.set_closed_loop_velocity(self.left.lead, left);
        self.motors.set_closed_loop_velocity(self.right.lead, right);
    }

    /// Zero both sides without changing their output path
    pub fn neutral(&mut self) {
        self.motors.neutral(self.left.lead);
        self.motors.neutral(self.right.lead);
    }

    pub fn left(&self) -> &Side {
        &self.left
    }

    pub fn right(&self) -> &Side {
        &self.right
    }
}
