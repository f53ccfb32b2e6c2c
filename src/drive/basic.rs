// Two-sided drivetrain with in-line wheels (three motors per side)
//
// Turns joystick axes into per-side commands with arcade or tank mixing.

use tracing::debug;

use super::base::{
    DriveBase, DriveConfig, DriveError, MotorCommand, Side, SpeedMode, set_input_to_power,
    threshold,
};
use crate::motor::{MotorOutput, Port};
use crate::telemetry::Telemetry;

pub const TELEMETRY_LEFT: &str = "Output Left";
pub const TELEMETRY_RIGHT: &str = "Output Right";

/// Differential drive built on [`DriveBase`].
///
/// Call exactly one of [`arcade_drive`](Self::arcade_drive) or
/// [`tank_drive`](Self::tank_drive) per control cycle.
pub struct BasicDrive<M, T> {
    base: DriveBase<M>,
    telemetry: T,
}

impl<M: MotorOutput, T: Telemetry> BasicDrive<M, T> {
    /// Create a drive with the default speed-mode scales.
    ///
    /// The first port of each side is the lead, the other two follow it.
    pub fn new(
        left_ports: [Port; 3],
        right_ports: [Port; 3],
        motors: M,
        telemetry: T,
    ) -> Result<Self, DriveError> {
        Self::with_config(left_ports, right_ports, DriveConfig::default(), motors, telemetry)
    }

    /// Create with custom scales and tuning
    pub fn with_config(
        left_ports: [Port; 3],
        right_ports: [Port; 3],
        config: DriveConfig,
        motors: M,
        telemetry: T,
    ) -> Result<Self, DriveError> {
        let base = DriveBase::new(
            Side::from_ports(left_ports),
            Side::from_ports(right_ports),
            config,
            motors,
        )?;
        Ok(Self { base, telemetry })
    }

    pub fn base(&self) -> &DriveBase<M> {
        &self.base
    }

    /// Arcade drive: one axis translates, another rotates.
    ///
    /// # Arguments
    /// * `vertical` - forward/reverse axis
    /// * `rotation` - turning axis
    /// * `horizontal` - strafe axis, ignored (this drivetrain cannot strafe)
    /// * `powered_inputs` - raise inputs to the configured power for finer low-speed control
    /// * `speed_mode` - selects the output scale
    ///
    /// Both sides share one normalizing divisor, so saturated inputs keep the
    /// left/right ratio (and the turn's curvature). Motors are driven through
    /// the closed-loop velocity path.
    pub fn arcade_drive(
        &mut self,
        vertical: f64,
        rotation: f64,
        _horizontal: f64,
        powered_inputs: bool,
        speed_mode: SpeedMode,
    ) -> MotorCommand {
        // Positive stick rotation maps to negative robot rotation
        let mut forward = threshold(vertical);
        let mut turn = -rotation;

        // Rotation is only deadbanded when forward was drift. A rotation inside
        // the deadband passes through whenever forward is outside it (or exactly 0).
        // Tank drive deadbands each axis on its own.
        if forward != vertical {
            turn = threshold(turn);
        }

        if powered_inputs {
            let power = self.base.config().input_power;
            forward = set_input_to_power(forward, power);
            turn = set_input_to_power(turn, power);
        }

        let scale = self.base.select_scale(speed_mode);

        // Divide both sides by the same value when |forward| + |turn| exceeds 1
        let maximum = f64::max(1.0, forward.abs() + turn.abs());
        let left = (-forward + turn) / maximum;
        let right = (forward + turn) / maximum;

        let command = MotorCommand {
            left: scale * left,
            right: scale * right,
        };
        self.publish(command);

        let left_velocity = self.base.velocity_output(left, speed_mode);
        let right_velocity = self.base.velocity_output(right, speed_mode);
        self.base.set_closed_loop_velocity(left_velocity, right_velocity);

        command
    }

    /// Tank drive: each axis drives one side.
    ///
    /// # Arguments
    /// * `left` - left side axis
    /// * `right` - right side axis
    /// * `horizontal` - strafe axis, ignored (this drivetrain cannot strafe)
    /// * `powered_inputs` - raise inputs to the configured power for finer low-speed control
    /// * `speed_mode` - selects the output scale
    ///
    /// Each side is deadbanded and normalized on its own. The right output is
    /// negated relative to the left. Motors are driven open-loop.
    pub fn tank_drive(
        &mut self,
        left: f64,
        right: f64,
        _horizontal: f64,
        powered_inputs: bool,
        speed_mode: SpeedMode,
    ) -> MotorCommand {
        let mut left_velocity = threshold(-left);
        let mut right_velocity = threshold(-right);

        if powered_inputs {
            let power = self.base.config().input_power;
            left_velocity = set_input_to_power(left_velocity, power);
            right_velocity = set_input_to_power(right_velocity, power);
        }

        let scale = self.base.select_scale(speed_mode);

        let left_maximum = f64::max(1.0, left_velocity.abs());
        let right_maximum = f64::max(1.0, right_velocity.abs());

        let command = MotorCommand {
            left: scale * left_velocity / left_maximum,
            right: -scale * right_velocity / right_maximum,
        };
        self.publish(command);

        self.base.set_open_loop(command.left, command.right);

        command
    }

    /// Zero both sides, leaving each motor on its current output path
    pub fn stop(&mut self) {
        debug!("Stopping drive");
        self.base.neutral();
    }

    fn publish(&mut self, command: MotorCommand) {
        self.telemetry.put_number(TELEMETRY_LEFT, command.left);
        self.telemetry.put_number(TELEMETRY_RIGHT, command.right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{MotorSetpoint, SimulatedMotors};
    use assert_float_eq::*;
    use more_asserts::assert_le;

    const NORMAL: f64 = 0.8;

    #[derive(Default)]
    struct Recorder(Vec<(String, f64)>);

    impl Telemetry for Recorder {
        fn put_number(&mut self, key: &str, value: f64) {
            self.0.push((key.to_string(), value));
        }
    }

    fn drive() -> (BasicDrive<SimulatedMotors, Recorder>, SimulatedMotors) {
        let motors = SimulatedMotors::new();
        let drive = BasicDrive::with_config(
            [1, 2, 3],
            [4, 5, 6],
            DriveConfig::with_scales(0.3, NORMAL, 1.0),
            motors.clone(),
            Recorder::default(),
        )
        .unwrap();
        (drive, motors)
    }

    fn velocity(motors: &SimulatedMotors, port: Port) -> f64 {
        match motors.setpoint(port) {
            Some(MotorSetpoint::Velocity(v)) => v,
            other => panic!("motor {} expected a velocity, got {:?}", port, other),
        }
    }

    fn duty(motors: &SimulatedMotors, port: Port) -> f64 {
        match motors.setpoint(port) {
            Some(MotorSetpoint::OpenLoop(d)) => d,
            other => panic!("motor {} expected a duty, got {:?}", port, other),
        }
    }

    #[test]
    fn test_arcade_idle_is_zero() {
        let (mut drive, motors) = drive();
        let command = drive.arcade_drive(0.0, 0.0, 0.0, false, SpeedMode::Normal);
        assert_eq!(command.left, 0.0);
        assert_eq!(command.right, 0.0);
        assert_eq!(velocity(&motors, 1), 0.0);
        assert_eq!(velocity(&motors, 4), 0.0);
    }

    #[test]
    fn test_arcade_full_forward() {
        let (mut drive, motors) = drive();
        let command = drive.arcade_drive(1.0, 0.0, 0.0, false, SpeedMode::Normal);
        assert_float_absolute_eq!(command.left, -NORMAL, 1e-12);
        assert_float_absolute_eq!(command.right, NORMAL, 1e-12);

        // Closed-loop path: scale applied once, in actuator units
        let max_velocity = drive.base().config().max_velocity;
        assert_float_absolute_eq!(velocity(&motors, 1), -NORMAL * max_velocity, 1e-9);
        assert_float_absolute_eq!(velocity(&motors, 4), NORMAL * max_velocity, 1e-9);
        // Followers mirror their lead
        assert_eq!(velocity(&motors, 3), velocity(&motors, 1));
        assert_eq!(velocity(&motors, 6), velocity(&motors, 4));
    }

    #[test]
    fn test_arcade_rotation_sign() {
        let (mut drive, _) = drive();
        // Positive stick rotation turns both sides negative
        let command = drive.arcade_drive(0.0, 1.0, 0.0, false, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, -1.0, 1e-12);
        assert_float_absolute_eq!(command.right, -1.0, 1e-12);
    }

    #[test]
    fn test_arcade_joint_saturation_keeps_ratio() {
        let (mut drive, _) = drive();
        let saturated = drive.arcade_drive(1.0, 0.5, 0.0, false, SpeedMode::Normal);
        let unsaturated = drive.arcade_drive(0.5, 0.25, 0.0, false, SpeedMode::Normal);

        assert_le!(saturated.left.abs(), NORMAL + 1e-12);
        assert_le!(saturated.right.abs(), NORMAL + 1e-12);
        assert_float_absolute_eq!(
            saturated.left / saturated.right,
            unsaturated.left / unsaturated.right,
            1e-9
        );
    }

    #[test]
    fn test_arcade_extreme_inputs_bounded() {
        let (mut drive, _) = drive();
        for &(v, r) in &[(1.0, 1.0), (-1.0, 1.0), (5.0, -3.0), (-2.0, -2.0)] {
            let command = drive.arcade_drive(v, r, 0.0, false, SpeedMode::Normal);
            assert_le!(command.left.abs(), NORMAL + 1e-12);
            assert_le!(command.right.abs(), NORMAL + 1e-12);
        }
    }

    #[test]
    fn test_arcade_drift_rule() {
        let (mut drive, _) = drive();

        // Forward suppressed as drift, so rotation drift is suppressed too
        let command = drive.arcade_drive(0.01, 0.01, 0.0, false, SpeedMode::Fast);
        assert_eq!(command, MotorCommand::default());

        // Forward outside the deadband: rotation drift passes through untouched
        let command = drive.arcade_drive(0.5, 0.01, 0.0, false, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, -0.51, 1e-12);
        assert_float_absolute_eq!(command.right, 0.49, 1e-12);

        // Forward exactly zero is not "changed" by the deadband either
        let command = drive.arcade_drive(0.0, 0.01, 0.0, false, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, -0.01, 1e-12);
        assert_float_absolute_eq!(command.right, -0.01, 1e-12);
    }

    #[test]
    fn test_arcade_powered_inputs() {
        let (mut drive, _) = drive();
        let command = drive.arcade_drive(0.5, 0.0, 0.0, true, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, -0.25, 1e-12);
        assert_float_absolute_eq!(command.right, 0.25, 1e-12);

        // Endpoints are unchanged by the curve
        let command = drive.arcade_drive(-1.0, 0.0, 0.0, true, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, 1.0, 1e-12);
        assert_float_absolute_eq!(command.right, -1.0, 1e-12);
    }

    #[test]
    fn test_tank_powered_inputs() {
        let (mut drive, motors) = drive();
        let command = drive.tank_drive(-0.5, 0.5, 0.0, true, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, 0.25, 1e-12);
        assert_float_absolute_eq!(command.right, 0.25, 1e-12);
        assert_float_absolute_eq!(duty(&motors, 2), 0.25, 1e-12);

        // Without the curve the same axes pass through linearly
        let command = drive.tank_drive(-0.5, 0.5, 0.0, false, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, 0.5, 1e-12);
        assert_float_absolute_eq!(command.right, 0.5, 1e-12);
    }

    #[test]
    fn test_custom_input_power() {
        let motors = SimulatedMotors::new();
        let config = DriveConfig {
            input_power: 3.0,
            ..DriveConfig::with_scales(0.3, NORMAL, 1.0)
        };
        let mut drive =
            BasicDrive::with_config([1, 2, 3], [4, 5, 6], config, motors, Recorder::default())
                .unwrap();

        let command = drive.arcade_drive(0.5, 0.0, 0.0, true, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, -0.125, 1e-12);
        assert_float_absolute_eq!(command.right, 0.125, 1e-12);

        // An odd power keeps the sign on its own
        let command = drive.arcade_drive(-0.5, 0.0, 0.0, true, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, 0.125, 1e-12);
        assert_float_absolute_eq!(command.right, -0.125, 1e-12);

        let command = drive.tank_drive(-0.5, 0.0, 0.0, true, SpeedMode::Fast);
        assert_float_absolute_eq!(command.left, 0.125, 1e-12);
    }

    #[test]
    fn test_horizontal_ignored() {
        let (mut drive, _) = drive();
        let without = drive.arcade_drive(0.4, 0.3, 0.0, false, SpeedMode::Normal);
        let with = drive.arcade_drive(0.4, 0.3, 0.9, false, SpeedMode::Normal);
        assert_eq!(without, with);

        let without = drive.tank_drive(0.4, 0.3, 0.0, false, SpeedMode::Normal);
        let with = drive.tank_drive(0.4, 0.3, -0.9, false, SpeedMode::Normal);
        assert_eq!(without, with);
    }

    #[test]
    fn test_tank_full_forward_sign_asymmetry() {
        let (mut drive, motors) = drive();
        let command = drive.tank_drive(1.0, 1.0, 0.0, false, SpeedMode::Normal);
        assert_float_absolute_eq!(command.left, -NORMAL, 1e-12);
        assert_float_absolute_eq!(command.right, NORMAL, 1e-12);

        // Open-loop path, followers included
        for port in [1, 2, 3] {
            assert_float_absolute_eq!(duty(&motors, port), -NORMAL, 1e-12);
        }
        for port in [4, 5, 6] {
            assert_float_absolute_eq!(duty(&motors, port), NORMAL, 1e-12);
        }
    }

    #[test]
    fn test_tank_sides_independent() {
        let (mut drive, _) = drive();
        let reference = drive.tank_drive(0.3, -0.6, 0.0, true, SpeedMode::Normal);
        for left in [-1.0, -0.4, 0.0, 0.01, 0.7, 3.0] {
            let command = drive.tank_drive(left, -0.6, 0.0, true, SpeedMode::Normal);
            assert_eq!(command.right, reference.right);
        }
        for right in [-1.0, -0.4, 0.0, 0.01, 0.7, 3.0] {
            let command = drive.tank_drive(0.3, right, 0.0, true, SpeedMode::Normal);
            assert_eq!(command.left, reference.left);
        }
    }

    #[test]
    fn test_tank_deadband_and_saturation() {
        let (mut drive, _) = drive();
        let command = drive.tank_drive(0.015, -0.015, 0.0, false, SpeedMode::Fast);
        assert_eq!(command.left, 0.0);
        assert_eq!(command.right, 0.0);

        let command = drive.tank_drive(-4.0, 2.0, 0.0, false, SpeedMode::Slow);
        assert_float_absolute_eq!(command.left, 0.3, 1e-12);
        assert_float_absolute_eq!(command.right, 0.3, 1e-12);
    }

    #[test]
    fn test_speed_modes_scale_output() {
        let (mut drive, _) = drive();
        for (mode, scale) in [
            (SpeedMode::Slow, 0.3),
            (SpeedMode::Normal, NORMAL),
            (SpeedMode::Fast, 1.0),
        ] {
            let command = drive.tank_drive(-1.0, 0.0, 0.0, false, mode);
            assert_float_absolute_eq!(command.left, scale, 1e-12);
            assert_eq!(drive.base().velocity_multiplier(), scale);
        }
    }

    #[test]
    fn test_telemetry_published() {
        let (mut drive, _) = drive();
        let command = drive.arcade_drive(0.6, -0.2, 0.0, false, SpeedMode::Normal);
        assert_eq!(
            drive.telemetry.0,
            vec![
                (TELEMETRY_LEFT.to_string(), command.left),
                (TELEMETRY_RIGHT.to_string(), command.right),
            ]
        );
    }

    #[test]
    fn test_stop_after_arcade_zeroes_velocity() {
        let (mut drive, motors) = drive();
        drive.arcade_drive(1.0, 0.0, 0.0, false, SpeedMode::Fast);
        drive.stop();
        // Stopping must not flip the motors to the open-loop path
        for port in 1..=6 {
            assert_eq!(motors.setpoint(port), Some(MotorSetpoint::Velocity(0.0)));
        }
    }

    #[test]
    fn test_stop_after_tank_zeroes_duty() {
        let (mut drive, motors) = drive();
        drive.tank_drive(0.6, -0.6, 0.0, false, SpeedMode::Fast);
        drive.stop();
        for port in 1..=6 {
            assert_eq!(motors.setpoint(port), Some(MotorSetpoint::OpenLoop(0.0)));
        }
    }

    #[test]
    fn test_stop_before_any_command() {
        let (mut drive, motors) = drive();
        drive.stop();
        for port in 1..=6 {
            assert_eq!(motors.setpoint(port), Some(MotorSetpoint::OpenLoop(0.0)));
        }
    }
}
