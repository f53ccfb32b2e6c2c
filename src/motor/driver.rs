// Feetech-backed motor output for the drivetrain
//
// Each lead is written together with its followers in a single sync write,
// switching the group's operating mode when the drive changes output path.
// Stopping never switches modes: every motor is zeroed in the mode it is in.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::feetech::{
    FeetechBus, FeetechError, OperatingMode, PWM_SIGN_BIT, Register, VELOCITY_SIGN_BIT,
};
use super::{MotorOutput, Port};

/// Maximum raw velocity command (safety limit)
pub const MAX_RAW: i16 = 3000;

/// Raw GoalTime value for a full duty cycle in PWM mode
pub const PWM_FULL_SCALE: f64 = 1000.0;

pub struct FeetechMotors {
    bus: FeetechBus,
    followers: HashMap<Port, Vec<Port>>,
    modes: HashMap<Port, OperatingMode>,
}

impl FeetechMotors {
    /// Connect to the motor bus on the specified serial port
    pub fn open(port: &str) -> Result<Self, FeetechError> {
        info!("Opening motor bus on {}", port);
        let bus = FeetechBus::open(port)?;
        Ok(Self {
            bus,
            followers: HashMap::new(),
            modes: HashMap::new(),
        })
    }

    /// Initialize the motors for velocity control
    ///
    /// This must be called before sending commands.
    /// It disables torque, sets velocity mode, and re-enables torque.
    pub fn initialize(&mut self, ids: &[Port]) -> Result<(), FeetechError> {
        info!("Initializing motors {:?} for velocity control", ids);

        for &id in ids {
            if !self.bus.ping(id)? {
                warn!("Motor {} not responding to ping", id);
                return Err(FeetechError::Timeout { id });
            }
            debug!("Motor {} responding", id);
        }

        for &id in ids {
            self.set_mode(id, OperatingMode::Velocity)?;
        }

        info!("Motors initialized successfully");
        Ok(())
    }

    fn set_mode(&mut self, id: Port, mode: OperatingMode) -> Result<(), FeetechError> {
        // Unknown until the switch completes
        self.modes.remove(&id);
        // Mode changes are only accepted with torque off
        self.bus.set_torque(id, false)?;
        self.bus.set_operating_mode(id, mode)?;
        self.bus.set_torque(id, true)?;
        self.modes.insert(id, mode);
        Ok(())
    }

    fn group(&self, lead: Port) -> Vec<Port> {
        let mut ids = vec![lead];
        if let Some(followers) = self.followers.get(&lead) {
            ids.extend(followers);
        }
        ids
    }

    /// Write `value` to the lead and its followers in the given mode.
    ///
    /// Motors that fail to switch mode are zeroed instead of keeping their old goal.
    fn write_group(
        &mut self,
        lead: Port,
        mode: OperatingMode,
        register: Register,
        sign_bit: u8,
        value: i16,
    ) -> Result<(), FeetechError> {
        let mut switched = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for id in self.group(lead) {
            if self.modes.get(&id) == Some(&mode) {
                switched.push(id);
                continue;
            }
            debug!("Switching motor {} to {:?} mode", id, mode);
            match self.set_mode(id, mode) {
                Ok(()) => switched.push(id),
                Err(e) => {
                    warn!("Motor {} did not switch to {:?} mode: {}", id, mode, e);
                    failed.push(id);
                    first_error.get_or_insert(e);
                }
            }
        }

        let data: Vec<(u8, i16)> = switched.iter().map(|&id| (id, value)).collect();
        let written = self.bus.sync_write_signed(register, sign_bit, &data);
        let zeroed = self.write_zeros(&failed);

        match first_error {
            Some(e) => Err(e),
            None => written.and(zeroed),
        }
    }

    /// Zero the goals of `ids` in their current modes, both registers when unknown
    fn write_zeros(&mut self, ids: &[Port]) -> Result<(), FeetechError> {
        let (velocity, pwm) = zero_goals(ids, &self.modes);
        let velocity_written =
            self.bus
                .sync_write_signed(Register::GoalVelocity, VELOCITY_SIGN_BIT, &velocity);
        let pwm_written = self
            .bus
            .sync_write_signed(Register::GoalTime, PWM_SIGN_BIT, &pwm);
        velocity_written.and(pwm_written)
    }

    /// Stop every motor that has been written to
    pub fn stop(&mut self) -> Result<(), FeetechError> {
        info!("Stopping all motors");
        let mut ids: Vec<Port> = self.modes.keys().copied().collect();
        for (&lead, followers) in &self.followers {
            ids.push(lead);
            ids.extend(followers);
        }
        ids.sort_unstable();
        ids.dedup();
        self.write_zeros(&ids)
    }
}

/// Zero writes for `ids` as (GoalVelocity, GoalTime) lists, by current mode
fn zero_goals(
    ids: &[Port],
    modes: &HashMap<Port, OperatingMode>,
) -> (Vec<(u8, i16)>, Vec<(u8, i16)>) {
    let mut velocity = Vec::new();
    let mut pwm = Vec::new();
    for &id in ids {
        match modes.get(&id) {
            Some(OperatingMode::Velocity) => velocity.push((id, 0)),
            Some(OperatingMode::Pwm) => pwm.push((id, 0)),
            None => {
                velocity.push((id, 0));
                pwm.push((id, 0));
            }
        }
    }
    (velocity, pwm)
}

/// Actuator velocity units to a clamped raw GoalVelocity
fn velocity_to_raw(velocity: f64) -> i16 {
    velocity.round().clamp(-(MAX_RAW as f64), MAX_RAW as f64) as i16
}

/// Duty cycle in [-1, 1] to a raw PWM value
fn duty_to_raw(duty: f64) -> i16 {
    (duty.clamp(-1.0, 1.0) * PWM_FULL_SCALE).round() as i16
}

impl MotorOutput for FeetechMotors {
    fn follow(&mut self, follower: Port, lead: Port) {
        debug!("Motor {} follows {}", follower, lead);
        self.followers.entry(lead).or_default().push(follower);
    }

    fn set_open_loop(&mut self, port: Port, duty: f64) {
        let raw = duty_to_raw(duty);
        if let Err(e) = self.write_group(
            port,
            OperatingMode::Pwm,
            Register::GoalTime,
            PWM_SIGN_BIT,
            raw,
        ) {
            warn!("Open-loop write to motor {} failed: {}", port, e);
        }
    }

    fn set_closed_loop_velocity(&mut self, port: Port, velocity: f64) {
        let raw = velocity_to_raw(velocity);
        if let Err(e) = self.write_group(
            port,
            OperatingMode::Velocity,
            Register::GoalVelocity,
            VELOCITY_SIGN_BIT,
            raw,
        ) {
            warn!("Velocity write to motor {} failed: {}", port, e);
        }
    }

    fn neutral(&mut self, port: Port) {
        let ids = self.group(port);
        debug!("Zeroing motors {:?} in their current modes", ids);
        if let Err(e) = self.write_zeros(&ids) {
            warn!("Neutral write to motor {} failed: {}", port, e);
        }
    }
}

impl Drop for FeetechMotors {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
