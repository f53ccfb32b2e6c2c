// In-memory motor backend for running without hardware (and for tests)

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{MotorOutput, Port};

/// Lead writes kept for inspection; older ones are dropped
pub const HISTORY_LEN: usize = 256;

/// Last value written to a motor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorSetpoint {
    OpenLoop(f64),
    Velocity(f64),
}

#[derive(Debug, Default)]
struct SimState {
    followers: HashMap<Port, Vec<Port>>,
    setpoints: HashMap<Port, MotorSetpoint>,
    // Most recent lead writes, oldest first
    history: VecDeque<(Port, MotorSetpoint)>,
}

/// Simulated motor bus.
///
/// Clones share the same state, so a test can keep a handle while the drive
/// owns another one.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotors {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedMotors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current setpoint of a motor, if it was ever written
    pub fn setpoint(&self, port: Port) -> Option<MotorSetpoint> {
        self.lock().setpoints.get(&port).copied()
    }

    /// The last `HISTORY_LEN` lead writes, oldest first
    pub fn history(&self) -> Vec<(Port, MotorSetpoint)> {
        self.lock().history.iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&mut self, lead: Port, setpoint: MotorSetpoint) {
        debug!("Sim motor {} <- {:?}", lead, setpoint);
        let mut state = self.lock();
        let followers = state.followers.get(&lead).cloned().unwrap_or_default();
        state.setpoints.insert(lead, setpoint);
        for id in followers {
            state.setpoints.insert(id, setpoint);
        }
        if state.history.len() == HISTORY_LEN {
            state.history.pop_front();
        }
        state.history.push_back((lead, setpoint));
    }
}

impl MotorOutput for SimulatedMotors {
    fn follow(&mut self, follower: Port, lead: Port) {
        debug!("Sim motor {} follows {}", follower, lead);
        self.lock().followers.entry(lead).or_default().push(follower);
    }

    fn set_open_loop(&mut self, port: Port, duty: f64) {
        self.write(port, MotorSetpoint::OpenLoop(duty));
    }

    fn set_closed_loop_velocity(&mut self, port: Port, velocity: f64) {
        self.write(port, MotorSetpoint::Velocity(velocity));
    }

    fn neutral(&mut self, port: Port) {
        let zero = match self.setpoint(port) {
            Some(MotorSetpoint::Velocity(_)) => MotorSetpoint::Velocity(0.0),
            _ => MotorSetpoint::OpenLoop(0.0),
        };
        self.write(port, zero);
    }
}
