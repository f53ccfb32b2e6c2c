// Motor output layer for the drivetrain
//
// Provides:
// - The MotorOutput capability trait (open-loop duty, closed-loop velocity, following)
// - Feetech STS3215 serial protocol implementation
// - A Feetech-backed MotorOutput and an in-memory simulated one

mod driver;
pub mod feetech;
mod sim;

pub use driver::{FeetechMotors, MAX_RAW, PWM_FULL_SCALE};
pub use feetech::{FeetechBus, FeetechError};
pub use sim::{HISTORY_LEN, MotorSetpoint, SimulatedMotors};

/// Bus address of a single motor
pub type Port = u8;

/// Actuator capability used by the drive math.
///
/// Writes are fire-and-forget: implementations report their own failures
/// and never hand them back to the caller.
pub trait MotorOutput {
    /// Make `follower` mirror every command sent to `lead` from now on.
    fn follow(&mut self, follower: Port, lead: Port);

    /// Open-loop duty cycle in [-1, 1]
    fn set_open_loop(&mut self, port: Port, duty: f64);

    /// Closed-loop velocity target in actuator units
    fn set_closed_loop_velocity(&mut self, port: Port, velocity: f64);

    /// Zero the goal of `port` and its followers in whatever mode each one is in.
    ///
    /// Never changes a motor's operating mode, so it is safe to use for stopping.
    fn neutral(&mut self, port: Port);
}

impl<M: MotorOutput + ?Sized> MotorOutput for Box<M> {
    fn follow(&mut self, follower: Port, lead: Port) {
        (**self).follow(follower, lead)
    }

    fn set_open_loop(&mut self, port: Port, duty: f64) {
        (**self).set_open_loop(port, duty)
    }

    fn set_closed_loop_velocity(&mut self, port: Port, velocity: f64) {
        (**self).set_closed_loop_velocity(port, velocity)
    }

    fn neutral(&mut self, port: Port) {
        (**self).neutral(port)
    }
}
