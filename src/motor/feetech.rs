// Feetech STS3215 serial protocol, the subset the drivetrain needs
//
// Instruction packet: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Status packet:      [0xFF, 0xFF, ID, Length, Error, Params..., Checksum]
// Length counts everything after itself.

use serialport::{self, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::debug;

/// STS3215 factory baudrate
pub const BAUDRATE: u32 = 1_000_000;

/// How long a status packet may take to arrive
const READ_TIMEOUT: Duration = Duration::from_millis(100);

const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Addressed by sync writes; broadcast packets get no status reply
const BROADCAST_ID: u8 = 0xFE;

/// Direction bit of GoalVelocity
pub const VELOCITY_SIGN_BIT: u8 = 15;
/// Direction bit of GoalTime when used as a PWM duty
pub const PWM_SIGN_BIT: u8 = 10;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Write = 0x03,
    SyncWrite = 0x83,
}

/// RAM registers used for driving
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33, // 1 byte
    TorqueEnable = 40,  // 1 byte: 0=off, 1=on
    GoalTime = 44,      // 2 bytes, duty in PWM mode (+-1000, sign bit 10)
    GoalVelocity = 46,  // 2 bytes, velocity mode (sign bit 15)
    Lock = 55,          // 1 byte: 0=unlocked, 1=locked
}

/// Operating modes the drive switches between
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Velocity = 1,
    Pwm = 2,
}

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Cannot open motor bus: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Motor bus I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed status from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Bad checksum in status from motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} reported error flags 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Motor {id} did not answer")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Serial connection to a chain of Feetech motors
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str) -> Result<Self> {
        debug!("Opening {} at {} baud", port_name, BAUDRATE);
        let port = serialport::new(port_name, BAUDRATE)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }

    fn send(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<()> {
        self.port.write_all(&packet(id, instruction, params))?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one status packet from `id` and return its parameters
    fn receive(&mut self, id: u8) -> Result<Vec<u8>> {
        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => FeetechError::Timeout { id },
            _ => FeetechError::Io(e),
        })?;

        let mut frame = head.to_vec();
        frame.resize(4 + head[3] as usize, 0);
        self.port.read_exact(&mut frame[4..])?;

        status_params(id, &frame).map(<[u8]>::to_vec)
    }

    /// `false` when the motor stays silent
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        self.send(id, Instruction::Ping, &[])?;
        match self.receive(id) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Acknowledged single-byte register write
    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Motor {} {:?} <- {}", id, register, value);
        self.send(id, Instruction::Write, &[register as u8, value])?;
        self.receive(id).map(drop)
    }

    /// Same two-byte register on several motors in one broadcast packet.
    ///
    /// Values are signed and sent as sign-magnitude with the direction flag at `sign_bit`.
    pub fn sync_write_signed(
        &mut self,
        register: Register,
        sign_bit: u8,
        data: &[(u8, i16)],
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        debug!("Sync write {:?} to {} motors", register, data.len());
        self.send(
            BROADCAST_ID,
            Instruction::SyncWrite,
            &sync_write_params(register, sign_bit, data),
        )
    }

    /// Torque and the EEPROM lock move together: mode changes need both off
    pub fn set_torque(&mut self, id: u8, enabled: bool) -> Result<()> {
        let value = u8::from(enabled);
        self.write_u8(id, Register::TorqueEnable, value)?;
        self.write_u8(id, Register::Lock, value)
    }

    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }
}

/// Inverted low byte of the sum over ID, length and body
fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

fn packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(params.len() + 6);
    packet.extend_from_slice(&HEADER);
    // instruction + params + checksum
    packet.extend_from_slice(&[id, params.len() as u8 + 2, instruction as u8]);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

/// Validate a whole status frame from `id` and borrow its parameters
fn status_params(id: u8, frame: &[u8]) -> Result<&[u8]> {
    let malformed = |reason: String| FeetechError::InvalidResponse { id, reason };

    if frame.len() < 6 {
        return Err(malformed(format!("{} bytes is too short", frame.len())));
    }
    if frame[..2] != HEADER {
        return Err(malformed(format!("header {:02X?}", &frame[..2])));
    }
    if frame[2] != id {
        return Err(malformed(format!("answer came from motor {}", frame[2])));
    }
    if frame.len() != 4 + frame[3] as usize {
        return Err(malformed(format!("length byte {} does not match", frame[3])));
    }

    let (body, sum) = frame.split_at(frame.len() - 1);
    if checksum(&body[2..]) != sum[0] {
        return Err(FeetechError::ChecksumMismatch { id });
    }
    match body[4] {
        0 => Ok(&body[5..]),
        status => Err(FeetechError::MotorError { id, status }),
    }
}

/// [register, 2, id1, lo1, hi1, id2, lo2, hi2, ...]
fn sync_write_params(register: Register, sign_bit: u8, data: &[(u8, i16)]) -> Vec<u8> {
    let mut params = vec![register as u8, 2];
    for &(id, value) in data {
        params.push(id);
        params.extend_from_slice(&encode_sign_magnitude(value, sign_bit).to_le_bytes());
    }
    params
}

/// Magnitude in the bits below `sign_bit`, direction flag at `sign_bit`
fn encode_sign_magnitude(value: i16, sign_bit: u8) -> u16 {
    let magnitude = value.unsigned_abs() & ((1u16 << sign_bit) - 1);
    if value < 0 {
        magnitude | (1 << sign_bit)
    } else {
        magnitude
    }
}
