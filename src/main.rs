use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sing_drive::config::{
    DEFAULT_FAST_SCALE, DEFAULT_NORMAL_SCALE, DEFAULT_SLOW_SCALE, LEFT_MOTOR_IDS, MOTOR_PORT,
    RIGHT_MOTOR_IDS,
};
use sing_drive::drive::{BasicDrive, DriveConfig};
use sing_drive::motor::{FeetechMotors, MotorOutput, SimulatedMotors};
use sing_drive::telemetry::{JsonTelemetry, Telemetry, TracingTelemetry};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TelemetryFormat {
    /// Debug events on the `telemetry` log target
    Log,
    /// JSON lines on stdout
    Json,
}

/// Drive a two-sided robot base from JSON-lines commands on stdin
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Serial port of the Feetech motor bus
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    /// Left motor IDs, lead first
    #[arg(long, num_args = 3, default_values_t = LEFT_MOTOR_IDS)]
    left: Vec<u8>,

    /// Right motor IDs, lead first
    #[arg(long, num_args = 3, default_values_t = RIGHT_MOTOR_IDS)]
    right: Vec<u8>,

    #[arg(long, default_value_t = DEFAULT_SLOW_SCALE)]
    slow: f64,

    #[arg(long, default_value_t = DEFAULT_NORMAL_SCALE)]
    normal: f64,

    #[arg(long, default_value_t = DEFAULT_FAST_SCALE)]
    fast: f64,

    /// Run against simulated motors instead of the serial bus
    #[arg(long)]
    simulate: bool,

    #[arg(long, value_enum, default_value_t = TelemetryFormat::Log)]
    telemetry: TelemetryFormat,
}

fn side(ids: &[u8]) -> Result<[u8; 3], String> {
    ids.try_into()
        .map_err(|_| format!("expected 3 motor IDs, got {}", ids.len()))
}

async fn start(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let left = side(&args.left)?;
    let right = side(&args.right)?;

    let motors: Box<dyn MotorOutput> = if args.simulate {
        info!("Using simulated motors");
        Box::new(SimulatedMotors::new())
    } else {
        let mut motors = FeetechMotors::open(&args.port)?;
        let ids: Vec<u8> = left.iter().chain(&right).copied().collect();
        motors.initialize(&ids)?;
        Box::new(motors)
    };

    let telemetry: Box<dyn Telemetry> = match args.telemetry {
        TelemetryFormat::Log => Box::new(TracingTelemetry),
        TelemetryFormat::Json => Box::new(JsonTelemetry::new(std::io::stdout())),
    };

    let config = DriveConfig::with_scales(args.slow, args.normal, args.fast);
    let drive = BasicDrive::with_config(left, right, config, motors, telemetry)?;

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    sing_drive::runtime::run(drive, input).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug); stderr keeps stdout for telemetry
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init(); // installs the subscriber globally

    if let Err(e) = start(Args::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
