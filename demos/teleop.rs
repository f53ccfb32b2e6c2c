// Keyboard teleop: prints drive commands as JSON lines on stdout at ~50Hz
//
// Usage: cargo run --example teleop | cargo run -- --simulate
//
// Arcade: W/S forward/back, A/D turn
// Tank:   W/S left side, I/K right side
// T toggle arcade/tank, 1/2/3 slow/normal/fast, P powered inputs, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use sing_drive::drive::SpeedMode;
use sing_drive::messages::DriveCommand;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::info;

const INPUT_TIMEOUT_MS: u64 = 100; // Release the sticks after this much time with no input

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(io::stderr)
        .init();

    info!("Controls: WASD/IK=drive, T=arcade/tank, 1/2/3=speed, P=powered, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&mut io::stdout().lock());
    disable_raw_mode()?;

    result
}

fn run_teleop(out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    let mut tank = false;
    let mut speed_mode = SpeedMode::Normal;
    let mut powered_inputs = false;

    // Persistent stick state
    let mut first = 0.0; // arcade vertical / tank left
    let mut second = 0.0; // arcade rotation / tank right
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        first = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        first = -1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed && !tank => {
                        second = -1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed && !tank => {
                        second = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('i') if pressed && tank => {
                        second = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('k') if pressed && tank => {
                        second = -1.0;
                        last_movement_input = Instant::now();
                    }

                    KeyCode::Char('t') if pressed => {
                        tank = !tank;
                        info!("Mode: {}", if tank { "tank" } else { "arcade" });
                    }
                    KeyCode::Char('1') if pressed => speed_mode = SpeedMode::Slow,
                    KeyCode::Char('2') if pressed => speed_mode = SpeedMode::Normal,
                    KeyCode::Char('3') if pressed => speed_mode = SpeedMode::Fast,
                    KeyCode::Char('p') if pressed => {
                        powered_inputs = !powered_inputs;
                        info!("Powered inputs: {}", powered_inputs);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            first = 0.0;
            second = 0.0;
        }

        let cmd = if tank {
            DriveCommand::Tank {
                left: first,
                right: second,
                horizontal: 0.0,
                powered_inputs,
                speed_mode,
            }
        } else {
            DriveCommand::Arcade {
                vertical: first,
                rotation: second,
                horizontal: 0.0,
                powered_inputs,
                speed_mode,
            }
        };
        serde_json::to_writer(&mut *out, &cmd)?;
        writeln!(out)?;
        out.flush()?;
    }

    Ok(())
}
