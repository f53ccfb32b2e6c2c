// Telemetry sinks for per-side drive outputs

use std::io::Write;

use serde::Serialize;
use tracing::{debug, warn};

/// One-way, best-effort sink for named numeric readings.
pub trait Telemetry {
    fn put_number(&mut self, key: &str, value: f64);
}

impl<T: Telemetry + ?Sized> Telemetry for Box<T> {
    fn put_number(&mut self, key: &str, value: f64) {
        (**self).put_number(key, value)
    }
}

/// Emits readings as `debug` events on the `telemetry` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn put_number(&mut self, key: &str, value: f64) {
        debug!(target: "telemetry", key, value);
    }
}

#[derive(Serialize)]
struct Reading<'a> {
    key: &'a str,
    value: f64,
}

/// Writes one JSON object per reading, newline-delimited
pub struct JsonTelemetry<W: Write> {
    out: W,
}

impl<W: Write> JsonTelemetry<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Telemetry for JsonTelemetry<W> {
    fn put_number(&mut self, key: &str, value: f64) {
        let written = serde_json::to_writer(&mut self.out, &Reading { key, value })
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out));
        if let Err(e) = written {
            warn!("Dropping telemetry reading {}: {}", key, e);
        }
    }
}
