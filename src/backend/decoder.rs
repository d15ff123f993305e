//! Serial line decoding
//!
//! Each line carries one reading as five fields separated by whitespace or
//! commas: `sensor_id timestamp_us ax ay az`.

use crate::error::{ModalError, Result};
use crate::types::Sample;

/// Number of fields in a sample line
pub const FIELD_COUNT: usize = 5;

/// Decoder statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Lines that produced a sample
    pub decoded: u64,
    /// Lines rejected as malformed
    pub rejected: u64,
    /// Blank lines skipped
    pub blank: u64,
}

/// Stateless line parser with counters
#[derive(Debug, Default)]
pub struct LineDecoder {
    stats: DecoderStats,
}

impl LineDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Get counters
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Decode one line; `Ok(None)` for blank lines
    pub fn decode(&mut self, line: &str) -> Result<Option<Sample>> {
        if line.trim().is_empty() {
            self.stats.blank += 1;
            return Ok(None);
        }
        match parse_line(line) {
            Ok(sample) => {
                self.stats.decoded += 1;
                Ok(Some(sample))
            }
            Err(e) => {
                self.stats.rejected += 1;
                Err(e)
            }
        }
    }
}

/// Parse a single `sensor_id timestamp_us ax ay az` line
pub fn parse_line(line: &str) -> Result<Sample> {
    let fields: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != FIELD_COUNT {
        return Err(ModalError::malformed(
            line.trim(),
            format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
        ));
    }

    let sensor_id: u32 = fields[0]
        .parse()
        .map_err(|_| ModalError::malformed(line.trim(), "invalid sensor id"))?;

    let timestamp_us = parse_number(line, fields[1], "timestamp")?;
    if timestamp_us < 0.0 {
        return Err(ModalError::malformed(line.trim(), "negative timestamp"));
    }

    let ax = parse_number(line, fields[2], "x acceleration")?;
    let ay = parse_number(line, fields[3], "y acceleration")?;
    let az = parse_number(line, fields[4], "z acceleration")?;

    Ok(Sample::new(sensor_id, timestamp_us, ax, ay, az))
}

fn parse_number(line: &str, field: &str, what: &str) -> Result<f64> {
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(ModalError::malformed(
            line.trim(),
            format!("non-finite {}", what),
        )),
        Err(_) => Err(ModalError::malformed(line.trim(), format!("invalid {}", what))),
    }
}
