//! Mock Accelerometer Source for Testing
//!
//! Generates serial-format sample lines for one or more sensors without
//! hardware attached. Each sensor sees gravity on Z plus the configured
//! signal pattern on all three axes.
//!
//! # Data Patterns
//!
//! - [`MockPattern::Quiet`] - Gravity only
//! - [`MockPattern::Tones`] - Sum of steady sinusoids
//! - [`MockPattern::Impacts`] - Exponentially decaying ring-down repeated periodically
//!
//! # Example
//!
//! ```ignore
//! use modal_rs::backend::mock_source::{MockPattern, MockSource};
//!
//! let source = MockSource::new(1000.0)
//!     .with_sensors(&[1, 2])
//!     .with_pattern(MockPattern::Tones(vec![(50.0, 0.2), (120.0, 0.1)]))
//!     .with_limit(5096);
//! ```

use std::f64::consts::PI;
use std::io;
use std::time::{Duration, Instant};

use super::source::LineSource;

/// Raw reading of the gravity axis at rest (g)
const GRAVITY_G: f64 = 1.0;

/// Pattern for generating mock data
#[derive(Debug, Clone, PartialEq)]
pub enum MockPattern {
    /// Gravity only
    Quiet,
    /// Steady sinusoids as `(frequency Hz, amplitude g)`
    Tones(Vec<(f64, f64)>),
    /// Ring-down at `frequency` with initial `amplitude`, decaying with time
    /// constant `decay_s`, restarted every `period_s`
    Impacts {
        frequency: f64,
        amplitude: f64,
        decay_s: f64,
        period_s: f64,
    },
}

impl MockPattern {
    /// Signal value at time `t` (s)
    pub fn value_at(&self, t: f64) -> f64 {
        match self {
            MockPattern::Quiet => 0.0,
            MockPattern::Tones(tones) => tones
                .iter()
                .map(|&(f, a)| a * (2.0 * PI * f * t).sin())
                .sum(),
            MockPattern::Impacts {
                frequency,
                amplitude,
                decay_s,
                period_s,
            } => {
                let local = if *period_s > 0.0 { t % period_s } else { t };
                amplitude * (-local / decay_s.max(1e-6)).exp() * (2.0 * PI * frequency * local).cos()
            }
        }
    }
}

/// Synthetic sample line generator
#[derive(Debug, Clone)]
pub struct MockSource {
    sample_rate_hz: f64,
    sensors: Vec<u32>,
    pattern: MockPattern,
    limit: Option<u64>,
    realtime: bool,
    // Per-sensor sample index of the next line
    index: u64,
    // Position within `sensors` for the current index
    cursor: usize,
    started: Option<Instant>,
}

impl MockSource {
    /// Create a generator at the given per-sensor sample rate
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1.0),
            sensors: vec![1],
            pattern: MockPattern::Quiet,
            limit: None,
            realtime: false,
            index: 0,
            cursor: 0,
            started: None,
        }
    }

    /// Set the sensor IDs, interleaved in this order
    pub fn with_sensors(mut self, sensors: &[u32]) -> Self {
        if !sensors.is_empty() {
            self.sensors = sensors.to_vec();
        }
        self
    }

    /// Set the signal pattern
    pub fn with_pattern(mut self, pattern: MockPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Stop after this many samples per sensor
    pub fn with_limit(mut self, samples_per_sensor: u64) -> Self {
        self.limit = Some(samples_per_sensor);
        self
    }

    /// Pace output to the sample rate
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Format the line for `sensor` at sample `index`
    pub fn line_at(&self, sensor: u32, index: u64) -> String {
        let t = index as f64 / self.sample_rate_hz;
        let timestamp_us = (t * 1e6).round() as u64;
        let signal = self.pattern.value_at(t);
        // Sensors differ slightly in gain so axes are not identical across IDs
        let gain = 1.0 + 0.05 * (sensor % 7) as f64;
        format!(
            "{} {} {:.6} {:.6} {:.6}",
            sensor,
            timestamp_us,
            signal * gain,
            0.5 * signal * gain,
            GRAVITY_G + 0.25 * signal * gain
        )
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + Duration::from_secs_f64(self.index as f64 / self.sample_rate_hz);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl LineSource for MockSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return Ok(None);
        }
        if self.realtime && self.cursor == 0 {
            self.pace();
        }

        let line = self.line_at(self.sensors[self.cursor], self.index);
        self.cursor += 1;
        if self.cursor == self.sensors.len() {
            self.cursor = 0;
            self.index += 1;
        }
        Ok(Some(line))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::decoder::parse_line;

    #[test]
    fn test_interleaved_sensors_and_limit() {
        let mut source = MockSource::new(1000.0).with_sensors(&[4, 9]).with_limit(3);
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().unwrap() {
            lines.push(line);
        }
        assert_eq!(lines.len(), 6);

        let samples: Vec<_> = lines.iter().map(|l| parse_line(l).unwrap()).collect();
        assert_eq!(samples[0].sensor_id, 4);
        assert_eq!(samples[1].sensor_id, 9);
        assert_eq!(samples[2].timestamp_us, 1000.0);
        assert_eq!(samples[5].timestamp_us, 2000.0);
    }

    #[test]
    fn test_quiet_reads_one_g() {
        let source = MockSource::new(100.0);
        let s = parse_line(&source.line_at(1, 5)).unwrap();
        assert!((s.magnitude() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_impacts_exceed_threshold_at_start_of_period() {
        let pattern = MockPattern::Impacts {
            frequency: 30.0,
            amplitude: 4.0,
            decay_s: 0.2,
            period_s: 2.0,
        };
        assert!((pattern.value_at(0.0) - 4.0).abs() < 1e-12);
        assert!((pattern.value_at(2.0) - 4.0).abs() < 1e-9);
        assert!(pattern.value_at(1.5).abs() < 0.01);
    }
}
