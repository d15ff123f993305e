//! Core data types for modal-rs
//!
//! This module contains the fundamental data structures used throughout
//! the crate for representing accelerometer samples and per-sensor series.
//!
//! # Main Types
//!
//! - [`Axis`] - One of the three acceleration channels of a sensor
//! - [`Sample`] - A single timestamped tri-axial reading from one sensor
//! - [`SampleRecord`] - An owned batch of samples in arrival order
//! - [`SampleSeries`] - A time-sorted, struct-of-arrays view of one sensor
//!
//! # Ordering
//!
//! Samples are stored in arrival order. A [`SampleSeries`] is always sorted
//! ascending by time; building one from non-monotonic input re-sorts it and
//! logs a warning, since spectral analysis needs an ordered time base.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ModalError;

/// One acceleration channel of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Get all axes in channel order
    pub fn all() -> &'static [Axis] {
        &[Axis::X, Axis::Y, Axis::Z]
    }

    /// Short label ("X", "Y", "Z")
    pub fn label(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }

    /// Column header used in sample CSV files
    pub fn column_name(&self) -> &'static str {
        match self {
            Axis::X => "X Acceleration",
            Axis::Y => "Y Acceleration",
            Axis::Z => "Z Acceleration",
        }
    }

    /// Channel index into `[x, y, z]`
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Axis {
    type Err = ModalError;

    /// Accepts "X", "x" and "X Acceleration" style names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let head = s.trim().split_whitespace().next().unwrap_or("");
        match head {
            "X" | "x" => Ok(Axis::X),
            "Y" | "y" => Ok(Axis::Y),
            "Z" | "z" => Ok(Axis::Z),
            _ => Err(ModalError::malformed(s, "unknown axis")),
        }
    }
}

/// A single tri-axial accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sensor (accelerometer) identifier
    pub sensor_id: u32,
    /// Raw time column value, nominally microseconds
    pub timestamp_us: f64,
    /// X acceleration in raw sensor units
    pub accel_x: f64,
    /// Y acceleration in raw sensor units
    pub accel_y: f64,
    /// Z acceleration in raw sensor units
    pub accel_z: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(sensor_id: u32, timestamp_us: f64, accel_x: f64, accel_y: f64, accel_z: f64) -> Self {
        Self {
            sensor_id,
            timestamp_us,
            accel_x,
            accel_y,
            accel_z,
        }
    }

    /// Value of the given axis
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.accel_x,
            Axis::Y => self.accel_y,
            Axis::Z => self.accel_z,
        }
    }

    /// Vector magnitude `sqrt(x² + y² + z²)`, used for impact detection
    pub fn magnitude(&self) -> f64 {
        (self.accel_x * self.accel_x + self.accel_y * self.accel_y + self.accel_z * self.accel_z)
            .sqrt()
    }

    /// Whether every field is a finite number
    pub fn is_finite(&self) -> bool {
        self.timestamp_us.is_finite()
            && self.accel_x.is_finite()
            && self.accel_y.is_finite()
            && self.accel_z.is_finite()
    }
}

/// An owned batch of samples in arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    samples: Vec<Sample>,
}

impl SampleRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Append a sample
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Remove every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the record is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in arrival order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterate samples in arrival order
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Distinct sensor IDs, ascending
    pub fn sensor_ids(&self) -> Vec<u32> {
        self.samples
            .iter()
            .map(|s| s.sensor_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether the whole record is non-decreasing in time
    pub fn is_time_sorted(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| w[0].timestamp_us <= w[1].timestamp_us)
    }

    /// Time-sorted series of one sensor, or `None` if it has no samples
    pub fn series(&self, sensor_id: u32) -> Option<SampleSeries> {
        let filtered: Vec<Sample> = self
            .samples
            .iter()
            .filter(|s| s.sensor_id == sensor_id)
            .copied()
            .collect();

        if filtered.is_empty() {
            None
        } else {
            Some(SampleSeries::from_samples(sensor_id, filtered))
        }
    }

    /// Keep only samples whose time lies within `[start, end]` (inclusive)
    pub fn retain_time_range(&mut self, start: Option<f64>, end: Option<f64>) {
        self.samples.retain(|s| {
            start.map_or(true, |lo| s.timestamp_us >= lo) && end.map_or(true, |hi| s.timestamp_us <= hi)
        });
    }
}

impl From<Vec<Sample>> for SampleRecord {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl FromIterator<Sample> for SampleRecord {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SampleRecord {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Time-sorted samples of one sensor in struct-of-arrays form
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSeries {
    sensor_id: u32,
    times: Vec<f64>,
    channels: [Vec<f64>; 3],
}

impl SampleSeries {
    /// Build a series from samples of a single sensor
    ///
    /// Non-monotonic input is sorted (stably) with a warning.
    pub fn from_samples(sensor_id: u32, mut samples: Vec<Sample>) -> Self {
        let sorted = samples
            .windows(2)
            .all(|w| w[0].timestamp_us <= w[1].timestamp_us);
        if !sorted {
            tracing::warn!(
                "Time data for sensor {} is not monotonic; sorting {} samples before analysis",
                sensor_id,
                samples.len()
            );
            samples.sort_by(|a, b| a.timestamp_us.total_cmp(&b.timestamp_us));
        }

        let mut times = Vec::with_capacity(samples.len());
        let mut x = Vec::with_capacity(samples.len());
        let mut y = Vec::with_capacity(samples.len());
        let mut z = Vec::with_capacity(samples.len());
        for s in &samples {
            times.push(s.timestamp_us);
            x.push(s.accel_x);
            y.push(s.accel_y);
            z.push(s.accel_z);
        }

        Self {
            sensor_id,
            times,
            channels: [x, y, z],
        }
    }

    /// Build a single-axis series from parallel time and value columns
    ///
    /// The other two channels are zero. Mostly useful for synthetic signals.
    pub fn from_axis(sensor_id: u32, axis: Axis, times: &[f64], values: &[f64]) -> Self {
        let samples = times
            .iter()
            .zip(values)
            .map(|(&t, &v)| {
                let mut s = Sample::new(sensor_id, t, 0.0, 0.0, 0.0);
                match axis {
                    Axis::X => s.accel_x = v,
                    Axis::Y => s.accel_y = v,
                    Axis::Z => s.accel_z = v,
                }
                s
            })
            .collect();
        Self::from_samples(sensor_id, samples)
    }

    /// Sensor this series belongs to
    pub fn sensor_id(&self) -> u32 {
        self.sensor_id
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Raw time column, ascending
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Raw values of one axis, aligned with [`times`](Self::times)
    pub fn values(&self, axis: Axis) -> &[f64] {
        &self.channels[axis.index()]
    }
}
