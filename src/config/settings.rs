//! Analysis and recording settings
//!
//! These structs replace per-widget mutable state: every analysis call takes an
//! immutable settings value, so the same input always yields the same output.
//!
//! # Main Types
//!
//! - [`AnalysisSettings`] - Window, padding, mode, cutoff and peak threshold
//! - [`Calibration`] - Raw-unit to m/s² conversion with per-axis offsets
//! - [`RecordingSettings`] - Impact-triggered auto-recording parameters
//! - [`AggregationSettings`] - Tolerance, source filter and ordering for mode grouping

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::analysis::aggregate::GroupOrder;
use crate::analysis::fft::WindowFunction;
use crate::error::{ModalError, Result};
use crate::types::Axis;

/// Earth gravity used by the reference calibration (m/s²)
pub const DEFAULT_GRAVITY: f64 = 9.8124;

/// Largest accepted zero-padding multiplier
pub const MAX_PADDING_FACTOR: usize = 64;

/// Spectrum estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpectrumMode {
    /// Magnitude of a single zero-padded DFT
    #[default]
    Fft,
    /// Welch amplitude spectral density
    Psd,
}

impl SpectrumMode {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SpectrumMode::Fft => "FFT",
            SpectrumMode::Psd => "PSD",
        }
    }

    /// Get all modes
    pub fn all() -> &'static [SpectrumMode] {
        &[SpectrumMode::Fft, SpectrumMode::Psd]
    }

    /// The other mode (FFT <-> PSD)
    pub fn toggled(&self) -> SpectrumMode {
        match self {
            SpectrumMode::Fft => SpectrumMode::Psd,
            SpectrumMode::Psd => SpectrumMode::Fft,
        }
    }
}

/// Unit of the raw time column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeUnit {
    /// Seconds if the largest (rebased) time is below 1000, else microseconds
    #[default]
    Auto,
    Seconds,
    Microseconds,
}

impl TimeUnit {
    /// Threshold used by [`TimeUnit::Auto`]
    pub const AUTO_SECONDS_LIMIT: f64 = 1000.0;

    /// Resolve the factor converting raw time values to seconds
    pub fn seconds_factor(&self, max_time: f64) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Microseconds => 1e-6,
            TimeUnit::Auto => {
                if max_time < Self::AUTO_SECONDS_LIMIT {
                    tracing::debug!("Time data detected in seconds (max {})", max_time);
                    1.0
                } else {
                    1e-6
                }
            }
        }
    }
}

/// Which magnitude array peak detection runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MagnitudeScale {
    /// Min-max normalized to `0..=normalization_ceiling`
    #[default]
    Normalized,
    /// Unscaled transform output
    Raw,
}

/// Conversion of raw sensor units to m/s²
///
/// `value = gravity * raw - offset[axis]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Multiplier applied to raw readings
    pub gravity: f64,
    /// Subtracted after scaling, per axis
    pub offsets: AxisOffsets,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            offsets: AxisOffsets::default(),
        }
    }
}

impl Calibration {
    /// Identity calibration (values pass through unchanged)
    pub fn identity() -> Self {
        Self {
            gravity: 1.0,
            offsets: AxisOffsets { x: 0.0, y: 0.0, z: 0.0 },
        }
    }

    /// Apply the calibration to one raw value
    pub fn apply(&self, axis: Axis, raw: f64) -> f64 {
        self.gravity * raw - self.offsets.get(axis)
    }
}

/// Per-axis additive offsets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisOffsets {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for AxisOffsets {
    fn default() -> Self {
        Self {
            x: -DEFAULT_GRAVITY,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl AxisOffsets {
    /// Offset for an axis
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Settings for the window → pad → transform → peak pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Zero-padding multiplier (1..=64) before rounding to a power of two
    pub padding_factor: usize,
    /// FFT magnitude or Welch ASD
    pub mode: SpectrumMode,
    /// Taper applied before the transform
    pub window: WindowFunction,
    /// Bins below this frequency are discarded (Hz)
    pub min_frequency_hz: f64,
    /// Peak height threshold, in units of `magnitude_scale`
    pub detection_tolerance: f64,
    /// Magnitude array used for peak detection
    pub magnitude_scale: MagnitudeScale,
    /// Upper bound of the normalized magnitude range
    pub normalization_ceiling: f64,
    /// Unit of the raw time column
    pub time_unit: TimeUnit,
    /// Only the first `max_samples` samples are analysed, when set
    pub max_samples: Option<usize>,
    /// Conversion of raw readings to m/s²
    pub calibration: Calibration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            padding_factor: 5,
            mode: SpectrumMode::Fft,
            window: WindowFunction::Hann,
            min_frequency_hz: 4.0,
            detection_tolerance: 200.0,
            magnitude_scale: MagnitudeScale::Normalized,
            normalization_ceiling: 1000.0,
            time_unit: TimeUnit::Auto,
            max_samples: None,
            calibration: Calibration::default(),
        }
    }
}

impl AnalysisSettings {
    /// Create settings with the given padding and mode
    pub fn new(padding_factor: usize, mode: SpectrumMode) -> Self {
        Self {
            padding_factor: padding_factor.max(1),
            mode,
            ..Default::default()
        }
    }

    /// Set the peak threshold
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.detection_tolerance = tolerance;
        self
    }

    /// Set the calibration
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Set the low-frequency cutoff
    pub fn with_min_frequency(mut self, hz: f64) -> Self {
        self.min_frequency_hz = hz;
        self
    }

    /// Set the time unit
    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    /// Set the magnitude scale used for detection
    pub fn with_magnitude_scale(mut self, scale: MagnitudeScale) -> Self {
        self.magnitude_scale = scale;
        self
    }
}

/// Impact-triggered auto-recording parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Vector magnitude (raw units) that counts as an impact
    pub hit_threshold: f64,
    /// Wait between impact and recording start
    pub recording_delay_ms: u64,
    /// Length of an auto recording
    pub recording_duration_ms: u64,
    /// Re-arm after an auto recording completes
    pub rearm: bool,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            hit_threshold: 3.0,
            recording_delay_ms: 3000,
            recording_duration_ms: 10000,
            rearm: true,
        }
    }
}

impl RecordingSettings {
    /// Delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.recording_delay_ms)
    }

    /// Duration as a Duration
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.recording_duration_ms)
    }
}

/// Grouping of natural frequencies across files/sensors/axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Maximum distance from a group anchor (Hz, inclusive)
    pub tolerance_hz: f64,
    /// Minimum distinct sources for a group to survive comparison
    pub min_sources: usize,
    /// Result ordering
    pub order: GroupOrder,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            tolerance_hz: 0.01,
            min_sources: 2,
            order: GroupOrder::SpreadDescending,
        }
    }
}

impl AggregationSettings {
    /// Set the grouping tolerance, rejecting negative and NaN values
    pub fn with_tolerance(mut self, tolerance_hz: f64) -> Result<Self> {
        if !(tolerance_hz >= 0.0) {
            return Err(ModalError::Config(format!(
                "aggregation.tolerance_hz must be non-negative, got {}",
                tolerance_hz
            )));
        }
        self.tolerance_hz = tolerance_hz;
        Ok(self)
    }
}
