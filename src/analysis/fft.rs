//! Spectral transform
//!
//! Converts one axis of a [`SampleSeries`] into a [`Spectrum`]:
//! - calibration of raw readings to m/s²
//! - time base detection (seconds vs microseconds) and mean sample interval
//! - tapering with a Hann or Blackman window
//! - zero-padding to the next power of two of `N × padding_factor`
//! - FFT magnitude, or Welch amplitude spectral density
//! - low-frequency cutoff and min-max normalization

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::analysis::spectrum::Spectrum;
use crate::config::{AnalysisSettings, SpectrumMode};
use crate::error::{ModalError, Result};
use crate::types::{Axis, SampleSeries};

/// Smallest Welch segment length
pub const MIN_WELCH_SEGMENT: usize = 256;

/// Largest zero-padded transform length (2^26 points)
pub const MAX_PADDED_LENGTH: usize = 1 << 26;

/// Window function type for FFT preprocessing
///
/// Both windows reach zero at the ends of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowFunction {
    /// Hann window (good general purpose)
    #[default]
    Hann,
    /// Blackman window (very low side lobes)
    Blackman,
}

impl WindowFunction {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowFunction::Hann => "Hann",
            WindowFunction::Blackman => "Blackman",
        }
    }

    /// Get all window functions
    pub fn all() -> &'static [WindowFunction] {
        &[WindowFunction::Hann, WindowFunction::Blackman]
    }

    /// Coefficient for phase `x = i / period`, in `[0, 1]`
    fn at_phase(&self, x: f64) -> f64 {
        match self {
            WindowFunction::Hann => 0.5 - 0.5 * (2.0 * PI * x).cos(),
            WindowFunction::Blackman => {
                // Clamp to 0.0: the formula is exactly 0 at endpoints but
                // floating-point representation of 0.42 and 0.08 can produce -ε.
                (0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()).max(0.0)
            }
        }
    }

    /// Symmetric window of n samples (zero at both ends)
    ///
    /// Used to taper a whole record before a single transform.
    pub fn symmetric(&self, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![1.0],
            _ => {
                let period = (n - 1) as f64;
                (0..n).map(|i| self.at_phase(i as f64 / period)).collect()
            }
        }
    }

    /// Periodic window of n samples (DFT-even, as used for Welch segments)
    pub fn periodic(&self, n: usize) -> Vec<f64> {
        let period = n as f64;
        (0..n).map(|i| self.at_phase(i as f64 / period)).collect()
    }
}

/// Calibrated, time-ordered values of one axis ready for transformation
#[derive(Debug, Clone)]
pub struct PreparedSignal {
    /// Calibrated acceleration values (m/s²)
    pub values: Vec<f64>,
    /// Mean sample interval (s)
    pub dt: f64,
}

/// Spectral analyzer for accelerometer series
///
/// Holds an FFT planner so repeated transforms of the same length reuse plans.
pub struct SpectralTransform {
    planner: FftPlanner<f64>,
    settings: AnalysisSettings,
}

impl SpectralTransform {
    /// Create an analyzer with the given settings
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            planner: FftPlanner::new(),
            settings,
        }
    }

    /// Get current settings
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Replace settings
    pub fn set_settings(&mut self, settings: AnalysisSettings) {
        self.settings = settings;
    }

    /// Transform one axis of a series into a spectrum
    ///
    /// # Errors
    /// - [`ModalError::InsufficientData`] with fewer than 2 finite samples
    /// - [`ModalError::InvalidTimeStep`] if the mean sample interval is not positive
    /// - [`ModalError::TransformTooLarge`] if the padded length exceeds [`MAX_PADDED_LENGTH`]
    pub fn transform(&mut self, series: &SampleSeries, axis: Axis) -> Result<Spectrum> {
        let signal = self.prepare(series, axis)?;
        self.transform_prepared(&signal)
    }

    /// Extract, clean, calibrate and time-scale one axis
    pub fn prepare(&self, series: &SampleSeries, axis: Axis) -> Result<PreparedSignal> {
        let settings = &self.settings;

        let mut times = Vec::with_capacity(series.len());
        let mut values = Vec::with_capacity(series.len());
        for (&t, &v) in series.times().iter().zip(series.values(axis)) {
            if t.is_finite() && v.is_finite() {
                times.push(t);
                values.push(v);
            }
        }
        let dropped = series.len() - times.len();
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} non-finite sample(s) from sensor {} axis {}",
                dropped,
                series.sensor_id(),
                axis
            );
        }

        if let Some(max) = settings.max_samples {
            times.truncate(max);
            values.truncate(max);
        }

        if times.len() < 2 {
            return Err(ModalError::InsufficientData {
                samples: times.len(),
            });
        }

        // Series are sorted, so the rebased maximum is the last element
        let t0 = times[0];
        let span = times[times.len() - 1] - t0;
        let factor = settings.time_unit.seconds_factor(span);

        let diff_sum: f64 = times.windows(2).map(|w| (w[1] - w[0]) * factor).sum();
        let dt = diff_sum / (times.len() - 1) as f64;
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(ModalError::InvalidTimeStep { dt });
        }

        let values = values
            .into_iter()
            .map(|v| settings.calibration.apply(axis, v))
            .collect();

        Ok(PreparedSignal { values, dt })
    }

    /// Window, pad and transform an already prepared signal
    pub fn transform_prepared(&mut self, signal: &PreparedSignal) -> Result<Spectrum> {
        let n = signal.values.len();
        if n < 2 {
            return Err(ModalError::InsufficientData { samples: n });
        }
        if !(signal.dt > 0.0) || !signal.dt.is_finite() {
            return Err(ModalError::InvalidTimeStep { dt: signal.dt });
        }

        let padded_length = padded_length(n, self.settings.padding_factor).ok_or(
            ModalError::TransformTooLarge {
                samples: n,
                padding_factor: self.settings.padding_factor,
            },
        )?;
        let window = self.settings.window.symmetric(n);

        let mut padded: Vec<f64> = signal
            .values
            .iter()
            .zip(&window)
            .map(|(v, w)| v * w)
            .collect();
        padded.resize(padded_length, 0.0);

        let (frequencies, magnitudes) = match self.settings.mode {
            SpectrumMode::Fft => self.fft_magnitude(&padded, signal.dt),
            SpectrumMode::Psd => self.welch_asd(&padded, 1.0 / signal.dt),
        };

        let spectrum = Spectrum::from_bins(
            frequencies,
            magnitudes,
            self.settings.min_frequency_hz,
            self.settings.normalization_ceiling,
        )
        .with_sampling(signal.dt, padded_length, n, self.settings.mode);

        tracing::debug!(
            "{} spectrum: {} samples, dt {:.10} s, padded to {}, {} bins kept",
            self.settings.mode.display_name(),
            n,
            signal.dt,
            padded_length,
            spectrum.len()
        );

        Ok(spectrum)
    }

    /// Magnitude of the first half of the DFT bins
    fn fft_magnitude(&mut self, padded: &[f64], dt: f64) -> (Vec<f64>, Vec<f64>) {
        let len = padded.len();
        let mut buffer: Vec<Complex<f64>> =
            padded.iter().map(|&v| Complex::new(v, 0.0)).collect();

        let fft = self.planner.plan_fft_forward(len);
        fft.process(&mut buffer);

        let half = len / 2;
        let resolution = 1.0 / (len as f64 * dt);
        let frequencies = (0..half).map(|k| k as f64 * resolution).collect();
        let magnitudes = buffer.iter().take(half).map(|c| c.norm()).collect();

        (frequencies, magnitudes)
    }

    /// Welch amplitude spectral density
    ///
    /// Segments of `max(256, len / 2)` samples (at most `len`) with 50% overlap,
    /// periodic window of the configured family, mean detrend per segment,
    /// density scaling, one-sided, averaged over segments, then square-rooted.
    fn welch_asd(&mut self, x: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
        let len = x.len();
        let nperseg = MIN_WELCH_SEGMENT.max(len / 2).min(len);
        let noverlap = nperseg / 2;
        let step = nperseg - noverlap;
        let segments = (len - noverlap) / step;

        let window = self.settings.window.periodic(nperseg);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (fs * window_power);

        let bins = nperseg / 2 + 1;
        let fft = self.planner.plan_fft_forward(nperseg);
        let mut accumulated = vec![0.0; bins];
        let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];

        for seg in 0..segments {
            let chunk = &x[seg * step..seg * step + nperseg];
            let mean = chunk.iter().sum::<f64>() / nperseg as f64;
            for ((slot, &v), &w) in buffer.iter_mut().zip(chunk).zip(&window) {
                *slot = Complex::new((v - mean) * w, 0.0);
            }
            fft.process(&mut buffer);
            for (acc, c) in accumulated.iter_mut().zip(&buffer) {
                *acc += c.norm_sqr() * scale;
            }
        }

        let last_doubled = if nperseg % 2 == 0 { bins - 1 } else { bins };
        let count = segments.max(1) as f64;
        let magnitudes = accumulated
            .iter()
            .enumerate()
            .map(|(k, &p)| {
                let one_sided = if k > 0 && k < last_doubled { 2.0 * p } else { p };
                (one_sided / count).sqrt()
            })
            .collect();

        let resolution = fs / nperseg as f64;
        let frequencies = (0..bins).map(|k| k as f64 * resolution).collect();

        (frequencies, magnitudes)
    }
}

impl Default for SpectralTransform {
    fn default() -> Self {
        Self::new(AnalysisSettings::default())
    }
}

/// Zero-padded transform length for `n` samples
///
/// `None` when the length would exceed [`MAX_PADDED_LENGTH`].
pub fn padded_length(n: usize, padding_factor: usize) -> Option<usize> {
    n.checked_mul(padding_factor.max(1))?
        .checked_next_power_of_two()
        .filter(|&len| len <= MAX_PADDED_LENGTH)
}

/// Transform one axis of a series with the given settings
pub fn transform(series: &SampleSeries, axis: Axis, settings: &AnalysisSettings) -> Result<Spectrum> {
    SpectralTransform::new(settings.clone()).transform(series, axis)
}
