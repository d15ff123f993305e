//! Spectrum result type

use serde::{Deserialize, Serialize};

use crate::config::{MagnitudeScale, SpectrumMode};

/// Floor applied before taking the log of a zero magnitude (dB)
pub const DB_FLOOR: f64 = -200.0;

/// Frequency-domain view of one (sensor, axis) series
///
/// `frequencies`, `magnitudes` and `normalized` always have the same length
/// and frequencies are strictly increasing, all at or above the cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies (Hz)
    pub frequencies: Vec<f64>,
    /// Unscaled magnitudes (FFT magnitude or ASD)
    pub magnitudes: Vec<f64>,
    /// Magnitudes min-max scaled to `0..=ceiling`
    pub normalized: Vec<f64>,
    /// Mean sample interval of the source series (s)
    pub sample_interval: f64,
    /// Transform length after zero-padding
    pub padded_length: usize,
    /// Samples that went into the transform
    pub sample_count: usize,
    /// Estimator that produced this spectrum
    pub mode: SpectrumMode,
    /// Distance between adjacent bins (Hz)
    pub frequency_resolution: f64,
}

impl Spectrum {
    /// Build from raw bins: apply the cutoff, then normalize to `ceiling`
    pub fn from_bins(
        frequencies: Vec<f64>,
        magnitudes: Vec<f64>,
        min_frequency: f64,
        ceiling: f64,
    ) -> Self {
        let frequency_resolution = match frequencies.as_slice() {
            [a, b, ..] => b - a,
            _ => 0.0,
        };

        let (frequencies, magnitudes): (Vec<f64>, Vec<f64>) = frequencies
            .into_iter()
            .zip(magnitudes)
            .filter(|(f, _)| *f >= min_frequency)
            .unzip();

        let normalized = normalize(&magnitudes, ceiling);

        Self {
            frequencies,
            magnitudes,
            normalized,
            sample_interval: 0.0,
            padded_length: 0,
            sample_count: 0,
            mode: SpectrumMode::Fft,
            frequency_resolution,
        }
    }

    /// Attach the sampling parameters the spectrum was computed with
    pub fn with_sampling(
        mut self,
        sample_interval: f64,
        padded_length: usize,
        sample_count: usize,
        mode: SpectrumMode,
    ) -> Self {
        self.sample_interval = sample_interval;
        self.padded_length = padded_length;
        self.sample_count = sample_count;
        self.mode = mode;
        self
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Check if no bins survived the cutoff
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Sampling frequency of the source series (Hz)
    pub fn sampling_frequency(&self) -> f64 {
        if self.sample_interval > 0.0 {
            1.0 / self.sample_interval
        } else {
            0.0
        }
    }

    /// Magnitudes in the requested scale
    pub fn values(&self, scale: MagnitudeScale) -> &[f64] {
        match scale {
            MagnitudeScale::Normalized => &self.normalized,
            MagnitudeScale::Raw => &self.magnitudes,
        }
    }

    /// Raw magnitudes in decibels (`20 log10`)
    pub fn db(&self) -> Vec<f64> {
        self.magnitudes
            .iter()
            .map(|&m| {
                if m > 0.0 {
                    20.0 * m.log10()
                } else {
                    DB_FLOOR
                }
            })
            .collect()
    }

    /// Frequency and raw magnitude of the largest bin
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, &m)| (self.frequencies[i], m))
    }

    /// `(frequency, magnitude)` pairs in the requested scale
    pub fn points(&self, scale: MagnitudeScale) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.values(scale).iter().copied())
    }
}

/// Min-max scaling to `0..=ceiling`; a flat input maps to all zeros
pub fn normalize(values: &[f64], ceiling: f64) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = values.iter().map(|v| v - min).collect();
    let max = shifted.iter().copied().fold(0.0, f64::max);

    if max > 0.0 {
        shifted.iter().map(|v| v / max * ceiling).collect()
    } else {
        vec![0.0; values.len()]
    }
}
