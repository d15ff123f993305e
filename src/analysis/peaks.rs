//! Peak detection
//!
//! A plain local-maximum finder with a height threshold. There is no
//! minimum-distance or prominence constraint, so several peaks may sit on the
//! shoulders of one resonance; those are merged later by the aggregator.

use serde::{Deserialize, Serialize};

use crate::analysis::spectrum::Spectrum;
use crate::config::MagnitudeScale;

/// A candidate natural frequency picked out of a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Frequency of the peak bin (Hz)
    pub frequency: f64,
    /// Magnitude in the scale detection ran on
    pub magnitude: f64,
    /// Bin index within the spectrum
    pub bin: usize,
}

/// Local-maximum peak finder
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakDetector {
    scale: MagnitudeScale,
}

impl PeakDetector {
    /// Create a detector working on the given magnitude scale
    pub fn new(scale: MagnitudeScale) -> Self {
        Self { scale }
    }

    /// Find peaks of a spectrum with magnitude ≥ `height_threshold`
    pub fn detect(&self, spectrum: &Spectrum, height_threshold: f64) -> Vec<Peak> {
        let peaks = detect_in(
            &spectrum.frequencies,
            spectrum.values(self.scale),
            height_threshold,
        );
        tracing::debug!(
            "{} peak(s) ≥ {} among {} bins",
            peaks.len(),
            height_threshold,
            spectrum.len()
        );
        peaks
    }
}

/// Find local maxima in parallel frequency/magnitude slices
///
/// A bin is a peak when it is strictly above its left neighbour and the next
/// differing value to its right is lower. A plateau therefore yields one peak
/// at its left edge. The first and last bins are never peaks.
pub fn detect_in(frequencies: &[f64], magnitudes: &[f64], height_threshold: f64) -> Vec<Peak> {
    let n = frequencies.len().min(magnitudes.len());
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    while i < n - 1 {
        if magnitudes[i] > magnitudes[i - 1] {
            let mut ahead = i + 1;
            while ahead < n - 1 && magnitudes[ahead] == magnitudes[i] {
                ahead += 1;
            }
            if magnitudes[ahead] < magnitudes[i] {
                if magnitudes[i] >= height_threshold {
                    peaks.push(Peak {
                        frequency: frequencies[i],
                        magnitude: magnitudes[i],
                        bin: i,
                    });
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    peaks
}
