//! Record-level analysis
//!
//! Runs transform → peak detection for every requested (sensor, axis) pair of a
//! record. A failing pair is logged and listed in the report; it never aborts
//! the rest of the batch.

use crate::analysis::aggregate::{combine_rounded, Observation};
use crate::analysis::fft::SpectralTransform;
use crate::analysis::peaks::{Peak, PeakDetector};
use crate::analysis::spectrum::Spectrum;
use crate::config::AnalysisSettings;
use crate::error::ModalError;
use crate::types::{Axis, SampleRecord};

/// Which part of a record to analyse
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Sensors to analyse (`None` = every sensor in the record)
    pub sensors: Option<Vec<u32>>,
    /// Axes to analyse
    pub axes: Vec<Axis>,
    /// Inclusive lower bound on the raw time column
    pub start_us: Option<f64>,
    /// Inclusive upper bound on the raw time column
    pub end_us: Option<f64>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            sensors: None,
            axes: Axis::all().to_vec(),
            start_us: None,
            end_us: None,
        }
    }
}

impl AnalysisRequest {
    /// Restrict to one sensor
    pub fn with_sensor(mut self, sensor_id: u32) -> Self {
        self.sensors.get_or_insert_with(Vec::new).push(sensor_id);
        self
    }

    /// Restrict to the given axes
    pub fn with_axes(mut self, axes: &[Axis]) -> Self {
        self.axes = axes.to_vec();
        self
    }

    /// Restrict to a time window
    pub fn with_time_range(mut self, start_us: Option<f64>, end_us: Option<f64>) -> Self {
        self.start_us = start_us;
        self.end_us = end_us;
        self
    }
}

/// Spectrum and peaks of one (sensor, axis) series
#[derive(Debug, Clone)]
pub struct AxisAnalysis {
    pub sensor_id: u32,
    pub axis: Axis,
    pub spectrum: Spectrum,
    pub peaks: Vec<Peak>,
}

/// A (sensor, axis) pair that could not be analysed
#[derive(Debug)]
pub struct SkippedItem {
    pub sensor_id: u32,
    pub axis: Axis,
    pub error: ModalError,
}

/// Outcome of analysing a record
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// Successful analyses, in sensor then axis order
    pub results: Vec<AxisAnalysis>,
    /// Pairs skipped with the reason
    pub skipped: Vec<SkippedItem>,
}

impl AnalysisReport {
    /// Total number of detected peaks
    pub fn peak_count(&self) -> usize {
        self.results.iter().map(|r| r.peaks.len()).sum()
    }

    /// Every peak as an aggregation input tagged with `source`
    pub fn observations(&self, source: &str) -> Vec<Observation> {
        self.results
            .iter()
            .flat_map(|r| {
                r.peaks.iter().map(move |p| {
                    Observation::new(p.frequency, source)
                        .with_sensor(r.sensor_id.to_string())
                        .with_axis(r.axis)
                })
            })
            .collect()
    }

    /// Distinct peak frequencies after rounding to `decimals`
    pub fn unique_frequencies(&self, decimals: u32) -> Vec<f64> {
        let all: Vec<f64> = self
            .results
            .iter()
            .flat_map(|r| r.peaks.iter().map(|p| p.frequency))
            .collect();
        combine_rounded(&all, decimals)
    }
}

/// Analyse every requested (sensor, axis) pair of a record
pub fn analyze_record(
    record: &SampleRecord,
    request: &AnalysisRequest,
    settings: &AnalysisSettings,
) -> AnalysisReport {
    let trimmed;
    let record = if request.start_us.is_some() || request.end_us.is_some() {
        let mut copy = record.clone();
        copy.retain_time_range(request.start_us, request.end_us);
        tracing::debug!(
            "Time window kept {} of {} samples",
            copy.len(),
            record.len()
        );
        trimmed = copy;
        &trimmed
    } else {
        record
    };

    let sensors = match &request.sensors {
        Some(ids) => ids.clone(),
        None => record.sensor_ids(),
    };

    let mut transform = SpectralTransform::new(settings.clone());
    let detector = PeakDetector::new(settings.magnitude_scale);
    let mut report = AnalysisReport::default();

    for sensor_id in sensors {
        let series = match record.series(sensor_id) {
            Some(series) => series,
            None => {
                tracing::warn!("No samples for sensor {}", sensor_id);
                for &axis in &request.axes {
                    report.skipped.push(SkippedItem {
                        sensor_id,
                        axis,
                        error: ModalError::InsufficientData { samples: 0 },
                    });
                }
                continue;
            }
        };

        for &axis in &request.axes {
            match transform.transform(&series, axis) {
                Ok(spectrum) => {
                    let peaks = detector.detect(&spectrum, settings.detection_tolerance);
                    tracing::info!(
                        "Sensor {} axis {}: {} peak(s)",
                        sensor_id,
                        axis,
                        peaks.len()
                    );
                    report.results.push(AxisAnalysis {
                        sensor_id,
                        axis,
                        spectrum,
                        peaks,
                    });
                }
                Err(error) => {
                    tracing::warn!("Skipping sensor {} axis {}: {}", sensor_id, axis, error);
                    report.skipped.push(SkippedItem {
                        sensor_id,
                        axis,
                        error,
                    });
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Calibration, MagnitudeScale, SpectrumMode};
    use crate::types::Sample;
    use std::f64::consts::PI;

    fn tone_record(sensor_id: u32, freq: f64, n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 1000.0; // 1 kHz in microseconds
                let v = (2.0 * PI * freq * i as f64 / 1000.0).sin();
                Sample::new(sensor_id, t, v, v, v)
            })
            .collect()
    }

    #[test]
    fn test_analyze_all_pairs() {
        let mut samples = tone_record(1, 40.0, 2048);
        samples.extend(tone_record(2, 60.0, 2048));
        let record = SampleRecord::from(samples);

        let settings = AnalysisSettings::new(2, SpectrumMode::Fft)
            .with_calibration(Calibration::identity())
            .with_tolerance(900.0);
        let report = analyze_record(&record, &AnalysisRequest::default(), &settings);

        assert_eq!(report.results.len(), 6);
        assert!(report.skipped.is_empty());
        for r in &report.results {
            assert!(!r.peaks.is_empty());
        }
        let observations = report.observations("trial");
        assert_eq!(observations.len(), report.peak_count());
        assert!(observations.iter().all(|o| o.source == "trial"));
    }

    #[test]
    fn test_skips_short_series() {
        let mut samples = tone_record(1, 40.0, 1024);
        samples.push(Sample::new(9, 0.0, 1.0, 1.0, 1.0));
        let record = SampleRecord::from(samples);

        let request = AnalysisRequest::default().with_axes(&[Axis::Z]);
        let settings = AnalysisSettings::default().with_magnitude_scale(MagnitudeScale::Normalized);
        let report = analyze_record(&record, &request, &settings);

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].sensor_id, 9);
        assert!(report.skipped[0].error.is_item_level());
    }

    #[test]
    fn test_time_window() {
        let record = SampleRecord::from(tone_record(3, 40.0, 4000));
        let request = AnalysisRequest::default()
            .with_sensor(3)
            .with_axes(&[Axis::X])
            .with_time_range(Some(1_000_000.0), Some(2_023_000.0));
        let settings = AnalysisSettings::new(1, SpectrumMode::Fft);
        let report = analyze_record(&record, &request, &settings);

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].spectrum.sample_count, 1024);
    }

    #[test]
    fn test_missing_sensor_is_reported() {
        let record = SampleRecord::from(tone_record(1, 40.0, 512));
        let request = AnalysisRequest::default().with_sensor(5);
        let report = analyze_record(&record, &request, &AnalysisSettings::default());
        assert!(report.results.is_empty());
        assert_eq!(report.skipped.len(), 3);
    }
}
