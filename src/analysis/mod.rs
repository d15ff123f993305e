//! Analysis module for modal frequency extraction
//!
//! This module provides the frequency-domain pipeline:
//! - FFT magnitude and Welch amplitude spectral density
//! - Peak detection with a height threshold
//! - Tolerance-based grouping of peaks across files, sensors and axes

pub mod aggregate;
pub mod fft;
pub mod peaks;
pub mod pipeline;
pub mod spectrum;

pub use aggregate::{
    aggregate, combine_rounded, FrequencyAggregator, FrequencyGroup, GroupOrder, Observation,
    Purpose,
};
pub use fft::{padded_length, transform, SpectralTransform, WindowFunction};
pub use peaks::{detect_in, Peak, PeakDetector};
pub use pipeline::{analyze_record, AnalysisReport, AnalysisRequest, AxisAnalysis, SkippedItem};
pub use spectrum::Spectrum;
