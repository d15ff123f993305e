//! # modal-rs: Accelerometer Recorder and Modal Frequency Extractor
//!
//! Records tri-axial accelerometer streams from one or more sensors and
//! extracts the natural frequencies of the structure they are mounted on.
//!
//! ## Architecture
//!
//! - **Backend**: Reads `sensor_id timestamp_us ax ay az` lines in a separate thread
//! - **Session**: Buffers samples with manual or impact-triggered recording
//! - **Analysis**: Window → pad → FFT/Welch → peak detection → tolerance grouping
//! - **Files**: Sample, spectrum, natural-frequency and mode CSV files
//! - **Communication**: Crossbeam channels between ingestion, recording and analysis
//!
//! ## Configuration
//!
//! Parameters are stored in the platform-appropriate data directory under
//! `dev.modal-rs` (see [`config`]). Every analysis call takes an immutable
//! [`AnalysisSettings`], so results depend only on input and settings.
//!
//! ## Example
//!
//! ```ignore
//! use modal_rs::{
//!     analysis::{analyze_record, AnalysisRequest, FrequencyAggregator},
//!     config::AppConfig,
//!     files::read_samples_csv,
//! };
//!
//! let config = AppConfig::load_or_default(None);
//! let record = read_samples_csv("run1.csv")?;
//! let report = analyze_record(&record, &AnalysisRequest::default(), &config.analysis);
//!
//! let aggregator = FrequencyAggregator::new(config.aggregation.clone());
//! let modes = aggregator.combine(&report.observations("run1"));
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod files;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use analysis::{
    analyze_record, AnalysisReport, AnalysisRequest, FrequencyAggregator, FrequencyGroup,
    Observation, Peak, PeakDetector, SpectralTransform, Spectrum,
};
pub use backend::{IngestBackend, IngestHandle, IngestMessage};
pub use config::{AnalysisSettings, AppConfig, SpectrumMode};
pub use error::{ModalError, Result};
pub use session::{RecordingController, SessionRecording};
pub use types::{Axis, Sample, SampleRecord, SampleSeries};
