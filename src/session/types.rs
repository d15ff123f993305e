//! Session data types

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{ModalError, Result};
use crate::types::SampleRecord;

/// Manual recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// Samples are ignored
    #[default]
    Idle,
    /// Samples are appended to the buffer
    Recording,
}

impl RecordingState {
    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordingState::Idle => "Idle",
            RecordingState::Recording => "Recording",
        }
    }
}

/// Impact-triggered recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoState {
    /// Auto mode off
    #[default]
    Disarmed,
    /// Waiting for a sample above the hit threshold
    Armed,
    /// Impact seen, delay not scheduled yet
    PendingImpact,
    /// Waiting for the delay to elapse
    DelayWait { until: Instant },
    /// Recording until the duration elapses
    Recording { until: Instant },
}

impl AutoState {
    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            AutoState::Disarmed => "Disarmed",
            AutoState::Armed => "Armed",
            AutoState::PendingImpact => "Impact detected",
            AutoState::DelayWait { .. } => "Waiting",
            AutoState::Recording { .. } => "Recording",
        }
    }

    /// Check if auto mode is active in any phase
    pub fn is_armed(&self) -> bool {
        !matches!(self, AutoState::Disarmed)
    }
}

/// What started a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerKind {
    #[default]
    Manual,
    Impact,
}

/// Metadata for a recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Name of the session (also the default file stem)
    pub name: String,
    /// When the session was started
    pub recorded_at: chrono::DateTime<chrono::Utc>,
    /// Wall time between start and stop
    pub duration: Duration,
    /// Number of samples captured
    pub sample_count: usize,
    /// Sensors seen during the session
    pub sensor_ids: Vec<u32>,
    /// What started the recording
    pub trigger: TriggerKind,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self::started_now(TriggerKind::Manual)
    }
}

impl SessionMetadata {
    /// Metadata for a session starting now, named `samples_YYYYmmdd_HHMMSS`
    pub fn started_now(trigger: TriggerKind) -> Self {
        let now = chrono::Local::now();
        Self {
            name: format!("samples_{}", now.format("%Y%m%d_%H%M%S")),
            recorded_at: now.with_timezone(&chrono::Utc),
            duration: Duration::ZERO,
            sample_count: 0,
            sensor_ids: Vec::new(),
            trigger,
        }
    }

    /// Create new metadata with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A complete recorded session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecording {
    /// Session metadata
    pub metadata: SessionMetadata,
    /// Samples in arrival order
    pub record: SampleRecord,
}

impl SessionRecording {
    /// Create with metadata and samples, filling in the derived fields
    pub fn new(metadata: SessionMetadata, record: SampleRecord) -> Self {
        let mut recording = Self { metadata, record };
        recording.finalize();
        recording
    }

    /// Number of samples
    pub fn sample_count(&self) -> usize {
        self.record.len()
    }

    /// Check if the recording is empty
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Default CSV file name for this session
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.metadata.name)
    }

    /// Update metadata fields derived from the samples
    pub fn finalize(&mut self) {
        self.metadata.sample_count = self.record.len();
        self.metadata.sensor_ids = self.record.sensor_ids();
    }

    /// Save metadata next to the CSV as JSON
    pub fn save_metadata(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.metadata)
            .map_err(|e| ModalError::Config(format!("Failed to serialize metadata: {}", e)))?;
        std::fs::write(path, json).map_err(|source| ModalError::ExportIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Measure a session between two clock readings
pub(crate) fn elapsed_between(start: Option<Instant>, end: Instant) -> Duration {
    start
        .map(|s| end.saturating_duration_since(s))
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    #[test]
    fn test_state_names() {
        assert!(RecordingState::Recording.is_recording());
        assert!(!RecordingState::Idle.is_recording());
        assert!(AutoState::Armed.is_armed());
        assert!(!AutoState::Disarmed.is_armed());
        assert_eq!(AutoState::PendingImpact.display_name(), "Impact detected");
    }

    #[test]
    fn test_metadata_default_name() {
        let meta = SessionMetadata::started_now(TriggerKind::Impact);
        assert!(meta.name.starts_with("samples_"));
        assert_eq!(meta.name.len(), "samples_20240101_000000".len());
        assert_eq!(meta.trigger, TriggerKind::Impact);
    }

    #[test]
    fn test_recording_finalize() {
        let record: SampleRecord = vec![
            Sample::new(2, 0.0, 0.0, 0.0, 0.0),
            Sample::new(1, 10.0, 0.0, 0.0, 0.0),
        ]
        .into();
        let recording = SessionRecording::new(SessionMetadata::new("run"), record);
        assert_eq!(recording.sample_count(), 2);
        assert_eq!(recording.metadata.sensor_ids, vec![1, 2]);
        assert_eq!(recording.file_name(), "run.csv");
    }

    #[test]
    fn test_save_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let recording = SessionRecording::new(SessionMetadata::new("run"), SampleRecord::new());
        recording.save_metadata(&path).unwrap();

        let loaded: SessionMetadata =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, recording.metadata);
    }
}
