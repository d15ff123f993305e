//! Error handling for modal-rs
//!
//! This module defines the error taxonomy shared by the analysis pipeline,
//! record files, ingestion and configuration, plus a Result alias.
//!
//! Every variant is recoverable: callers skip the offending row, file or
//! (sensor, axis) item and carry on with the rest of the batch.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for modal-rs operations
#[derive(Error, Debug)]
pub enum ModalError {
    /// Fewer than two usable samples in a series
    #[error("Insufficient data: {samples} usable sample(s), at least 2 required")]
    InsufficientData { samples: usize },

    /// Mean sample interval is not positive
    #[error("Invalid time step: mean dt = {dt} s")]
    InvalidTimeStep { dt: f64 },

    /// Zero-padded length would not fit the transform size limit
    #[error("Transform too large: {samples} samples with padding factor {padding_factor}")]
    TransformTooLarge {
        samples: usize,
        padding_factor: usize,
    },

    /// A CSV row or serial line that could not be parsed
    #[error("Malformed input row {line:?}: {reason}")]
    MalformedInputRow { line: String, reason: String },

    /// An expected CSV column is absent from the header
    #[error("Missing column '{column}' in {path:?}")]
    MissingColumn { column: String, path: PathBuf },

    /// Writing an export file failed
    #[error("Export to {path:?} failed: {source}")]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ModalError>,
    },
}

impl ModalError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ModalError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a malformed row error
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        ModalError::MalformedInputRow {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only affects a single item of a batch
    ///
    /// Item-level errors are logged and skipped; the batch continues.
    pub fn is_item_level(&self) -> bool {
        match self {
            ModalError::InsufficientData { .. }
            | ModalError::InvalidTimeStep { .. }
            | ModalError::TransformTooLarge { .. }
            | ModalError::MalformedInputRow { .. } => true,
            ModalError::WithContext { source, .. } => source.is_item_level(),
            _ => false,
        }
    }
}

/// Result type alias for modal-rs operations
pub type Result<T> = std::result::Result<T, ModalError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ModalError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ModalError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModalError::InsufficientData { samples: 1 };
        assert_eq!(
            err.to_string(),
            "Insufficient data: 1 usable sample(s), at least 2 required"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = ModalError::InvalidTimeStep { dt: 0.0 };
        let with_ctx = err.with_context("Sensor 2 axis X");
        assert!(with_ctx.to_string().contains("Sensor 2 axis X"));
        assert!(with_ctx.is_item_level());
    }

    #[test]
    fn test_missing_column_error() {
        let err = ModalError::MissingColumn {
            column: "Natural Frequency (Hz)".to_string(),
            path: PathBuf::from("run1.csv"),
        };
        assert!(err.to_string().contains("Natural Frequency (Hz)"));
        assert!(err.to_string().contains("run1.csv"));
        assert!(!err.is_item_level());
    }

    #[test]
    fn test_io_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = res.context("Opening record").unwrap_err();
        assert!(err.to_string().starts_with("Opening record"));
    }
}
