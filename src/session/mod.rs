//! Session recording module
//!
//! This module owns the capture side of the system: a shared sample buffer,
//! manual start/stop, and impact-triggered auto recording with a configurable
//! delay and duration. Finished sessions are handed out as owned
//! [`SessionRecording`] snapshots so analysis never races the next capture.

pub mod recorder;
pub mod types;

pub use recorder::{Clock, RecorderEvent, RecordingController, SystemClock};
pub use types::{AutoState, RecordingState, SessionMetadata, SessionRecording, TriggerKind};
