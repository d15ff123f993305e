//! Recording controller for capturing accelerometer sessions
//!
//! Owns the sample buffer and the manual and impact-triggered recording
//! state machines. The controller is a cloneable handle: the ingestion loop
//! pushes samples while another thread may start, stop or tick it.
//!
//! Completed recordings are delivered as [`RecorderEvent::Stopped`] on the
//! event channel returned by [`RecordingController::new`].

use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::RecordingSettings;
use crate::types::{Sample, SampleRecord};

use super::types::{
    elapsed_between, AutoState, RecordingState, SessionMetadata, SessionRecording, TriggerKind,
};

/// Source of monotonic time for the auto-recording timers
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Notifications from the controller
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// A recording started
    Started { trigger: TriggerKind },
    /// A recording finished; the snapshot is ready for export
    Stopped { recording: SessionRecording },
    /// A sample crossed the hit threshold while armed
    ImpactDetected { magnitude: f64 },
    /// Auto mode is waiting for an impact
    Armed,
    /// Auto mode is off
    Disarmed,
}

#[derive(Debug, Default)]
struct ControllerState {
    state: RecordingState,
    auto: AutoState,
    buffer: SampleRecord,
    metadata: SessionMetadata,
    started_at: Option<Instant>,
}

/// Cloneable handle to the shared recording buffer and state machines
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Mutex<ControllerState>>,
    settings: RecordingSettings,
    clock: Arc<dyn Clock>,
    events: Sender<RecorderEvent>,
}

impl RecordingController {
    /// Create a controller and the receiving end of its event channel
    pub fn new(
        settings: RecordingSettings,
        clock: Arc<dyn Clock>,
    ) -> (Self, Receiver<RecorderEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let controller = Self {
            inner: Arc::new(Mutex::new(ControllerState::default())),
            settings,
            clock,
            events,
        };
        (controller, receiver)
    }

    /// Create a controller using the system clock
    pub fn with_system_clock(settings: RecordingSettings) -> (Self, Receiver<RecorderEvent>) {
        Self::new(settings, Arc::new(SystemClock))
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        // A panic elsewhere must not take the recorder down with it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: RecorderEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Recorder event dropped: no receiver");
        }
    }

    /// Get the recording settings
    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    /// Current manual recording state
    pub fn state(&self) -> RecordingState {
        self.lock().state
    }

    /// Current auto-recording state
    pub fn auto_state(&self) -> AutoState {
        self.lock().auto
    }

    /// Check if samples are being captured
    pub fn is_recording(&self) -> bool {
        self.lock().state.is_recording()
    }

    /// Number of buffered samples
    pub fn sample_count(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Start a manual recording, discarding any previous buffer
    pub fn start(&self) {
        let mut inner = self.lock();
        self.begin(&mut inner, TriggerKind::Manual);
    }

    /// Stop the current recording and emit its snapshot
    ///
    /// Returns `false` if nothing was recording.
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        if !inner.state.is_recording() {
            return false;
        }
        if matches!(inner.auto, AutoState::Recording { .. }) {
            inner.auto = self.after_auto_recording();
        }
        self.finish(&mut inner);
        true
    }

    /// Enable impact-triggered recording
    pub fn arm(&self) {
        let mut inner = self.lock();
        inner.auto = AutoState::Armed;
        drop(inner);
        tracing::info!("Auto recording armed (threshold {})", self.settings.hit_threshold);
        self.emit(RecorderEvent::Armed);
    }

    /// Disable impact-triggered recording
    ///
    /// An auto recording in progress is stopped and emitted.
    pub fn disarm(&self) {
        let mut inner = self.lock();
        let previous = std::mem::take(&mut inner.auto);
        if matches!(previous, AutoState::Recording { .. }) && inner.state.is_recording() {
            self.finish(&mut inner);
        }
        drop(inner);
        tracing::info!("Auto recording disarmed");
        self.emit(RecorderEvent::Disarmed);
    }

    /// Offer one decoded sample
    ///
    /// While armed, the sample is checked against the hit threshold. It is
    /// buffered only while recording.
    pub fn push_sample(&self, sample: Sample) {
        let mut inner = self.lock();

        if inner.auto == AutoState::Armed {
            let magnitude = sample.magnitude();
            if magnitude >= self.settings.hit_threshold {
                inner.auto = AutoState::PendingImpact;
                tracing::info!(
                    "Impact detected on sensor {} (magnitude {:.3})",
                    sample.sensor_id,
                    magnitude
                );
                self.emit(RecorderEvent::ImpactDetected { magnitude });
            }
        }

        if inner.state.is_recording() {
            inner.buffer.push(sample);
        }
    }

    /// Offer a batch of samples in arrival order
    pub fn push_samples(&self, samples: impl IntoIterator<Item = Sample>) {
        for sample in samples {
            self.push_sample(sample);
        }
    }

    /// Advance the auto-recording timers
    ///
    /// Call periodically; each call performs at most one transition.
    pub fn tick(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();

        let auto = inner.auto;
        match auto {
            AutoState::PendingImpact => {
                inner.auto = AutoState::DelayWait {
                    until: now + self.settings.delay(),
                };
                tracing::debug!(
                    "Recording starts in {} ms",
                    self.settings.recording_delay_ms
                );
            }
            AutoState::DelayWait { until } if now >= until => {
                self.begin(&mut inner, TriggerKind::Impact);
                inner.auto = AutoState::Recording {
                    until: now + self.settings.duration(),
                };
            }
            AutoState::Recording { until } if now >= until => {
                inner.auto = self.after_auto_recording();
                if inner.state.is_recording() {
                    self.finish(&mut inner);
                }
                if inner.auto == AutoState::Armed {
                    self.emit(RecorderEvent::Armed);
                }
            }
            _ => {}
        }
    }

    /// Owned copy of the current buffer without stopping
    pub fn snapshot(&self) -> SessionRecording {
        let inner = self.lock();
        let mut metadata = inner.metadata.clone();
        metadata.duration = elapsed_between(inner.started_at, self.clock.now());
        SessionRecording::new(metadata, inner.buffer.clone())
    }

    fn after_auto_recording(&self) -> AutoState {
        if self.settings.rearm {
            AutoState::Armed
        } else {
            AutoState::Disarmed
        }
    }

    fn begin(&self, inner: &mut ControllerState, trigger: TriggerKind) {
        inner.buffer.clear();
        inner.metadata = SessionMetadata::started_now(trigger);
        inner.started_at = Some(self.clock.now());
        inner.state = RecordingState::Recording;
        tracing::info!("Recording started ({:?})", trigger);
        self.emit(RecorderEvent::Started { trigger });
    }

    fn finish(&self, inner: &mut ControllerState) {
        let mut metadata = std::mem::take(&mut inner.metadata);
        metadata.duration = elapsed_between(inner.started_at.take(), self.clock.now());
        let recording = SessionRecording::new(metadata, std::mem::take(&mut inner.buffer));
        inner.state = RecordingState::Idle;
        tracing::info!(
            "Recording stopped: {} samples over {:.1} s",
            recording.sample_count(),
            recording.metadata.duration.as_secs_f64()
        );
        self.emit(RecorderEvent::Stopped { recording });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quiet(t: f64) -> Sample {
        Sample::new(1, t, 0.1, 0.1, 0.1)
    }

    fn stopped(rx: &Receiver<RecorderEvent>) -> Vec<SessionRecording> {
        rx.try_iter()
            .filter_map(|e| match e {
                RecorderEvent::Stopped { recording } => Some(recording),
                _ => None,
            })
            .collect()
    }

    /// Mock clock whose time is advanced by the test
    fn stepping_clock() -> (MockClock, Arc<Mutex<Instant>>) {
        let now = Arc::new(Mutex::new(Instant::now()));
        let shared = now.clone();
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .returning(move || *shared.lock().unwrap());
        (clock, now)
    }

    #[test]
    fn test_manual_lifecycle() {
        let (ctrl, rx) = RecordingController::with_system_clock(RecordingSettings::default());
        assert_eq!(ctrl.state(), RecordingState::Idle);

        ctrl.push_sample(quiet(0.0));
        assert_eq!(ctrl.sample_count(), 0);

        ctrl.start();
        ctrl.push_samples((1..=3).map(|i| quiet(i as f64)));
        assert!(ctrl.is_recording());
        assert_eq!(ctrl.sample_count(), 3);

        assert!(ctrl.stop());
        assert!(!ctrl.stop());
        let recordings = stopped(&rx);
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].sample_count(), 3);
        assert_eq!(recordings[0].metadata.trigger, TriggerKind::Manual);
        assert_eq!(ctrl.sample_count(), 0);
    }

    #[test]
    fn test_start_clears_buffer() {
        let (ctrl, _rx) = RecordingController::with_system_clock(RecordingSettings::default());
        ctrl.start();
        ctrl.push_sample(quiet(0.0));
        ctrl.start();
        assert_eq!(ctrl.sample_count(), 0);
    }

    #[test]
    fn test_snapshot_does_not_stop() {
        let (ctrl, _rx) = RecordingController::with_system_clock(RecordingSettings::default());
        ctrl.start();
        ctrl.push_sample(quiet(0.0));
        let snap = ctrl.snapshot();
        ctrl.push_sample(quiet(1.0));
        assert_eq!(snap.sample_count(), 1);
        assert_eq!(ctrl.sample_count(), 2);
    }

    #[test]
    fn test_auto_recording_with_mock_clock() {
        let (clock, now) = stepping_clock();
        let settings = RecordingSettings {
            hit_threshold: 3.0,
            recording_delay_ms: 100,
            recording_duration_ms: 500,
            rearm: true,
        };
        let (ctrl, rx) = RecordingController::new(settings, Arc::new(clock));
        let advance = |ms: u64| *now.lock().unwrap() += Duration::from_millis(ms);

        ctrl.arm();
        ctrl.push_sample(quiet(0.0));
        ctrl.tick();
        assert_eq!(ctrl.auto_state(), AutoState::Armed);

        ctrl.push_sample(Sample::new(1, 1.0, 3.0, 1.0, 0.0));
        assert_eq!(ctrl.auto_state(), AutoState::PendingImpact);
        // Not recording yet: the impact itself is not captured
        assert_eq!(ctrl.sample_count(), 0);

        ctrl.tick();
        assert!(matches!(ctrl.auto_state(), AutoState::DelayWait { .. }));

        advance(50);
        ctrl.tick();
        assert!(!ctrl.is_recording());

        advance(50);
        ctrl.tick();
        assert!(ctrl.is_recording());
        assert!(matches!(ctrl.auto_state(), AutoState::Recording { .. }));

        ctrl.push_samples((0..10).map(|i| quiet(2.0 + i as f64)));
        advance(499);
        ctrl.tick();
        assert!(ctrl.is_recording());

        advance(1);
        ctrl.tick();
        assert!(!ctrl.is_recording());
        assert_eq!(ctrl.auto_state(), AutoState::Armed);

        let recordings = stopped(&rx);
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].sample_count(), 10);
        assert_eq!(recordings[0].metadata.trigger, TriggerKind::Impact);
        assert_eq!(recordings[0].metadata.duration, Duration::from_millis(500));
    }

    #[test]
    fn test_auto_without_rearm() {
        let (clock, now) = stepping_clock();
        let settings = RecordingSettings {
            recording_delay_ms: 0,
            recording_duration_ms: 10,
            rearm: false,
            ..Default::default()
        };
        let (ctrl, rx) = RecordingController::new(settings, Arc::new(clock));

        ctrl.arm();
        ctrl.push_sample(Sample::new(1, 0.0, 5.0, 0.0, 0.0));
        ctrl.tick(); // schedule
        ctrl.tick(); // start
        assert!(ctrl.is_recording());
        *now.lock().unwrap() += Duration::from_millis(10);
        ctrl.tick();
        assert_eq!(ctrl.auto_state(), AutoState::Disarmed);
        assert_eq!(stopped(&rx).len(), 1);
    }

    #[test]
    fn test_disarm_stops_auto_recording() {
        let (clock, _now) = stepping_clock();
        let settings = RecordingSettings {
            recording_delay_ms: 0,
            ..Default::default()
        };
        let (ctrl, rx) = RecordingController::new(settings, Arc::new(clock));

        ctrl.arm();
        ctrl.push_sample(Sample::new(1, 0.0, 0.0, 0.0, 9.0));
        ctrl.tick();
        ctrl.tick();
        assert!(ctrl.is_recording());

        ctrl.disarm();
        assert!(!ctrl.is_recording());
        assert_eq!(ctrl.auto_state(), AutoState::Disarmed);
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, RecorderEvent::ImpactDetected { .. })));
        assert!(events.iter().any(|e| matches!(e, RecorderEvent::Stopped { .. })));
        assert!(matches!(events.last(), Some(RecorderEvent::Disarmed)));
    }

    #[test]
    fn test_clone_shares_buffer() {
        let (ctrl, _rx) = RecordingController::with_system_clock(RecordingSettings::default());
        let other = ctrl.clone();
        ctrl.start();
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                other.push_sample(quiet(i as f64));
            }
        });
        handle.join().unwrap();
        assert_eq!(ctrl.sample_count(), 100);
    }
}
