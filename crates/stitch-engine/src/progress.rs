//! Progress reporting for a single stitch invocation.

use std::sync::Mutex;

use clipstitch_common::error::StitchError;
use clipstitch_model::{StitchProgress, StitchStatus};

/// Overall percentage bands for each pipeline phase.
pub(crate) const PROBE_DONE: f64 = 5.0;
pub(crate) const AUDIO_START: f64 = 5.0;
pub(crate) const AUDIO_END: f64 = 15.0;
pub(crate) const VIDEO_START: f64 = 15.0;
pub(crate) const VIDEO_END: f64 = 95.0;
pub(crate) const FINALIZE: f64 = 97.0;

/// Forwards reports to the caller's callback.
///
/// Percentages never go backwards within an invocation and at most one
/// terminal report (`complete` or `error`) is emitted.
pub struct ProgressReporter<'a> {
    callback: Option<&'a (dyn Fn(StitchProgress) + Send + Sync)>,
    total_clips: usize,
    state: Mutex<ReporterState>,
}

#[derive(Debug, Default)]
struct ReporterState {
    last_percent: f64,
    finished: bool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        callback: Option<&'a (dyn Fn(StitchProgress) + Send + Sync)>,
        total_clips: usize,
    ) -> Self {
        Self {
            callback,
            total_clips,
            state: Mutex::new(ReporterState::default()),
        }
    }

    /// Report a `processing` step.
    pub fn processing(&self, message: impl Into<String>, percent: f64, clip_index: Option<usize>) {
        self.emit(StitchStatus::Processing, message.into(), percent, clip_index, None);
    }

    /// Report successful completion.
    pub fn complete(&self, message: impl Into<String>) {
        self.emit(StitchStatus::Complete, message.into(), 100.0, None, None);
    }

    /// Report failure carrying the error message.
    pub fn error(&self, err: &StitchError) {
        let message = err.to_string();
        let percent = self.percent();
        self.emit(
            StitchStatus::Error,
            message.clone(),
            percent,
            None,
            Some(message),
        );
    }

    /// Last reported percentage.
    pub fn percent(&self) -> f64 {
        self.lock().last_percent
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(
        &self,
        status: StitchStatus,
        message: String,
        percent: f64,
        clip_index: Option<usize>,
        error: Option<String>,
    ) {
        let percent = {
            let mut state = self.lock();
            if state.finished {
                tracing::debug!(?status, "Dropping progress report after terminal state");
                return;
            }
            let percent = if percent.is_finite() {
                percent.clamp(state.last_percent, 100.0)
            } else {
                state.last_percent
            };
            state.last_percent = percent;
            state.finished = status.is_terminal();
            percent
        };

        if let Some(cb) = self.callback {
            cb(StitchProgress {
                status,
                message,
                progress: percent,
                current_clip_index: clip_index,
                total_clips: Some(self.total_clips),
                error,
            });
        }
    }
}

/// Map `fraction` in [0, 1] into the band `[start, end]`.
pub(crate) fn band(start: f64, end: f64, fraction: f64) -> f64 {
    start + (end - start) * fraction.clamp(0.0, 1.0)
}
