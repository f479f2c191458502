//! Scoped ownership of the output container.
//!
//! Every resource opened on the container registers a cleanup step. Steps
//! are resolved as the pipeline closes resources normally; whatever is left
//! when an error unwinds the pipeline is drained exactly once by
//! [`ContainerGuard::release`], each step independently, so one failing
//! cleanup never blocks the others or masks the original error.

use crate::backend::OutputContainer;

/// A pending cleanup action. Drained in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CleanupStep {
    CloseAudioTrack,
    CloseVideoTrack,
    CancelContainer,
}

/// Owns a container and the cleanup steps its open resources require.
pub struct ContainerGuard<C: OutputContainer> {
    container: C,
    pending: Vec<CleanupStep>,
}

impl<C: OutputContainer> ContainerGuard<C> {
    pub fn new(container: C) -> Self {
        Self {
            container,
            pending: Vec::new(),
        }
    }

    pub fn container_mut(&mut self) -> &mut C {
        &mut self.container
    }

    /// Note that `step` must run if the pipeline fails from here on.
    pub fn register(&mut self, step: CleanupStep) {
        if !self.pending.contains(&step) {
            self.pending.push(step);
        }
    }

    /// The resource behind `step` was closed normally.
    pub fn resolve(&mut self, step: CleanupStep) {
        self.pending.retain(|s| *s != step);
    }

    /// Steps still outstanding.
    pub fn pending(&self) -> &[CleanupStep] {
        &self.pending
    }

    /// Run every outstanding cleanup step once, consuming the guard.
    ///
    /// Returns the steps that failed; failures are logged, never raised.
    pub async fn release(mut self) -> Vec<CleanupStep> {
        let mut steps = std::mem::take(&mut self.pending);
        steps.sort();

        let mut failed = Vec::new();
        for step in steps {
            let result = match step {
                CleanupStep::CloseAudioTrack => self.container.close_audio().await,
                CleanupStep::CloseVideoTrack => self.container.close_video().await,
                CleanupStep::CancelContainer => self.container.cancel().await,
            };
            match result {
                Ok(()) => tracing::debug!(?step, "Cleanup step completed"),
                Err(e) => {
                    tracing::warn!(?step, error = %e, "Cleanup step failed");
                    failed.push(step);
                }
            }
        }
        failed
    }

    /// Hand back the container once nothing is left to clean up.
    pub fn into_inner(self) -> C {
        if !self.pending.is_empty() {
            tracing::warn!(
                pending = ?self.pending,
                "Container guard released with cleanup still pending"
            );
        }
        self.container
    }
}
