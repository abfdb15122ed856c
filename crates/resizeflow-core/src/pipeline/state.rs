//! Per-instance state machine.
//!
//! ```text
//! Started → Validating → Invalid
//!                      → Transforming → Failed
//!                                     → MetadataPending → Completed
//!                                                       → Failed
//! ```
//!
//! [`PipelineState::transition`] is pure and knows nothing about how stages
//! are executed, so any scheduler can drive it. [`PipelineInstance`] wraps
//! it with the bookkeeping the coordinator needs for its final report.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{StageError, TransitionError};
use crate::types::{ImageReference, ImageStatus, Location, PipelineReport, StageFailure};

/// The stages of a pipeline instance, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validate,
    Transform,
    Record,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Validate => "validate",
            Stage::Transform => "transform",
            Stage::Record => "record",
        };
        f.write_str(s)
    }
}

/// Attempt counters per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAttempts {
    pub validate: u32,
    pub transform: u32,
    pub record: u32,
}

impl StageAttempts {
    /// Increment the counter for `stage` and return the new attempt number.
    pub fn bump(&mut self, stage: Stage) -> u32 {
        let counter = match stage {
            Stage::Validate => &mut self.validate,
            Stage::Transform => &mut self.transform,
            Stage::Record => &mut self.record,
        };
        *counter += 1;
        *counter
    }

    pub fn get(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Validate => self.validate,
            Stage::Transform => self.transform,
            Stage::Record => self.record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Started,
    Validating,
    Transforming,
    MetadataPending,
    Completed,
    Invalid,
    Failed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Start,
    ValidationPassed,
    ValidationRejected { reason: String },
    TransformSucceeded { destination: Location },
    /// Non-retryable error, or the retry budget is spent
    TransformFailed { error: StageError },
    MetadataRecorded,
    /// The retry budget is spent
    MetadataFailed { error: StageError },
    /// The instance outlived its maximum lifetime
    TimedOut { after_ms: u64 },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Start => "Start",
            PipelineEvent::ValidationPassed => "ValidationPassed",
            PipelineEvent::ValidationRejected { .. } => "ValidationRejected",
            PipelineEvent::TransformSucceeded { .. } => "TransformSucceeded",
            PipelineEvent::TransformFailed { .. } => "TransformFailed",
            PipelineEvent::MetadataRecorded => "MetadataRecorded",
            PipelineEvent::MetadataFailed { .. } => "MetadataFailed",
            PipelineEvent::TimedOut { .. } => "TimedOut",
        }
    }
}

impl PipelineState {
    /// Compute the next state, rejecting events the topology does not allow.
    pub fn transition(self, event: &PipelineEvent) -> Result<PipelineState, TransitionError> {
        use PipelineEvent as E;
        use PipelineState as S;

        let next = match (self, event) {
            (S::Started, E::Start) => S::Validating,
            (S::Validating, E::ValidationRejected { .. }) => S::Invalid,
            (S::Validating, E::ValidationPassed) => S::Transforming,
            (S::Transforming, E::TransformSucceeded { .. }) => S::MetadataPending,
            (S::Transforming, E::TransformFailed { .. }) => S::Failed,
            (S::MetadataPending, E::MetadataRecorded) => S::Completed,
            (S::MetadataPending, E::MetadataFailed { .. }) => S::Failed,
            (s, E::TimedOut { .. }) if !s.is_terminal() => S::Failed,
            (from, event) => {
                return Err(TransitionError {
                    from: from.name(),
                    event: event.name(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Invalid | PipelineState::Failed
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Started => "Started",
            PipelineState::Validating => "Validating",
            PipelineState::Transforming => "Transforming",
            PipelineState::MetadataPending => "MetadataPending",
            PipelineState::Completed => "Completed",
            PipelineState::Invalid => "Invalid",
            PipelineState::Failed => "Failed",
        }
    }

    /// The metadata status that describes this state.
    pub fn status(self) -> ImageStatus {
        match self {
            PipelineState::Completed => ImageStatus::Resized,
            PipelineState::Invalid => ImageStatus::Invalid,
            PipelineState::Failed => ImageStatus::Failed,
            _ => ImageStatus::Received,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One run of the pipeline for a single image identity.
#[derive(Debug)]
pub struct PipelineInstance {
    reference: ImageReference,
    state: PipelineState,
    pub attempts: StageAttempts,
    destination: Option<Location>,
    error: Option<String>,
    failures: Vec<StageFailure>,
    started: Instant,
}

impl PipelineInstance {
    pub fn new(reference: ImageReference) -> Self {
        Self {
            reference,
            state: PipelineState::Started,
            attempts: StageAttempts::default(),
            destination: None,
            error: None,
            failures: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn reference(&self) -> &ImageReference {
        &self.reference
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Apply an event, keeping whatever detail it carries.
    pub fn apply(&mut self, event: PipelineEvent) -> Result<PipelineState, TransitionError> {
        let next = self.state.transition(&event)?;
        tracing::debug!(
            identity = %self.reference.identity(),
            from = %self.state,
            to = %next,
            "{}",
            event.name()
        );

        match event {
            PipelineEvent::TransformSucceeded { destination } => {
                self.destination = Some(destination);
            }
            PipelineEvent::ValidationRejected { reason } => self.error = Some(reason),
            PipelineEvent::TransformFailed { error } | PipelineEvent::MetadataFailed { error } => {
                self.error = Some(error.to_string());
            }
            PipelineEvent::TimedOut { after_ms } => {
                self.error = Some(format!(
                    "Pipeline timed out after {}ms in state {}",
                    after_ms, self.state
                ));
            }
            _ => {}
        }

        self.state = next;
        Ok(next)
    }

    /// Force the instance into `Failed` when the driver itself broke an
    /// invariant. Not part of the normal topology.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = PipelineState::Failed;
            self.error = Some(reason.into());
        }
    }

    /// Remember a failed attempt for the report.
    pub fn note_failure(&mut self, stage: Stage, attempt: u32, error: &StageError) {
        self.failures.push(StageFailure::new(stage, attempt, error));
    }

    pub fn report(&self, cancelled: bool) -> PipelineReport {
        PipelineReport {
            identity: self.reference.identity().to_string(),
            source: self.reference.source().clone(),
            state: self.state,
            status: self.state.status(),
            destination: self.destination.clone(),
            error: self.error.clone(),
            attempts: self.attempts,
            failures: self.failures.clone(),
            cancelled,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
