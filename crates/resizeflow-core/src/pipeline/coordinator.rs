//! Pipeline orchestration: drives one instance through validate → transform
//! → record, owning every retry-versus-give-up decision.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig};
use crate::error::{StageError, TransitionError};
use crate::metadata::MetadataStore;
use crate::storage::BlobStore;
use crate::types::{Dimensions, ImageReference, ImageStatus, PipelineReport};

use super::record::MetadataRecorder;
use super::retry::is_retryable;
use super::state::{PipelineEvent, PipelineInstance, PipelineState, Stage};
use super::transform::Transformer;
use super::validate::Validator;

/// How a drive of the stage sequence ended.
enum Flow {
    /// The instance reached a terminal state. Carries the status still to be
    /// written once the report is out, if any.
    Finished(Option<ImageStatus>),
    /// Stopped between stages on cancellation.
    Cancelled,
}

/// Outcome of a stage run under the retry policy.
enum Attempted<T> {
    Done(T),
    GaveUp(StageError),
    Cancelled,
}

/// Sequences the stages for each instance. One coordinator serves any
/// number of concurrent instances; all per-run state lives in the
/// [`PipelineInstance`].
pub struct PipelineCoordinator {
    validator: Validator,
    transformer: Transformer,
    recorder: MetadataRecorder,
    target: Dimensions,
    retry: RetryConfig,
    instance_timeout_ms: u64,
    status_write_timeout: Duration,
}

impl PipelineCoordinator {
    pub fn new(
        config: &Config,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            validator: Validator::new(),
            transformer: Transformer::new(blobs, &config.pipeline, config.limits.clone()),
            recorder: MetadataRecorder::new(metadata),
            target: config.pipeline.target_dimensions,
            retry: config.retry.clone(),
            instance_timeout_ms: config.limits.instance_timeout_ms,
            status_write_timeout: Duration::from_millis(config.limits.status_write_timeout_ms),
        }
    }

    /// Run one instance to completion.
    pub async fn run(&self, reference: ImageReference) -> PipelineReport {
        self.run_with_cancel(reference, &CancellationToken::new())
            .await
    }

    /// Run one instance, stopping between stages if `cancel` fires.
    ///
    /// A cancelled run is reported with `cancelled: true` and a non-terminal
    /// state. Running it again from the start is safe: the destination key is
    /// deterministic and the metadata write is an upsert.
    ///
    /// Invalid and Failed outcomes are reported and logged before their
    /// status write, which is bounded by `limits.status_write_timeout_ms`.
    pub async fn run_with_cancel(
        &self,
        reference: ImageReference,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        let mut instance = PipelineInstance::new(reference);
        let lifetime = Duration::from_millis(self.instance_timeout_ms);

        let driven = tokio::time::timeout(lifetime, self.drive(&mut instance, cancel)).await;
        let flow = match driven {
            Ok(Ok(flow)) => flow,
            Ok(Err(e)) => {
                tracing::error!(
                    identity = %instance.reference().identity(),
                    "Pipeline driver error: {}",
                    e
                );
                instance.abort(e.to_string());
                Flow::Finished(failed_status(&instance))
            }
            Err(_) => {
                let event = PipelineEvent::TimedOut {
                    after_ms: self.instance_timeout_ms,
                };
                if let Err(e) = instance.apply(event) {
                    instance.abort(e.to_string());
                }
                Flow::Finished(failed_status(&instance))
            }
        };

        let report = instance.report(matches!(flow, Flow::Cancelled));
        log_outcome(&report);
        if let Flow::Finished(Some(status)) = flow {
            self.record_best_effort(&report.identity, status).await;
        }
        report
    }

    async fn drive(
        &self,
        instance: &mut PipelineInstance,
        cancel: &CancellationToken,
    ) -> Result<Flow, TransitionError> {
        if cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }
        instance.apply(PipelineEvent::Start)?;
        let reference = instance.reference().clone();
        let identity = reference.identity();

        // Validate: deterministic, never retried.
        instance.attempts.bump(Stage::Validate);
        let validation = self.validator.validate(&reference);
        tracing::debug!(identity = %identity, payload = ?validation.to_payload(), "validate");
        if let Some(error) = validation.error() {
            instance.note_failure(Stage::Validate, 1, &error);
            instance.apply(PipelineEvent::ValidationRejected {
                reason: validation.reason.unwrap_or_else(|| error.to_string()),
            })?;
            return Ok(Flow::Finished(Some(ImageStatus::Invalid)));
        }
        instance.apply(PipelineEvent::ValidationPassed)?;

        // Transform
        let target = self.target;
        let transformed = self
            .with_retry(instance, Stage::Transform, cancel, || {
                let reference = &reference;
                async move {
                    let outcome = self.transformer.transform(reference, target).await;
                    tracing::debug!(
                        identity = %reference.identity(),
                        payload = ?outcome.to_payload(),
                        "transform"
                    );
                    outcome.into_result()
                }
            })
            .await;
        match transformed {
            Attempted::Done(destination) => {
                instance.apply(PipelineEvent::TransformSucceeded { destination })?;
            }
            Attempted::GaveUp(error) => {
                instance.apply(PipelineEvent::TransformFailed { error })?;
                return Ok(Flow::Finished(Some(ImageStatus::Failed)));
            }
            Attempted::Cancelled => return Ok(Flow::Cancelled),
        }

        // Record. The resized image stays in place whatever happens here, and
        // a store that just exhausted its budget gets no further write.
        let recorded = self
            .with_retry(instance, Stage::Record, cancel, || {
                self.recorder.record(identity, ImageStatus::Resized)
            })
            .await;
        match recorded {
            Attempted::Done(()) => instance.apply(PipelineEvent::MetadataRecorded)?,
            Attempted::GaveUp(error) => instance.apply(PipelineEvent::MetadataFailed { error })?,
            Attempted::Cancelled => return Ok(Flow::Cancelled),
        };

        Ok(Flow::Finished(None))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, spends
    /// the attempt budget, or `cancel` fires. Cancellation is only observed
    /// between attempts; a running stage is never interrupted.
    async fn with_retry<T, F, Fut>(
        &self,
        instance: &mut PipelineInstance,
        stage: Stage,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        loop {
            if cancel.is_cancelled() {
                return Attempted::Cancelled;
            }

            let attempt = instance.attempts.bump(stage);
            let error = match op().await {
                Ok(value) => return Attempted::Done(value),
                Err(error) => error,
            };
            instance.note_failure(stage, attempt, &error);

            if !self.retry.should_retry(attempt, &error) {
                if is_retryable(&error) {
                    tracing::warn!(
                        identity = %instance.reference().identity(),
                        "{} failed after {} attempts: {}",
                        stage,
                        attempt,
                        error
                    );
                }
                return Attempted::GaveUp(error);
            }

            let delay = self.retry.delay_after(attempt);
            tracing::warn!(
                identity = %instance.reference().identity(),
                "{} attempt {}/{} failed, retrying in {:?}: {}",
                stage,
                attempt,
                self.retry.max_attempts,
                delay,
                error
            );

            tokio::select! {
                _ = cancel.cancelled() => return Attempted::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Single-attempt status write for terminal failures. The outcome is
    /// already decided, so a store error or a slow store is only logged.
    async fn record_best_effort(&self, identity: &str, status: ImageStatus) {
        let write = self.recorder.record(identity, status);
        match tokio::time::timeout(self.status_write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Could not record {} status for {}: {}", status, identity, e)
            }
            Err(_) => tracing::warn!(
                "Gave up recording {} status for {} after {:?}",
                status,
                identity,
                self.status_write_timeout
            ),
        }
    }
}

/// `Failed` if the instance was forced into it, for the status write.
fn failed_status(instance: &PipelineInstance) -> Option<ImageStatus> {
    (instance.state() == PipelineState::Failed).then_some(ImageStatus::Failed)
}

fn log_outcome(report: &PipelineReport) {
    let error = report.error.as_deref().unwrap_or("");
    match report.state {
        PipelineState::Completed => tracing::info!(
            identity = %report.identity,
            elapsed_ms = report.elapsed_ms,
            "Completed: {}",
            report
                .destination
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default()
        ),
        PipelineState::Invalid => {
            tracing::warn!(identity = %report.identity, "Invalid: {}", error)
        }
        PipelineState::Failed => {
            tracing::error!(identity = %report.identity, "Failed: {}", error)
        }
        state => tracing::info!(
            identity = %report.identity,
            "Stopped in {} (cancelled: {})",
            state,
            report.cancelled
        ),
    }
}
