use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{SagaError, TaskError};
use crate::task::Task;

/// Execute a task tree and compensate it if the forward run fails.
///
/// The same context is used for both passes, so a cancelled context makes
/// the compensation of concurrent groups report cancellation per child.
///
/// # Errors
///
/// Returns `SagaError::StepFailed` if the task fails and its compensation
/// succeeds, or `SagaError::CompensationFailed` if the compensation fails too.
pub async fn run_saga<T>(task: &T, ctx: &CancellationToken) -> Result<(), SagaError>
where
    T: Task + ?Sized,
{
    let Err(step_error) = task.execute(ctx).await else {
        return Ok(());
    };

    let name = task.name();
    debug!(task = %name, error = %step_error, "saga failed, compensating");

    match task.compensate(ctx).await {
        Ok(()) => Err(SagaError::StepFailed {
            task: name,
            source: step_error,
        }),
        Err(compensation) => {
            let compensation_errors = compensation.into_errors();
            warn!(
                task = %name,
                failures = compensation_errors.len(),
                "saga compensation failed"
            );
            Err(SagaError::CompensationFailed {
                failed_task: name,
                step_error,
                compensation_errors,
            })
        }
    }
}

/// Convenience for [`TaskError`]-returning callers that only need the forward
/// error and treat a failed compensation as an additional cause.
///
/// # Errors
///
/// Returns the forward error, combined with the compensation errors when
/// compensation failed as well.
pub async fn run_saga_flat<T>(task: &T, ctx: &CancellationToken) -> Result<(), TaskError>
where
    T: Task + ?Sized,
{
    match run_saga(task, ctx).await {
        Ok(()) => Ok(()),
        Err(SagaError::StepFailed { source, .. }) => Err(source),
        Err(SagaError::CompensationFailed {
            step_error,
            compensation_errors,
            ..
        }) => TaskError::combine(std::iter::once(step_error).chain(compensation_errors)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct Outcome {
        execute_ok: bool,
        compensate_ok: bool,
        compensations: AtomicU32,
    }

    impl Outcome {
        fn new(execute_ok: bool, compensate_ok: bool) -> Self {
            Self {
                execute_ok,
                compensate_ok,
                compensations: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Task for Outcome {
        fn id(&self) -> String {
            "outcome".to_string()
        }

        fn name(&self) -> String {
            "outcome".to_string()
        }

        async fn execute(&self, _ctx: &CancellationToken) -> Result<(), TaskError> {
            if self.execute_ok {
                Ok(())
            } else {
                Err(TaskError::msg("forward failed"))
            }
        }

        async fn compensate(&self, _ctx: &CancellationToken) -> Result<(), TaskError> {
            self.compensations.fetch_add(1, Ordering::SeqCst);
            if self.compensate_ok {
                Ok(())
            } else {
                Err(TaskError::msg("undo failed"))
            }
        }
    }

    #[tokio::test]
    async fn success_skips_compensation() {
        let task = Outcome::new(true, true);

        assert!(run_saga(&task, &CancellationToken::new()).await.is_ok());
        assert_eq!(task.compensations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_is_compensated() {
        let task = Outcome::new(false, true);

        let err = run_saga(&task, &CancellationToken::new())
            .await
            .expect_err("forward fails");

        assert!(matches!(err, SagaError::StepFailed { ref task, .. } if task == "outcome"));
        assert_eq!(task.compensations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_compensation_is_reported() {
        let task = Outcome::new(false, false);

        let err = run_saga(&task, &CancellationToken::new())
            .await
            .expect_err("forward fails");

        match err {
            SagaError::CompensationFailed {
                failed_task,
                step_error,
                compensation_errors,
            } => {
                assert_eq!(failed_task, "outcome");
                assert_eq!(step_error.to_string(), "forward failed");
                assert_eq!(compensation_errors.len(), 1);
            }
            SagaError::StepFailed { .. } => panic!("expected CompensationFailed error"),
        }
    }

    #[tokio::test]
    async fn flat_variant_combines_both_passes() {
        let task = Outcome::new(false, false);

        let err = run_saga_flat(&task, &CancellationToken::new())
            .await
            .expect_err("forward fails");

        assert_eq!(err.to_string(), "2 errors occurred: forward failed; undo failed");
    }
}
