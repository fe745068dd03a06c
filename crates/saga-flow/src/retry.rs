use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backoff::Backoff;
use crate::error::TaskError;
use crate::options::{RetryOptions, RetryPolicy};
use crate::task::Task;

/// Retries the forward action of the wrapped task.
///
/// The first retry runs immediately and later ones follow a [`Backoff`]
/// schedule whose growth is capped at twice the configured interval, however
/// many attempts are allowed. Compensation is passed through without
/// retrying.
///
/// Retries only happen with [`RetryPolicy::Retry`], at least two attempts and
/// a non-zero interval; otherwise the first failure is returned unchanged.
pub struct RetryTask<T> {
    task: T,
    name: Option<String>,
    attempts: u32,
    interval: Duration,
    policy: RetryPolicy,
}

impl<T: Task> RetryTask<T> {
    #[must_use]
    pub fn new(task: T, options: RetryOptions) -> Self {
        Self {
            task,
            name: options.name,
            attempts: options.attempts,
            interval: options.interval,
            policy: options.policy,
        }
    }

    fn retries_enabled(&self) -> bool {
        self.policy == RetryPolicy::Retry && self.attempts >= 2 && !self.interval.is_zero()
    }
}

#[async_trait]
impl<T: Task> Task for RetryTask<T> {
    fn id(&self) -> String {
        self.task.id()
    }

    fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.task.name())
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let first = match self.task.execute(ctx).await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        if !self.retries_enabled() {
            return Err(first);
        }

        let task = self.name();
        let mut backoff = Backoff::bounded(self.interval, self.attempts);
        let mut failures = vec![first];
        let mut delay = Duration::ZERO;

        for attempt in 1..=self.attempts {
            debug!(task = %task, attempt, ?delay, "scheduling retry");

            tokio::select! {
                biased;
                () = ctx.cancelled() => {
                    debug!(task = %task, attempt, "retry cancelled");
                    return Err(TaskError::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }

            match self.task.execute(ctx).await {
                Ok(()) => {
                    debug!(task = %task, attempt, "retry succeeded");
                    return Ok(());
                }
                Err(error) => failures.push(TaskError::Retry {
                    attempt,
                    error: Box::new(error),
                }),
            }

            delay = backoff.next().unwrap_or(self.interval);
        }

        debug!(task = %task, attempts = self.attempts, "retries exhausted");
        Err(TaskError::Multiple(failures))
    }

    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        self.task.compensate(ctx).await
    }
}
