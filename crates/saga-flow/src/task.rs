use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// A unit of work that can be executed and compensated.
///
/// Every task declares both a forward action and the action that undoes it.
/// Combinators ([`crate::PipelineTask`], [`crate::ParallelTask`],
/// [`crate::RetryTask`], [`crate::SafeTask`]) are tasks themselves, so they
/// nest arbitrarily.
///
/// The cancellation token is the execution context. Tasks are expected to
/// observe it cooperatively; nothing in this crate preempts a running task.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable identity, derived from code or content rather than from state.
    fn id(&self) -> String;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> String;

    /// Run the forward action.
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails to complete.
    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError>;

    /// Undo the effects of [`Task::execute`].
    ///
    /// Called during rollback, including after the task's own `execute`
    /// failed, so it must cope with partially applied work.
    ///
    /// The default implementation is a no-op, suitable for read-only tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let _ = ctx;
        Ok(())
    }
}

#[async_trait]
impl<T> Task for Arc<T>
where
    T: Task + ?Sized,
{
    fn id(&self) -> String {
        (**self).id()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        (**self).execute(ctx).await
    }

    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        (**self).compensate(ctx).await
    }
}

#[async_trait]
impl<T> Task for Box<T>
where
    T: Task + ?Sized,
{
    fn id(&self) -> String {
        (**self).id()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        (**self).execute(ctx).await
    }

    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        (**self).compensate(ctx).await
    }
}
