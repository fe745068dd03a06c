use thiserror::Error;

/// Boxed error produced by task logic outside this crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by a task's `execute` or `compensate`.
///
/// A single value may stand for one failure or for many (see
/// [`TaskError::Multiple`]), so callers always receive exactly one error from
/// any top-level call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// The task's own logic reported a failure.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// The task panicked and the panic was caught by [`crate::SafeTask`] or by
    /// a parallel group joining its children.
    #[error("[recovered panic] {message}\ntrace:\n{trace}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
        /// Stack trace captured at the recovery boundary (at most 64 KiB).
        trace: String,
    },

    /// A retry attempt failed. The initial attempt is never wrapped.
    #[error("retry #{attempt} failed: {error}")]
    Retry {
        /// One-based retry number.
        attempt: u32,
        /// Error returned by that attempt.
        #[source]
        error: Box<TaskError>,
    },

    /// Several failures reported together.
    #[error("{} errors occurred: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<TaskError>),

    /// The execution context was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

fn join_errors(errors: &[TaskError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl TaskError {
    /// Wrap any error produced by task logic.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(error.into())
    }

    /// Build a task failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Failed(message.into())
    }

    /// Fold zero, one or many errors into a single result.
    ///
    /// Nested [`TaskError::Multiple`] values are flattened so aggregates
    /// built from aggregates stay one level deep.
    ///
    /// # Errors
    ///
    /// Returns the only error when there is one, or [`TaskError::Multiple`]
    /// when there are several.
    pub fn combine(errors: impl IntoIterator<Item = TaskError>) -> Result<(), TaskError> {
        let mut flat = Vec::new();
        for error in errors {
            match error {
                TaskError::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(TaskError::Multiple(flat)),
        }
    }

    /// The individual failures this error stands for.
    #[must_use]
    pub fn errors(&self) -> &[TaskError] {
        match self {
            TaskError::Multiple(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }

    /// Consume the error, returning the individual failures it stands for.
    #[must_use]
    pub fn into_errors(self) -> Vec<TaskError> {
        match self {
            TaskError::Multiple(errors) => errors,
            other => vec![other],
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }
}

/// Error from running a task tree as a saga.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    /// The task failed and its compensation succeeded.
    #[error("task '{task}' failed")]
    StepFailed {
        /// Name of the task that was run.
        task: String,
        /// The error that caused the failure.
        #[source]
        source: TaskError,
    },

    /// The task failed and some compensations also failed.
    #[error("task '{failed_task}' failed, and {} compensation(s) also failed", compensation_errors.len())]
    CompensationFailed {
        /// Name of the task that was run.
        failed_task: String,
        /// The error from the forward run.
        step_error: TaskError,
        /// Errors from failed compensations.
        compensation_errors: Vec<TaskError>,
    },
}
