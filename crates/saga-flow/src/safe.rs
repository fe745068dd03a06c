use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::TaskError;
use crate::task::Task;

const MAX_TRACE_BYTES: usize = 64 << 10;

/// Converts panics raised by the wrapped task into [`TaskError::Panicked`].
///
/// Both `execute` and `compensate` are guarded. A normal error return passes
/// through untouched. Only unwinding panics are covered: a process built with
/// `panic = "abort"`, a panic while already panicking, or a memory fault
/// still terminates the process.
pub struct SafeTask<T> {
    task: T,
}

impl<T: Task> SafeTask<T> {
    #[must_use]
    pub fn new(task: T) -> Self {
        Self { task }
    }

    pub fn into_inner(self) -> T {
        self.task
    }
}

#[async_trait]
impl<T: Task> Task for SafeTask<T> {
    fn id(&self) -> String {
        self.task.id()
    }

    fn name(&self) -> String {
        self.task.name()
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        guard(&self.task.name(), self.task.execute(ctx)).await
    }

    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        guard(&self.task.name(), self.task.compensate(ctx)).await
    }
}

async fn guard<F>(task: &str, call: F) -> Result<(), TaskError>
where
    F: Future<Output = Result<(), TaskError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let error = panic_error(payload.as_ref());
            warn!(task, "recovered panic");
            Err(error)
        }
    }
}

/// Turn a caught panic payload into a diagnostic error with a bounded trace.
pub(crate) fn panic_error(payload: &(dyn Any + Send)) -> TaskError {
    TaskError::Panicked {
        message: panic_message(payload),
        trace: capture_trace(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

fn capture_trace() -> String {
    let mut trace = Backtrace::force_capture().to_string();
    if trace.len() > MAX_TRACE_BYTES {
        let mut end = MAX_TRACE_BYTES;
        while !trace.is_char_boundary(end) {
            end -= 1;
        }
        trace.truncate(end);
    }
    trace
}
