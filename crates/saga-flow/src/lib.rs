//! Composable compensating tasks.
//!
//! Every [`Task`] declares a forward action and the action that undoes it.
//! Combinators build new tasks from existing ones and can be nested freely:
//!
//! - [`FnTask`] lifts an async function into a task with a no-op undo.
//! - [`SafeTask`] turns panics into [`TaskError::Panicked`].
//! - [`RetryTask`] retries the forward action with a bounded backoff.
//! - [`ParallelTask`] runs children concurrently and cancels the rest on the
//!   first failure.
//! - [`PipelineTask`] runs children in order and undoes them in reverse.
//!
//! [`run_saga`] executes a task tree and compensates it when it fails.
//!
//! All state lives in the task values themselves; nothing survives the
//! process and nothing is coordinated across processes.

mod backoff;
mod error;
mod func;
mod id;
mod options;
mod parallel;
mod pipeline;
mod retry;
mod safe;
mod saga;
mod sync;
mod task;

pub use backoff::Backoff;
pub use error::{BoxError, SagaError, TaskError};
pub use func::{FnTask, fn_task};
pub use id::{IdSource, TimeOrderedIds};
pub use options::{GroupOptions, RetryOptions, RetryPolicy};
pub use parallel::ParallelTask;
pub use pipeline::PipelineTask;
pub use retry::RetryTask;
pub use safe::SafeTask;
pub use saga::{run_saga, run_saga_flat};
pub use task::Task;

pub use tokio_util::sync::CancellationToken;
