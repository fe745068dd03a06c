use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::options::GroupOptions;
use crate::safe::panic_error;
use crate::sync::lock;
use crate::task::Task;

const NAME_PREFIX: &str = "parallel-task-";

/// Runs its children concurrently, one tokio task per child.
///
/// The first failure cancels a token shared by all children of the run, so
/// children that have not started yet are skipped. Children already running
/// are not interrupted. Compensation runs concurrently over every child whose
/// forward action was entered, including the one that failed.
///
/// Both `execute` and `compensate` spawn onto the ambient tokio runtime.
pub struct ParallelTask {
    id: String,
    name: String,
    tasks: Vec<Arc<dyn Task>>,
    executed: Arc<Mutex<Vec<Arc<dyn Task>>>>,
}

impl ParallelTask {
    #[must_use]
    pub fn new(options: GroupOptions) -> Self {
        let (id, name, tasks) = options.resolve(NAME_PREFIX);
        Self {
            id,
            name,
            tasks,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Names of the children entered by any `execute` so far, in the order
    /// they first started. The set only grows; repeated runs never drop a
    /// child that must still be compensated.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).iter().map(|task| task.name()).collect()
    }
}

/// Holds the first failure of a run and cancels the run when it is set.
struct FirstFailure {
    slot: Mutex<Option<TaskError>>,
    cancel: CancellationToken,
}

impl FirstFailure {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            slot: Mutex::new(None),
            cancel,
        }
    }

    fn offer(&self, task: &str, error: TaskError) {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            warn!(task, %error, "discarding failure after the first one");
            return;
        }
        debug!(task, %error, "first failure, cancelling remaining children");
        *slot = Some(error);
        self.cancel.cancel();
    }

    fn take(&self) -> Option<TaskError> {
        lock(&self.slot).take()
    }
}

/// Add a child to the executed set unless an earlier run already entered it.
fn record_entered(executed: &Mutex<Vec<Arc<dyn Task>>>, task: &Arc<dyn Task>) {
    let mut executed = lock(executed);
    if !executed.iter().any(|entered| Arc::ptr_eq(entered, task)) {
        executed.push(Arc::clone(task));
    }
}

fn join_failure(error: JoinError) -> TaskError {
    if error.is_panic() {
        panic_error(error.into_panic().as_ref())
    } else {
        TaskError::Cancelled
    }
}

#[async_trait]
impl Task for ParallelTask {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let run = ctx.child_token();
        let failure = Arc::new(FirstFailure::new(run.clone()));

        debug!(task = %self.name, children = self.tasks.len(), "running parallel group");

        let mut children = JoinSet::new();
        for task in &self.tasks {
            let task = Arc::clone(task);
            let run = run.clone();
            let failure = Arc::clone(&failure);
            let executed = Arc::clone(&self.executed);
            children.spawn(async move {
                if run.is_cancelled() {
                    debug!(task = %task.name(), "skipped, group already cancelled");
                    return;
                }
                record_entered(&executed, &task);
                if let Err(error) = task.execute(&run).await {
                    failure.offer(&task.name(), error);
                }
            });
        }

        while let Some(joined) = children.join_next().await {
            if let Err(error) = joined {
                failure.offer(&self.name, join_failure(error));
            }
        }
        run.cancel();

        failure.take().map_or(Ok(()), Err)
    }

    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let executed = lock(&self.executed).clone();
        debug!(task = %self.name, children = executed.len(), "compensating parallel group");

        let mut children = JoinSet::new();
        for task in executed {
            let ctx = ctx.clone();
            children.spawn(async move {
                if ctx.is_cancelled() {
                    return Err(TaskError::Cancelled);
                }
                task.compensate(&ctx).await
            });
        }

        let mut errors = Vec::new();
        while let Some(joined) = children.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(error)) => errors.push(error),
                Err(error) => errors.push(join_failure(error)),
            }
        }

        TaskError::combine(errors)
    }
}
