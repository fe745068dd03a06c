use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TaskError;
use crate::options::GroupOptions;
use crate::sync::lock;
use crate::task::Task;

const NAME_PREFIX: &str = "pipeline-task-";

/// Runs its children one after another, stopping at the first failure.
///
/// Compensation walks back from the last child whose forward action was
/// entered down to the first one, so a failed child is undone too. Every
/// child gets its undo call even when a later one fails; the errors are
/// aggregated.
pub struct PipelineTask {
    id: String,
    name: String,
    tasks: Vec<Arc<dyn Task>>,
    last_entered: Mutex<Option<usize>>,
}

impl PipelineTask {
    #[must_use]
    pub fn new(options: GroupOptions) -> Self {
        let (id, name, tasks) = options.resolve(NAME_PREFIX);
        Self {
            id,
            name,
            tasks,
            last_entered: Mutex::new(None),
        }
    }

    /// Index of the last child entered by `execute`, if any.
    #[must_use]
    pub fn last_entered(&self) -> Option<usize> {
        *lock(&self.last_entered)
    }
}

#[async_trait]
impl Task for PipelineTask {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        *lock(&self.last_entered) = None;
        debug!(task = %self.name, steps = self.tasks.len(), "running pipeline");

        for (index, task) in self.tasks.iter().enumerate() {
            *lock(&self.last_entered) = Some(index);
            if let Err(error) = task.execute(ctx).await {
                debug!(task = %self.name, step = %task.name(), index, %error, "pipeline step failed");
                return Err(error);
            }
        }

        Ok(())
    }

    async fn compensate(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let Some(last) = self.last_entered() else {
            return Ok(());
        };
        debug!(task = %self.name, from = last, "compensating pipeline");

        let mut errors = Vec::new();
        for task in self.tasks.iter().take(last + 1).rev() {
            if let Err(error) = task.compensate(ctx).await {
                debug!(task = %self.name, step = %task.name(), %error, "compensation failed");
                errors.push(error);
            }
        }

        TaskError::combine(errors)
    }
}
