use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::id::{IdSource, TimeOrderedIds};
use crate::task::Task;

/// What a [`crate::RetryTask`] does when the wrapped task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RetryPolicy {
    /// Retry the forward action with backoff.
    #[default]
    Retry,
    /// Do not retry; leave the failure to the enclosing compensation path.
    Revert,
}

/// Options consumed by [`crate::RetryTask::new`].
///
/// Also readable from a configuration table:
///
/// ```toml
/// name = "upload"
/// attempts = 3
/// interval = "250ms"
/// policy = "retry"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RetryOptions {
    pub(crate) name: Option<String>,
    pub(crate) attempts: u32,
    #[serde(deserialize_with = "deserialize_interval")]
    pub(crate) interval: Duration,
    pub(crate) policy: RetryPolicy,
}

impl RetryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Maximum number of retries after the first attempt.
    #[must_use]
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Base delay of the backoff schedule.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn configured_attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn configured_interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn configured_policy(&self) -> RetryPolicy {
        self.policy
    }
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

/// Options consumed by [`crate::ParallelTask::new`] and
/// [`crate::PipelineTask::new`].
pub struct GroupOptions {
    pub(crate) name: Option<String>,
    pub(crate) tasks: Vec<Arc<dyn Task>>,
    pub(crate) ids: Arc<dyn IdSource>,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            name: None,
            tasks: Vec::new(),
            ids: Arc::new(TimeOrderedIds),
        }
    }
}

impl GroupOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name. Defaults to a kind prefix followed by the generated id.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append one child task.
    #[must_use]
    pub fn task(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    /// Append already shared child tasks, keeping their order.
    #[must_use]
    pub fn tasks<I>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Task>>,
    {
        self.tasks.extend(tasks);
        self
    }

    /// Replace the generator used for the composite's identity.
    #[must_use]
    pub fn id_source(mut self, ids: impl IdSource + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Split into identity, display name and children.
    pub(crate) fn resolve(self, prefix: &str) -> (String, String, Vec<Arc<dyn Task>>) {
        let id = self.ids.next_id();
        let name = self.name.unwrap_or_else(|| format!("{prefix}{id}"));
        (id, name, self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_options_default_to_no_retries() {
        let options = RetryOptions::new();

        assert_eq!(options.configured_attempts(), 0);
        assert_eq!(options.configured_interval(), Duration::ZERO);
        assert_eq!(options.configured_policy(), RetryPolicy::Retry);
    }

    #[test]
    fn retry_options_parse_from_toml() -> anyhow::Result<()> {
        let options: RetryOptions = toml::from_str(
            r#"
name = "upload"
attempts = 3
interval = "250ms"
policy = "revert"
"#,
        )?;

        assert_eq!(options.name.as_deref(), Some("upload"));
        assert_eq!(options.configured_attempts(), 3);
        assert_eq!(options.configured_interval(), Duration::from_millis(250));
        assert_eq!(options.configured_policy(), RetryPolicy::Revert);
        Ok(())
    }

    #[test]
    fn retry_options_parse_partial_table() -> anyhow::Result<()> {
        let options: RetryOptions = toml::from_str("attempts = 5")?;

        assert_eq!(options.configured_attempts(), 5);
        assert_eq!(options.configured_interval(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn retry_options_reject_bad_interval() {
        let result: Result<RetryOptions, _> = toml::from_str(r#"interval = "soon""#);
        assert!(result.is_err());
    }

    #[test]
    fn group_options_generate_prefixed_name() {
        let (id, name, tasks) = GroupOptions::new()
            .id_source(|| "abc123".to_string())
            .resolve("pipeline-task-");

        assert_eq!(id, "abc123");
        assert_eq!(name, "pipeline-task-abc123");
        assert!(tasks.is_empty());
    }

    #[test]
    fn group_options_keep_explicit_name() {
        let (_, name, _) = GroupOptions::new().name("provision").resolve("parallel-task-");
        assert_eq!(name, "provision");
    }
}
