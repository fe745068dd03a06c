use std::any::{TypeId, type_name};
use std::future::Future;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::task::Task;

/// Adapts a forward-only async function into a [`Task`].
///
/// The identity is the hex SHA-256 digest of the function's qualified type
/// name and its type id, so two adapters over the same function share it
/// while captured state plays no part. Every closure has its own type, so
/// closures defined inside the same function get distinct identities even
/// though they report the same name (`path::to::fn::{{closure}}`).
///
/// Compensation is a no-op: wrap the function in a dedicated [`Task`]
/// implementation when it needs an undo.
pub struct FnTask<F> {
    func: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    #[must_use]
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

/// Shorthand for [`FnTask::new`].
#[must_use]
pub fn fn_task<F, Fut>(func: F) -> FnTask<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    FnTask::new(func)
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn id(&self) -> String {
        let mut digest = Sha256::new();
        digest.update(self.name().as_bytes());
        digest.update(format!("{:?}", TypeId::of::<F>()).as_bytes());
        hex::encode(digest.finalize())
    }

    fn name(&self) -> String {
        type_name::<F>().to_string()
    }

    async fn execute(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        (self.func)(ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_bucket(_ctx: CancellationToken) -> Result<(), TaskError> {
        Ok(())
    }

    async fn delete_bucket(_ctx: CancellationToken) -> Result<(), TaskError> {
        Err(TaskError::msg("bucket is not empty"))
    }

    #[test]
    fn same_function_shares_identity() {
        let first = fn_task(create_bucket);
        let second = fn_task(create_bucket);

        assert_eq!(first.id(), second.id());
        assert_eq!(first.id().len(), 64);
    }

    #[test]
    fn different_functions_have_different_identities() {
        assert_ne!(fn_task(create_bucket).id(), fn_task(delete_bucket).id());
    }

    #[test]
    fn closures_in_one_function_have_different_identities() {
        let create = fn_task(|_ctx| async { Ok(()) });
        let remove = fn_task(|_ctx| async { Err(TaskError::msg("remove failed")) });

        assert_eq!(create.name(), remove.name());
        assert_ne!(create.id(), remove.id());
    }

    #[test]
    fn name_is_qualified_function_path() {
        let name = fn_task(create_bucket).name();
        assert!(name.ends_with("func::tests::create_bucket"), "got {name}");
    }

    #[tokio::test]
    async fn execute_delegates_to_function() {
        let ctx = CancellationToken::new();

        assert!(fn_task(create_bucket).execute(&ctx).await.is_ok());
        let err = fn_task(delete_bucket)
            .execute(&ctx)
            .await
            .expect_err("function fails");
        assert_eq!(err.to_string(), "bucket is not empty");
    }

    #[tokio::test]
    async fn compensate_is_a_no_op_even_after_failure() {
        let ctx = CancellationToken::new();
        let task = fn_task(delete_bucket);

        assert!(task.execute(&ctx).await.is_err());
        assert!(task.compensate(&ctx).await.is_ok());
    }
}
