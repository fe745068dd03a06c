use uuid::Uuid;

/// Source of process-unique identifiers for unnamed composite tasks.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Hex-encoded UUIDv7 tokens, ordered by creation time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeOrderedIds;

impl IdSource for TimeOrderedIds {
    fn next_id(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}

impl<F> IdSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}
