//! # Task Handlers
//!
//! The single-method capability registered per task type.

use crate::models::Task;
use async_trait::async_trait;
use std::future::Future;

/// Async handler invoked by the dispatcher for a task of its registered type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`TaskHandler`].
///
/// The closure receives an owned copy of the dispatched task.
pub struct FnHandler<F> {
    handler: F,
}

/// Wrap an async closure as a [`TaskHandler`]
pub fn handler_fn<F, Fut>(handler: F) -> FnHandler<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnHandler { handler }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, task: &Task) -> anyhow::Result<()> {
        (self.handler)(task.clone()).await
    }
}
