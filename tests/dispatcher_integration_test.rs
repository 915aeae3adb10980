//! Dispatch through a built system context, including handlers guarded by
//! circuit breakers

mod common;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tasker_relay::models::Task;
use tasker_relay::registry::{handler_fn, DispatchError, TaskHandler};
use tasker_relay::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
use tasker_relay::test_helpers::{FailingHandler, RecordingHandler};
use tasker_relay::TaskerError;

#[derive(Debug, thiserror::Error)]
#[error("quota exhausted for {account}")]
struct QuotaExhausted {
    account: String,
}

/// Calls a flaky upstream through the context's shared breaker
struct GuardedUpstreamHandler {
    breaker: CircuitBreaker,
}

#[async_trait]
impl TaskHandler for GuardedUpstreamHandler {
    async fn handle(&self, task: &Task) -> anyhow::Result<()> {
        let healthy = task.context["healthy"].as_bool().unwrap_or(false);
        self.breaker
            .call(|| async move {
                if healthy {
                    Ok::<(), anyhow::Error>(())
                } else {
                    Err(anyhow::anyhow!("upstream unavailable"))
                }
            })
            .await
            .map_err(|err| match err {
                CircuitBreakerError::OperationFailed(inner) => inner,
                other => anyhow::anyhow!(other.to_string()),
            })
    }
}

#[tokio::test]
async fn test_each_type_reaches_only_its_handler() {
    let ocr = RecordingHandler::new();
    let summarize = RecordingHandler::new();
    let (builder, _, _) = common::context_builder();
    let context = builder
        .register_handler("ocr", ocr.clone())
        .unwrap()
        .register_handler("summarize", summarize.clone())
        .unwrap()
        .build();

    context.dispatch(&Task::new("ocr")).await.unwrap();
    context.dispatch(&Task::new("ocr")).await.unwrap();
    context.dispatch(&Task::new("summarize")).await.unwrap();

    assert_eq!(ocr.invocation_count(), 2);
    assert_eq!(summarize.invocation_count(), 1);
}

#[tokio::test]
async fn test_unknown_type_invokes_nothing() {
    let ocr = RecordingHandler::new();
    let (builder, _, _) = common::context_builder();
    let context = builder.register_handler("ocr", ocr.clone()).unwrap().build();

    let err = context.dispatch(&Task::new("transcribe")).await.unwrap_err();

    assert_eq!(ocr.invocation_count(), 0);

    let routing = err.downcast::<DispatchError>().unwrap();
    assert!(matches!(routing, DispatchError::NoHandler { ref task_type } if task_type.as_str() == "transcribe"));

    let wrapped: TaskerError = routing.into();
    assert!(wrapped.to_string().contains("transcribe"));
}

#[tokio::test]
async fn test_handler_error_object_is_returned_unchanged() {
    let (builder, _, _) = common::context_builder();
    let context = builder
        .register_handler(
            "bill",
            handler_fn(|task: Task| async move {
                Err::<(), _>(anyhow::Error::new(QuotaExhausted {
                    account: task.context["account"].as_str().unwrap_or_default().to_string(),
                }))
            }),
        )
        .unwrap()
        .register_handler("refund", FailingHandler::new("ledger locked"))
        .unwrap()
        .build();

    let err = context
        .dispatch(&Task::with_context("bill", json!({ "account": "acme" })))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "quota exhausted for acme");
    assert!(err.downcast_ref::<DispatchError>().is_none());
    let quota = err.downcast_ref::<QuotaExhausted>().unwrap();
    assert_eq!(quota.account, "acme");

    let err = context.dispatch(&Task::new("refund")).await.unwrap_err();
    assert_eq!(err.to_string(), "ledger locked");
    assert!(err.downcast_ref::<DispatchError>().is_none());
}

#[tokio::test]
async fn test_concurrent_dispatch_from_shared_context() {
    let handler = RecordingHandler::new();
    let (builder, _, _) = common::context_builder();
    let context = Arc::new(builder.register_handler("ocr", handler.clone()).unwrap().build());

    let dispatches = (0..32).map(|_| {
        let context = Arc::clone(&context);
        tokio::spawn(async move { context.dispatch(&Task::new("ocr")).await })
    });
    for joined in join_all(dispatches).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(handler.invocation_count(), 32);
}

#[tokio::test]
async fn test_breaker_guarded_handler_fails_fast_when_open() {
    let (builder, store, clock) = common::context_builder();
    let breaker = CircuitBreaker::builder("upstream", store).clock(clock).build();
    let context = builder
        .register_handler("fetch", GuardedUpstreamHandler { breaker })
        .unwrap()
        .build();

    let failing = Task::with_context("fetch", json!({ "healthy": false }));
    for _ in 0..5 {
        let err = context.dispatch(&failing).await.unwrap_err();
        assert_eq!(err.to_string(), "upstream unavailable");
    }

    // The context's registry reads the same keys from the shared store
    let shared_view = context.circuit_breaker("upstream").await;
    assert_eq!(shared_view.current_state().await.unwrap(), CircuitState::Open);

    let healthy = Task::with_context("fetch", json!({ "healthy": true }));
    let err = context.dispatch(&healthy).await.unwrap_err();
    assert_eq!(err.to_string(), "Circuit breaker 'upstream' is open, call rejected");
}
