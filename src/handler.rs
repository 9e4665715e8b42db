//! Skill handler contract and the invocation adapter.
//!
//! A handler may complete in three ways: call the completion callback,
//! return a response value synchronously, or return a deferred future.
//! All three funnel into one one-shot completion slot; the first signal
//! commits the outcome and later signals are ignored.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::persistence::AttributeStore;
use crate::request::RequestEnvelope;

/// A deferred handler outcome.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// What a handler's synchronous body produced.
pub enum HandlerSignal {
    /// Response document produced synchronously.
    Value(Value),
    /// Response will arrive asynchronously through the returned future.
    Deferred(HandlerFuture),
    /// Response will arrive through the context or callback.
    Pending,
}

impl HandlerSignal {
    /// Box a future into a deferred signal.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }
}

/// The skill's entry point, invoked once per turn with the synthetic
/// request, an execution context, a completion callback, and a stable
/// test-mode marker.
pub trait SkillHandler: Send + Sync {
    fn handle(
        &self,
        request: RequestEnvelope,
        context: HandlerContext,
        callback: HandlerCallback,
        test_mode: bool,
    ) -> anyhow::Result<HandlerSignal>;
}

impl<F> SkillHandler for F
where
    F: Fn(RequestEnvelope, HandlerContext, HandlerCallback, bool) -> anyhow::Result<HandlerSignal>
        + Send
        + Sync,
{
    fn handle(
        &self,
        request: RequestEnvelope,
        context: HandlerContext,
        callback: HandlerCallback,
        test_mode: bool,
    ) -> anyhow::Result<HandlerSignal> {
        self(request, context, callback, test_mode)
    }
}

type Outcome = anyhow::Result<Value>;

/// One-shot completion guard shared by the context, the callback, and the
/// adapter itself. Only the first `complete` call commits.
#[derive(Clone)]
struct CompletionSlot {
    tx: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl CompletionSlot {
    fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    fn complete(&self, outcome: Outcome) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                // Receiver dropped means the scenario already gave up on
                // this turn; nothing left to report to.
                let _ = tx.send(outcome);
                true
            }
            None => {
                warn!("handler signaled completion more than once; keeping the first outcome");
                false
            }
        }
    }
}

/// Synthetic execution context handed to the handler.
#[derive(Clone)]
pub struct HandlerContext {
    slot: CompletionSlot,
    store: Option<Arc<dyn AttributeStore>>,
}

impl HandlerContext {
    /// Complete the turn with a response document.
    pub fn succeed(&self, response: Value) {
        self.slot.complete(Ok(response));
    }

    /// Complete the turn with an error.
    pub fn fail(&self, error: anyhow::Error) {
        self.slot.complete(Err(error));
    }

    /// The persisted-attribute store, present when the harness configures
    /// one. Handlers address it exactly as they would the real tier.
    #[must_use]
    pub fn store(&self) -> Option<&dyn AttributeStore> {
        self.store.as_deref()
    }
}

/// Completion-callback style handed to the handler alongside the context.
#[derive(Clone)]
pub struct HandlerCallback {
    slot: CompletionSlot,
}

impl HandlerCallback {
    /// Complete the turn, error-first.
    pub fn call(&self, result: anyhow::Result<Value>) {
        self.slot.complete(result);
    }
}

/// Invoke the handler for one turn and resolve exactly once.
pub(crate) async fn invoke(
    handler: &dyn SkillHandler,
    request: RequestEnvelope,
    store: Option<Arc<dyn AttributeStore>>,
) -> anyhow::Result<Value> {
    let (slot, rx) = CompletionSlot::new();
    let context = HandlerContext {
        slot: slot.clone(),
        store,
    };
    let callback = HandlerCallback { slot: slot.clone() };

    trace!(request_type = request.type_label(), "invoking handler");
    match handler.handle(request, context, callback, true) {
        Ok(HandlerSignal::Value(value)) => {
            slot.complete(Ok(value));
        }
        Ok(HandlerSignal::Deferred(future)) => {
            let outcome = future.await;
            slot.complete(outcome);
        }
        Ok(HandlerSignal::Pending) => {}
        Err(err) => {
            slot.complete(Err(err));
        }
    }

    // Release the adapter's hold on the sender so a handler that dropped
    // its context and callback without completing surfaces as an error
    // instead of hanging the turn.
    drop(slot);

    match rx.await {
        Ok(outcome) => outcome,
        Err(_) => Err(anyhow!("handler completed without producing a response")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::HarnessConfig;
    use crate::request::RequestFactory;

    use super::*;

    fn launch() -> RequestEnvelope {
        let config = HarnessConfig::default();
        RequestFactory::new(&config).launch_request()
    }

    fn response_value() -> Value {
        json!({ "response": { "shouldEndSession": true }, "sessionAttributes": {} })
    }

    #[tokio::test]
    async fn sync_value_resolves() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| {
            Ok(HandlerSignal::Value(response_value()))
        };
        let value = invoke(&handler, launch(), None).await.unwrap();
        assert_eq!(value["response"]["shouldEndSession"], true);
    }

    #[tokio::test]
    async fn callback_resolves() {
        let handler =
            |_request: RequestEnvelope, _ctx, callback: HandlerCallback, _test| {
                callback.call(Ok(response_value()));
                Ok(HandlerSignal::Pending)
            };
        let value = invoke(&handler, launch(), None).await.unwrap();
        assert_eq!(value["response"]["shouldEndSession"], true);
    }

    #[tokio::test]
    async fn context_succeed_resolves() {
        let handler = |_request: RequestEnvelope, ctx: HandlerContext, _cb, _test| {
            ctx.succeed(response_value());
            Ok(HandlerSignal::Pending)
        };
        assert!(invoke(&handler, launch(), None).await.is_ok());
    }

    #[tokio::test]
    async fn deferred_future_resolves() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| {
            Ok(HandlerSignal::deferred(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok(response_value())
            }))
        };
        assert!(invoke(&handler, launch(), None).await.is_ok());
    }

    #[tokio::test]
    async fn callback_from_spawned_task_resolves() {
        let handler =
            |_request: RequestEnvelope, _ctx, callback: HandlerCallback, _test| {
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    callback.call(Ok(response_value()));
                });
                Ok(HandlerSignal::Pending)
            };
        assert!(invoke(&handler, launch(), None).await.is_ok());
    }

    #[tokio::test]
    async fn first_resolution_wins_over_returned_value() {
        let handler =
            |_request: RequestEnvelope, _ctx, callback: HandlerCallback, _test| {
                callback.call(Ok(json!({ "response": {}, "sessionAttributes": { "first": true } })));
                Ok(HandlerSignal::Value(
                    json!({ "response": {}, "sessionAttributes": { "first": false } }),
                ))
            };
        let value = invoke(&handler, launch(), None).await.unwrap();
        assert_eq!(value["sessionAttributes"]["first"], true);
    }

    #[tokio::test]
    async fn handler_error_rejects() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| -> anyhow::Result<HandlerSignal> {
            Err(anyhow!("boom"))
        };
        let err = invoke(&handler, launch(), None).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn callback_error_rejects() {
        let handler =
            |_request: RequestEnvelope, _ctx, callback: HandlerCallback, _test| {
                callback.call(Err(anyhow!("rejected")));
                Ok(HandlerSignal::Pending)
            };
        let err = invoke(&handler, launch(), None).await.unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }

    #[tokio::test]
    async fn never_resolving_handler_surfaces_as_error() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| Ok(HandlerSignal::Pending);
        let err = invoke(&handler, launch(), None).await.unwrap_err();
        assert!(err.to_string().contains("without producing a response"));
    }

    #[tokio::test]
    async fn test_mode_marker_is_set() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, test_mode: bool| {
            assert!(test_mode);
            Ok(HandlerSignal::Value(response_value()))
        };
        invoke(&handler, launch(), None).await.unwrap();
    }
}
