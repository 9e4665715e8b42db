//! Drives a scenario's turns strictly in order.
//!
//! The sequencer threads session state between turns exactly as the
//! platform would: one fresh session id for the whole scenario, the "new"
//! flag only on the first turn, and the attributes returned by turn N
//! deep-copied into the request of turn N+1. A handler error or violated
//! expectation fails the scenario at that turn; later turns are never
//! dispatched.

use std::sync::Arc;

use serde_json::Map;
use tracing::debug;
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::expect::{AssertionEngine, CheckContext};
use crate::handler::{self, SkillHandler};
use crate::locale::LocaleService;
use crate::persistence::{AttributeStore, PersistenceMock};
use crate::response;
use crate::scenario::Scenario;

/// Where the sequencer currently is within its scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Waiting to dispatch turn `i` (0-based).
    Pending(usize),
    /// Turn `i` is in flight.
    Running(usize),
    /// All `n` turns passed.
    Passed(usize),
    Failed,
}

/// Runs one scenario against one harness configuration.
pub struct Sequencer<'a> {
    handler: &'a dyn SkillHandler,
    engine: &'a AssertionEngine,
    config: &'a HarnessConfig,
    persistence: Option<&'a Arc<PersistenceMock>>,
    locale: Option<&'a LocaleService>,
    state: SequencerState,
}

impl<'a> Sequencer<'a> {
    pub(crate) fn new(
        handler: &'a dyn SkillHandler,
        engine: &'a AssertionEngine,
        config: &'a HarnessConfig,
        persistence: Option<&'a Arc<PersistenceMock>>,
        locale: Option<&'a LocaleService>,
    ) -> Self {
        Self {
            handler,
            engine,
            config,
            persistence,
            locale,
            state: SequencerState::Pending(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Run every turn in order, stopping at the first handler error or
    /// violated expectation.
    pub async fn run(&mut self, scenario: Scenario) -> Result<()> {
        if scenario.is_empty() {
            self.state = SequencerState::Failed;
            return Err(HarnessError::Setup("scenario has no turns".to_string()));
        }

        let total = scenario.len();
        let session_id = format!("SessionId.{}", Uuid::new_v4());
        let mut attributes = Map::new();

        for (index, turn) in scenario.turns.into_iter().enumerate() {
            self.state = SequencerState::Running(index);
            let position = index + 1;

            let mut request = turn.request;
            request.session.session_id = session_id.clone();
            request.session.new = index == 0;
            // Deep copy: aliasing a shared attributes object between turns
            // would let a handler's in-place edits leak backward.
            request.session.attributes = attributes.clone();
            let request_type = request.type_label().to_string();

            debug!(position, request_type = %request_type, "dispatching turn");
            if let Some(mock) = self.persistence {
                mock.begin_turn(turn.prior_persisted_state);
            }
            let store = self
                .persistence
                .map(|mock| Arc::clone(mock) as Arc<dyn AttributeStore>);

            let raw = match handler::invoke(self.handler, request, store).await {
                Ok(raw) => raw,
                Err(source) => {
                    self.state = SequencerState::Failed;
                    return Err(HarnessError::Handler {
                        position,
                        request_type,
                        source,
                    });
                }
            };
            let response = match response::normalize(raw, position, &request_type) {
                Ok(response) => response,
                Err(err) => {
                    self.state = SequencerState::Failed;
                    return Err(err);
                }
            };

            let stored = self
                .persistence
                .and_then(|mock| mock.captured_attributes());
            let ctx = CheckContext {
                position,
                request_type: &request_type,
                response: &response,
                expect: &turn.expect,
                stored_attributes: stored.as_ref(),
                checks: &self.config.checks,
                locale: self.locale,
            };
            let mut failures = self.engine.evaluate(&ctx, self.config.failure_policy);
            if !failures.is_empty() {
                self.state = SequencerState::Failed;
                return Err(if failures.len() == 1 {
                    HarnessError::Assertion(failures.remove(0))
                } else {
                    HarnessError::Assertions(failures)
                });
            }

            attributes = response.session_attributes;
            self.state = SequencerState::Pending(index + 1);
        }

        self.state = SequencerState::Passed(total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::handler::{HandlerCallback, HandlerContext, HandlerSignal};
    use crate::request::{RequestEnvelope, RequestFactory};
    use crate::scenario::Turn;

    use super::*;

    /// Records what the handler observed each turn, echoes the session
    /// attributes back with a per-turn counter added.
    struct Recording {
        sessions: Mutex<Vec<(String, bool, Value)>>,
    }

    fn recording_handler(
        recording: Arc<Recording>,
    ) -> impl Fn(RequestEnvelope, HandlerContext, HandlerCallback, bool) -> anyhow::Result<HandlerSignal>
    {
        move |request, _ctx, _cb, _test| {
            let mut attributes = request.session.attributes.clone();
            let turn_count = attributes
                .get("turns")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                + 1;
            attributes.insert("turns".to_string(), json!(turn_count));
            recording.sessions.lock().push((
                request.session.session_id.clone(),
                request.session.new,
                Value::Object(request.session.attributes.clone()),
            ));
            Ok(HandlerSignal::Value(json!({
                "response": { "shouldEndSession": false },
                "sessionAttributes": attributes
            })))
        }
    }

    fn scenario(turns: usize) -> Scenario {
        let config = HarnessConfig::default();
        let factory = RequestFactory::new(&config);
        Scenario::new(
            (0..turns)
                .map(|_| Turn::new(factory.intent_request("HelloWorldIntent", &[])))
                .collect(),
        )
    }

    #[tokio::test]
    async fn threads_attributes_and_session_identity() {
        let recording = Arc::new(Recording {
            sessions: Mutex::new(Vec::new()),
        });
        let handler = recording_handler(Arc::clone(&recording));
        let engine = AssertionEngine::new();
        let config = HarnessConfig::default();
        let mut sequencer = Sequencer::new(&handler, &engine, &config, None, None);

        sequencer.run(scenario(3)).await.unwrap();
        assert_eq!(sequencer.state(), SequencerState::Passed(3));

        let sessions = recording.sessions.lock();
        assert_eq!(sessions.len(), 3);
        // One session id for the whole scenario, "new" only on turn 1.
        assert_eq!(sessions[0].0, sessions[1].0);
        assert_eq!(sessions[1].0, sessions[2].0);
        assert!(sessions[0].1);
        assert!(!sessions[1].1);
        assert!(!sessions[2].1);
        // Turn N input attributes equal turn N-1 output attributes.
        assert_eq!(sessions[0].2, json!({}));
        assert_eq!(sessions[1].2, json!({ "turns": 1 }));
        assert_eq!(sessions[2].2, json!({ "turns": 2 }));
    }

    #[tokio::test]
    async fn failed_turn_stops_dispatch() {
        let recording = Arc::new(Recording {
            sessions: Mutex::new(Vec::new()),
        });
        let handler = recording_handler(Arc::clone(&recording));
        let engine = AssertionEngine::new();
        let config = HarnessConfig::default();

        let factory = RequestFactory::new(&config);
        let turns = vec![
            Turn::new(factory.intent_request("HelloWorldIntent", &[])),
            Turn::new(factory.intent_request("HelloWorldIntent", &[])).says("never said"),
            Turn::new(factory.intent_request("HelloWorldIntent", &[])),
        ];

        let mut sequencer = Sequencer::new(&handler, &engine, &config, None, None);
        let err = sequencer.run(Scenario::new(turns)).await.unwrap_err();
        assert_eq!(sequencer.state(), SequencerState::Failed);
        assert!(err.to_string().starts_with("Turn #2 (HelloWorldIntent)"));
        // The third turn was never dispatched.
        assert_eq!(recording.sessions.lock().len(), 2);
    }

    #[tokio::test]
    async fn handler_error_is_attributed_to_its_turn() {
        let handler = |request: RequestEnvelope, _ctx, _cb, _test| {
            if request.session.new {
                Ok(HandlerSignal::Value(
                    json!({ "response": { "shouldEndSession": false }, "sessionAttributes": {} }),
                ))
            } else {
                Err(anyhow::anyhow!("boom"))
            }
        };
        let engine = AssertionEngine::new();
        let config = HarnessConfig::default();
        let mut sequencer = Sequencer::new(&handler, &engine, &config, None, None);
        let err = sequencer.run(scenario(2)).await.unwrap_err();
        match err {
            HarnessError::Handler {
                position,
                request_type,
                ..
            } => {
                assert_eq!(position, 2);
                assert_eq!(request_type, "HelloWorldIntent");
            }
            other => panic!("expected handler error, got {other}"),
        }
    }

    #[tokio::test]
    async fn empty_scenario_is_a_setup_error() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| Ok(HandlerSignal::Pending);
        let engine = AssertionEngine::new();
        let config = HarnessConfig::default();
        let mut sequencer = Sequencer::new(&handler, &engine, &config, None, None);
        let err = sequencer.run(Scenario::new(Vec::new())).await.unwrap_err();
        assert!(matches!(err, HarnessError::Setup(_)));
    }

    #[tokio::test]
    async fn malformed_response_is_reported() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| {
            Ok(HandlerSignal::Value(json!({ "response": "not an object" })))
        };
        let engine = AssertionEngine::new();
        let config = HarnessConfig::default();
        let mut sequencer = Sequencer::new(&handler, &engine, &config, None, None);
        let err = sequencer.run(scenario(1)).await.unwrap_err();
        assert!(matches!(err, HarnessError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn collect_all_reports_every_violation() {
        let handler = |_request: RequestEnvelope, _ctx, _cb, _test| {
            Ok(HandlerSignal::Value(json!({
                "response": { "shouldEndSession": false },
                "sessionAttributes": {}
            })))
        };
        let engine = AssertionEngine::new();
        let config = HarnessConfig::default()
            .with_failure_policy(crate::config::FailurePolicy::CollectAll);
        let factory = RequestFactory::new(&config);
        let turns = vec![
            Turn::new(factory.launch_request())
                .says("missing")
                .should_end_session(true),
        ];
        let mut sequencer = Sequencer::new(&handler, &engine, &config, None, None);
        let err = sequencer.run(Scenario::new(turns)).await.unwrap_err();
        assert_eq!(err.assertion_failures().len(), 2);
    }
}
