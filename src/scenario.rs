//! Scripted turns and scenarios.
//!
//! A turn pairs one synthetic request with the expectations over its
//! response, plus the persisted state the store should report during the
//! turn. A scenario is an ordered list of turns sharing one session.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::expect::{
    AssertionContext, AttributeExpectation, Expectations, PlaysStream, SpeechExpectation,
};
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;

/// One scripted request/expectation pair.
pub struct Turn {
    pub request: RequestEnvelope,
    pub expect: Expectations,
    /// What the persisted store returns for reads during this turn.
    pub prior_persisted_state: Map<String, Value>,
}

impl Turn {
    #[must_use]
    pub fn new(request: RequestEnvelope) -> Self {
        Self {
            request,
            expect: Expectations::default(),
            prior_persisted_state: Map::new(),
        }
    }

    /// Expect exact speech; accepts a literal or a list of alternatives.
    #[must_use]
    pub fn says(mut self, expected: impl Into<SpeechExpectation>) -> Self {
        self.expect.says = Some(expected.into());
        self
    }

    /// Expect the speech to contain a substring.
    #[must_use]
    pub fn says_like(mut self, expected: impl Into<String>) -> Self {
        self.expect.says_like = Some(expected.into());
        self
    }

    /// Expect no output speech at all.
    #[must_use]
    pub fn says_nothing(mut self) -> Self {
        self.expect.says_nothing = true;
        self
    }

    /// Expect an exact reprompt; accepts a literal or a list of alternatives.
    #[must_use]
    pub fn reprompts(mut self, expected: impl Into<SpeechExpectation>) -> Self {
        self.expect.reprompts = Some(expected.into());
        self
    }

    /// Expect the reprompt to contain a substring.
    #[must_use]
    pub fn reprompts_like(mut self, expected: impl Into<String>) -> Self {
        self.expect.reprompts_like = Some(expected.into());
        self
    }

    /// Expect no reprompt at all.
    #[must_use]
    pub fn reprompts_nothing(mut self) -> Self {
        self.expect.reprompts_nothing = true;
        self
    }

    #[must_use]
    pub fn should_end_session(mut self, expected: bool) -> Self {
        self.expect.should_end_session = Some(expected);
        self
    }

    /// Expect a slot-elicitation directive targeting the named slot.
    #[must_use]
    pub fn elicits_slot(mut self, slot: impl Into<String>) -> Self {
        self.expect.elicits_slot = Some(slot.into());
        self
    }

    /// Expect a slot-confirmation directive targeting the named slot.
    #[must_use]
    pub fn confirms_slot(mut self, slot: impl Into<String>) -> Self {
        self.expect.confirms_slot = Some(slot.into());
        self
    }

    /// Expect an intent-confirmation directive.
    #[must_use]
    pub fn confirms_intent(mut self) -> Self {
        self.expect.confirms_intent = true;
        self
    }

    /// Expect a session attribute on the response.
    #[must_use]
    pub fn has_attribute(
        mut self,
        key: impl Into<String>,
        expected: impl Into<AttributeExpectation>,
    ) -> Self {
        self.expect.has_attributes.push((key.into(), expected.into()));
        self
    }

    /// Expect the handler to write the attribute to the persisted store.
    #[must_use]
    pub fn stores_attribute(
        mut self,
        key: impl Into<String>,
        expected: impl Into<AttributeExpectation>,
    ) -> Self {
        self.expect
            .stores_attributes
            .push((key.into(), expected.into()));
        self
    }

    /// Seed the persisted store for this turn: reads return this attribute.
    #[must_use]
    pub fn with_stored_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.prior_persisted_state.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn has_card_title(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_card_title = Some(expected.into());
        self
    }

    #[must_use]
    pub fn has_card_content(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_card_content = Some(expected.into());
        self
    }

    #[must_use]
    pub fn has_card_content_like(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_card_content_like = Some(expected.into());
        self
    }

    #[must_use]
    pub fn has_card_text(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_card_text = Some(expected.into());
        self
    }

    #[must_use]
    pub fn has_card_text_like(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_card_text_like = Some(expected.into());
        self
    }

    #[must_use]
    pub fn has_small_image_url_like(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_small_image_url_like = Some(expected.into());
        self
    }

    #[must_use]
    pub fn has_large_image_url_like(mut self, expected: impl Into<String>) -> Self {
        self.expect.has_large_image_url_like = Some(expected.into());
        self
    }

    /// Expect an audio-play directive with the given stream parameters.
    #[must_use]
    pub fn plays_stream(mut self, expected: PlaysStream) -> Self {
        self.expect.plays_stream = Some(expected);
        self
    }

    /// Expect an audio-stop directive.
    #[must_use]
    pub fn stops_stream(mut self) -> Self {
        self.expect.stops_stream = true;
        self
    }

    /// Expect an audio-queue-clear directive with the given behavior.
    #[must_use]
    pub fn clears_queue(mut self, behavior: impl Into<String>) -> Self {
        self.expect.clears_queue = Some(behavior.into());
        self
    }

    /// Escape hatch: validate the raw matched speech yourself.
    #[must_use]
    pub fn says_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AssertionContext<'_>, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.expect.says_callback = Some(Arc::new(callback));
        self
    }

    /// Escape hatch: validate the full normalized response yourself.
    #[must_use]
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AssertionContext<'_>, &ResponseEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.expect.callback = Some(Arc::new(callback));
        self
    }
}

/// An ordered sequence of turns sharing one session.
pub struct Scenario {
    pub(crate) turns: Vec<Turn>,
}

impl Scenario {
    #[must_use]
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl From<Vec<Turn>> for Scenario {
    fn from(turns: Vec<Turn>) -> Self {
        Self::new(turns)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::HarnessConfig;
    use crate::request::RequestFactory;

    use super::*;

    #[test]
    fn fluent_builders_fill_the_expectation_set() {
        let config = HarnessConfig::default();
        let factory = RequestFactory::new(&config);
        let turn = Turn::new(factory.launch_request())
            .says("Hello World!")
            .reprompts_nothing()
            .should_end_session(true)
            .has_attribute("foo", "bar")
            .stores_attribute("foo", "bar")
            .with_stored_attribute("foo", json!("bar"));

        assert!(turn.expect.says.is_some());
        assert!(turn.expect.reprompts_nothing);
        assert_eq!(turn.expect.should_end_session, Some(true));
        assert_eq!(turn.expect.has_attributes.len(), 1);
        assert_eq!(turn.expect.stores_attributes.len(), 1);
        assert_eq!(turn.prior_persisted_state["foo"], "bar");
    }

    #[test]
    fn scenario_keeps_turn_order() {
        let config = HarnessConfig::default();
        let factory = RequestFactory::new(&config);
        let scenario = Scenario::new(vec![
            Turn::new(factory.launch_request()),
            Turn::new(factory.intent_request("HelloWorldIntent", &[])),
        ]);
        assert_eq!(scenario.len(), 2);
        assert!(!scenario.is_empty());
        assert_eq!(scenario.turns[1].request.type_label(), "HelloWorldIntent");
    }
}
