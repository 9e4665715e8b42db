//! Per-predicate checkers and the engine that runs them.
//!
//! Each declared expectation key maps to one checker function. Checkers
//! are independent and run in registration order; the failure policy
//! decides whether the first violation stops the turn or all violations
//! are collected.

use serde_json::{Map, Value};

use crate::config::{FailurePolicy, LintChecks};
use crate::error::AssertionFailure;
use crate::locale::LocaleService;
use crate::response::{Card, Directive, ResponseEnvelope};

use super::{AssertionContext, AttributeExpectation, Expectations};

/// Everything a checker may inspect for one turn.
pub struct CheckContext<'a> {
    /// 1-based position of the turn within its scenario.
    pub position: usize,
    /// Intent name for intent requests, request kind otherwise.
    pub request_type: &'a str,
    pub response: &'a ResponseEnvelope,
    pub expect: &'a Expectations,
    /// Attributes the handler wrote to the persisted store this turn.
    pub stored_attributes: Option<&'a Map<String, Value>>,
    pub checks: &'a LintChecks,
    pub locale: Option<&'a LocaleService>,
}

impl CheckContext<'_> {
    /// Build a failure annotated with this turn's position and request type.
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> AssertionFailure {
        AssertionFailure::new(self.position, self.request_type, message)
    }

    fn assertion_context(&self) -> AssertionContext<'_> {
        AssertionContext {
            position: self.position,
            request_type: self.request_type,
            locale: self.locale,
        }
    }
}

/// A single expectation checker.
pub type Checker = fn(&CheckContext<'_>, &mut Vec<AssertionFailure>);

/// Runs every registered checker over a turn's response.
pub struct AssertionEngine {
    checkers: Vec<Checker>,
}

impl Default for AssertionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AssertionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            checkers: vec![
                check_says,
                check_says_like,
                check_says_nothing,
                check_reprompts,
                check_reprompts_like,
                check_reprompts_nothing,
                check_should_end_session,
                check_elicits_slot,
                check_confirms_slot,
                check_confirms_intent,
                check_has_attributes,
                check_stores_attributes,
                check_card,
                check_plays_stream,
                check_stops_stream,
                check_clears_queue,
                check_says_callback,
                check_callback,
                check_question_mark,
            ],
        }
    }

    /// Register an additional checker, run after the built-in ones.
    pub fn register(&mut self, checker: Checker) {
        self.checkers.push(checker);
    }

    /// Evaluate the turn. Under `FailFast` evaluation stops after the first
    /// checker that reports violations; under `CollectAll` every checker
    /// runs and all violations are returned in registration order.
    #[must_use]
    pub fn evaluate(
        &self,
        ctx: &CheckContext<'_>,
        policy: FailurePolicy,
    ) -> Vec<AssertionFailure> {
        let mut failures = Vec::new();
        for checker in &self.checkers {
            checker(ctx, &mut failures);
            if policy == FailurePolicy::FailFast && !failures.is_empty() {
                break;
            }
        }
        failures
    }
}

const NO_SPEECH: &str = "(no speech)";
const NO_REPROMPT: &str = "(no reprompt)";

fn check_says(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.says else {
        return;
    };
    let actual = ctx.response.speech_text();
    if !actual.as_deref().is_some_and(|text| expected.matches(text)) {
        failures.push(
            ctx.fail("did not return the correct speech").with_diff(
                expected.describe(),
                actual.unwrap_or_else(|| NO_SPEECH.to_string()),
            ),
        );
    }
}

fn check_says_like(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.says_like else {
        return;
    };
    let actual = ctx.response.speech_text();
    if !actual.as_deref().is_some_and(|text| text.contains(expected)) {
        failures.push(
            ctx.fail("speech does not contain the expected text").with_diff(
                format!("containing {expected:?}"),
                actual.unwrap_or_else(|| NO_SPEECH.to_string()),
            ),
        );
    }
}

fn check_says_nothing(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if !ctx.expect.says_nothing {
        return;
    }
    if let Some(actual) = ctx.response.speech_text() {
        failures.push(
            ctx.fail("returned speech when none was expected")
                .with_diff(NO_SPEECH, actual),
        );
    }
}

fn check_reprompts(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.reprompts else {
        return;
    };
    let actual = ctx.response.reprompt_text();
    if !actual.as_deref().is_some_and(|text| expected.matches(text)) {
        failures.push(
            ctx.fail("did not return the correct reprompt").with_diff(
                expected.describe(),
                actual.unwrap_or_else(|| NO_REPROMPT.to_string()),
            ),
        );
    }
}

fn check_reprompts_like(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.reprompts_like else {
        return;
    };
    let actual = ctx.response.reprompt_text();
    if !actual.as_deref().is_some_and(|text| text.contains(expected)) {
        failures.push(
            ctx.fail("reprompt does not contain the expected text").with_diff(
                format!("containing {expected:?}"),
                actual.unwrap_or_else(|| NO_REPROMPT.to_string()),
            ),
        );
    }
}

fn check_reprompts_nothing(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if !ctx.expect.reprompts_nothing {
        return;
    }
    if let Some(actual) = ctx.response.reprompt_text() {
        failures.push(
            ctx.fail("returned a reprompt when none was expected")
                .with_diff(NO_REPROMPT, actual),
        );
    }
}

fn check_should_end_session(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = ctx.expect.should_end_session else {
        return;
    };
    let actual = ctx.response.ends_session();
    if expected && !actual {
        failures.push(ctx.fail("did not end the session").with_diff(
            "the response ends the session",
            "the response keeps the session open",
        ));
    } else if !expected && actual {
        failures.push(ctx.fail("ended the session").with_diff(
            "the response keeps the session open",
            "the response ends the session",
        ));
    }
}

fn check_elicits_slot(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.elicits_slot else {
        return;
    };
    match ctx.response.first_directive_of_type("Dialog.ElicitSlot") {
        None => failures.push(ctx.fail("did not elicit a slot")),
        Some(directive) => {
            let actual = directive.str_at(&["slotToElicit"]).unwrap_or_default();
            if actual != expected {
                failures.push(
                    ctx.fail("elicited the wrong slot")
                        .with_diff(expected.clone(), actual),
                );
            }
        }
    }
}

fn check_confirms_slot(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.confirms_slot else {
        return;
    };
    match ctx.response.first_directive_of_type("Dialog.ConfirmSlot") {
        None => failures.push(ctx.fail("did not ask for slot confirmation")),
        Some(directive) => {
            let actual = directive.str_at(&["slotToConfirm"]).unwrap_or_default();
            if actual != expected {
                failures.push(
                    ctx.fail("asked to confirm the wrong slot")
                        .with_diff(expected.clone(), actual),
                );
            }
        }
    }
}

fn check_confirms_intent(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if !ctx.expect.confirms_intent {
        return;
    }
    if ctx
        .response
        .first_directive_of_type("Dialog.ConfirmIntent")
        .is_none()
    {
        failures.push(ctx.fail("did not ask for intent confirmation"));
    }
}

fn check_attribute_entries(
    ctx: &CheckContext<'_>,
    label: &str,
    expected: &[(String, AttributeExpectation)],
    actual: &Map<String, Value>,
    failures: &mut Vec<AssertionFailure>,
) {
    for (key, expectation) in expected {
        match actual.get(key) {
            None => failures.push(ctx.fail(format!("{label} '{key}' is missing"))),
            Some(value) if !expectation.accepts(value) => {
                let expected_text = match expectation {
                    AttributeExpectation::Literal(literal) => literal.to_string(),
                    AttributeExpectation::Validator(_) => "(custom validator)".to_string(),
                };
                failures.push(
                    ctx.fail(format!("{label} '{key}' has the wrong value"))
                        .with_diff(expected_text, value.to_string()),
                );
            }
            Some(_) => {}
        }
    }
}

fn check_has_attributes(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if ctx.expect.has_attributes.is_empty() {
        return;
    }
    check_attribute_entries(
        ctx,
        "session attribute",
        &ctx.expect.has_attributes,
        &ctx.response.session_attributes,
        failures,
    );
}

fn check_stores_attributes(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if ctx.expect.stores_attributes.is_empty() {
        return;
    }
    match ctx.stored_attributes {
        None => failures.push(ctx.fail("did not write to the persisted store")),
        Some(stored) => check_attribute_entries(
            ctx,
            "stored attribute",
            &ctx.expect.stores_attributes,
            stored,
            failures,
        ),
    }
}

fn check_card(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let expect = ctx.expect;
    let wants_card = expect.has_card_title.is_some()
        || expect.has_card_content.is_some()
        || expect.has_card_content_like.is_some()
        || expect.has_card_text.is_some()
        || expect.has_card_text_like.is_some()
        || expect.has_small_image_url_like.is_some()
        || expect.has_large_image_url_like.is_some();
    if !wants_card {
        return;
    }
    let Some(card) = &ctx.response.response.card else {
        failures.push(ctx.fail("response has no card"));
        return;
    };

    if let Some(expected) = &expect.has_card_title {
        let actual = card.title().unwrap_or_default();
        if actual != expected {
            failures.push(
                ctx.fail("card has the wrong title")
                    .with_diff(expected.clone(), actual),
            );
        }
    }

    let wants_simple = expect.has_card_content.is_some() || expect.has_card_content_like.is_some();
    if wants_simple {
        match card {
            Card::Simple { content, .. } => {
                let actual = content.as_deref().unwrap_or_default();
                if let Some(expected) = &expect.has_card_content
                    && actual != expected
                {
                    failures.push(
                        ctx.fail("card has the wrong content")
                            .with_diff(expected.clone(), actual),
                    );
                }
                if let Some(expected) = &expect.has_card_content_like
                    && !actual.contains(expected)
                {
                    failures.push(
                        ctx.fail("card content does not contain the expected text")
                            .with_diff(format!("containing {expected:?}"), actual),
                    );
                }
            }
            _ => failures.push(ctx.fail("expected a simple card")),
        }
    }

    let wants_standard = expect.has_card_text.is_some()
        || expect.has_card_text_like.is_some()
        || expect.has_small_image_url_like.is_some()
        || expect.has_large_image_url_like.is_some();
    if wants_standard {
        match card {
            Card::Standard { text, image, .. } => {
                let actual = text.as_deref().unwrap_or_default();
                if let Some(expected) = &expect.has_card_text
                    && actual != expected
                {
                    failures.push(
                        ctx.fail("card has the wrong text")
                            .with_diff(expected.clone(), actual),
                    );
                }
                if let Some(expected) = &expect.has_card_text_like
                    && !actual.contains(expected)
                {
                    failures.push(
                        ctx.fail("card text does not contain the expected text")
                            .with_diff(format!("containing {expected:?}"), actual),
                    );
                }
                let small = image
                    .as_ref()
                    .and_then(|image| image.small_image_url.as_deref())
                    .unwrap_or_default();
                if let Some(expected) = &expect.has_small_image_url_like
                    && !small.contains(expected)
                {
                    failures.push(
                        ctx.fail("card small image URL does not contain the expected text")
                            .with_diff(format!("containing {expected:?}"), small),
                    );
                }
                let large = image
                    .as_ref()
                    .and_then(|image| image.large_image_url.as_deref())
                    .unwrap_or_default();
                if let Some(expected) = &expect.has_large_image_url_like
                    && !large.contains(expected)
                {
                    failures.push(
                        ctx.fail("card large image URL does not contain the expected text")
                            .with_diff(format!("containing {expected:?}"), large),
                    );
                }
            }
            _ => failures.push(ctx.fail("expected a standard card")),
        }
    }
}

fn stream_field<'a>(directive: &'a Directive, field: &str) -> &'a str {
    directive
        .str_at(&["audioItem", "stream", field])
        .unwrap_or_default()
}

fn check_plays_stream(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.plays_stream else {
        return;
    };
    let Some(directive) = ctx.response.first_directive_of_type("AudioPlayer.Play") else {
        failures.push(ctx.fail("did not play a stream"));
        return;
    };

    let behavior = directive.str_at(&["playBehavior"]).unwrap_or_default();
    if behavior != expected.behavior {
        failures.push(
            ctx.fail("played a stream with the wrong behavior")
                .with_diff(expected.behavior.clone(), behavior),
        );
    }

    let url = stream_field(directive, "url");
    if !url.starts_with("https://") {
        failures.push(
            ctx.fail("stream URL does not use a secure transport")
                .with_diff("an https:// URL", url),
        );
    }
    if url != expected.url {
        failures.push(
            ctx.fail("played the wrong stream URL")
                .with_diff(expected.url.clone(), url),
        );
    }

    let token = stream_field(directive, "token");
    if token != expected.token {
        failures.push(
            ctx.fail("played a stream with the wrong token")
                .with_diff(expected.token.clone(), token),
        );
    }

    if let Some(expected_offset) = expected.offset_ms {
        match directive.u64_at(&["audioItem", "stream", "offsetInMilliseconds"]) {
            None => failures.push(
                ctx.fail("played a stream without an offset")
                    .with_diff(expected_offset.to_string(), "(no offset)"),
            ),
            Some(offset) if offset != expected_offset => failures.push(
                ctx.fail("played a stream at the wrong offset")
                    .with_diff(expected_offset.to_string(), offset.to_string()),
            ),
            Some(_) => {}
        }
    }
}

fn check_stops_stream(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if !ctx.expect.stops_stream {
        return;
    }
    if ctx
        .response
        .first_directive_of_type("AudioPlayer.Stop")
        .is_none()
    {
        failures.push(ctx.fail("did not stop the stream"));
    }
}

fn check_clears_queue(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(expected) = &ctx.expect.clears_queue else {
        return;
    };
    match ctx.response.first_directive_of_type("AudioPlayer.ClearQueue") {
        None => failures.push(ctx.fail("did not clear the audio queue")),
        Some(directive) => {
            let actual = directive.str_at(&["clearBehavior"]).unwrap_or_default();
            if actual != expected {
                failures.push(
                    ctx.fail("cleared the audio queue with the wrong behavior")
                        .with_diff(expected.clone(), actual),
                );
            }
        }
    }
}

/// Failures built through `AssertionContext::fail` already carry their turn
/// annotation; anything else gets wrapped here.
fn push_callback_error(
    ctx: &CheckContext<'_>,
    err: anyhow::Error,
    failures: &mut Vec<AssertionFailure>,
) {
    match err.downcast::<AssertionFailure>() {
        Ok(failure) => failures.push(failure),
        Err(err) => failures.push(ctx.fail(err.to_string())),
    }
}

fn check_says_callback(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(callback) = &ctx.expect.says_callback else {
        return;
    };
    let raw = ctx.response.speech_ssml().unwrap_or_default();
    if let Err(err) = callback(&ctx.assertion_context(), raw) {
        push_callback_error(ctx, err, failures);
    }
}

fn check_callback(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    let Some(callback) = &ctx.expect.callback else {
        return;
    };
    if let Err(err) = callback(&ctx.assertion_context(), ctx.response) {
        push_callback_error(ctx, err, failures);
    }
}

/// Soft lint: a turn that asks a question should not close the microphone.
fn check_question_mark(ctx: &CheckContext<'_>, failures: &mut Vec<AssertionFailure>) {
    if !ctx.checks.question_mark {
        return;
    }
    let Some(speech) = ctx.response.speech_text() else {
        return;
    };
    if speech.contains('?') && ctx.response.ends_session() {
        failures.push(ctx.fail("speech asks a question but the response ends the session"));
    }
}
