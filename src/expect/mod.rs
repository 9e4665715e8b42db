//! Declarative expectations over a turn's response.
//!
//! An expectation set is a fixed collection of optional, independent
//! predicates; each maps to a dedicated checker in [`checkers`]. All
//! entries are optional, and every declared predicate is evaluated for
//! its turn (subject to the configured failure policy).

mod checkers;

pub use checkers::{AssertionEngine, CheckContext, Checker};

use std::sync::Arc;

use serde_json::Value;

use crate::error::{AssertionFailure, Result};
use crate::locale::LocaleService;
use crate::response::ResponseEnvelope;

/// Exact speech expectation: a single literal or a set of alternatives,
/// any of which passes.
#[derive(Debug, Clone)]
pub enum SpeechExpectation {
    One(String),
    AnyOf(Vec<String>),
}

impl SpeechExpectation {
    pub(crate) fn matches(&self, actual: &str) -> bool {
        match self {
            Self::One(expected) => expected == actual,
            Self::AnyOf(alternatives) => alternatives.iter().any(|expected| expected == actual),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::One(expected) => expected.clone(),
            Self::AnyOf(alternatives) => format!("any of {alternatives:?}"),
        }
    }
}

impl From<&str> for SpeechExpectation {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for SpeechExpectation {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for SpeechExpectation {
    fn from(value: Vec<String>) -> Self {
        Self::AnyOf(value)
    }
}

impl From<&[&str]> for SpeechExpectation {
    fn from(value: &[&str]) -> Self {
        Self::AnyOf(value.iter().map(ToString::to_string).collect())
    }
}

/// Expected attribute value: a literal, or a caller-supplied validator.
#[derive(Clone)]
pub enum AttributeExpectation {
    Literal(Value),
    Validator(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl AttributeExpectation {
    pub fn validator<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Validator(Arc::new(f))
    }

    pub(crate) fn accepts(&self, actual: &Value) -> bool {
        match self {
            Self::Literal(expected) => expected == actual,
            Self::Validator(validate) => validate(actual),
        }
    }
}

impl From<Value> for AttributeExpectation {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for AttributeExpectation {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

/// Expected audio-play directive.
#[derive(Debug, Clone)]
pub struct PlaysStream {
    pub behavior: String,
    pub url: String,
    pub token: String,
    pub offset_ms: Option<u64>,
}

/// Caller-supplied check over the raw matched speech.
pub type SaysCallback = Arc<dyn Fn(&AssertionContext<'_>, &str) -> anyhow::Result<()> + Send + Sync>;

/// Caller-supplied check over the full normalized response.
pub type ResponseCallback =
    Arc<dyn Fn(&AssertionContext<'_>, &ResponseEnvelope) -> anyhow::Result<()> + Send + Sync>;

/// Context handed to caller-supplied validation code.
pub struct AssertionContext<'a> {
    /// 1-based position of the turn within its scenario.
    pub position: usize,
    /// Intent name for intent requests, request kind otherwise.
    pub request_type: &'a str,
    pub(crate) locale: Option<&'a LocaleService>,
}

impl AssertionContext<'_> {
    /// Resolve a translation key against the harness locale.
    pub fn t(&self, key: &str) -> Result<String> {
        self.locale_service()?.translate(key, &[])
    }

    /// Resolve a translation key with `%s` substitution arguments.
    pub fn t_args(&self, key: &str, args: &[&str]) -> Result<String> {
        self.locale_service()?.translate(key, args)
    }

    /// Resolve a translation key to its list of alternatives.
    pub fn t_list(&self, key: &str) -> Result<Vec<String>> {
        self.locale_service()?.translate_list(key)
    }

    /// Build a failure annotated with this turn's position and request
    /// type, for returning from a validation closure.
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> AssertionFailure {
        AssertionFailure::new(self.position, self.request_type, message)
    }

    fn locale_service(&self) -> Result<&LocaleService> {
        self.locale.ok_or_else(|| {
            crate::error::HarnessError::Locale(
                "no translation resources configured on this harness".to_string(),
            )
        })
    }
}

/// One turn's declared expectations. All fields optional and independent.
#[derive(Default, Clone)]
pub struct Expectations {
    pub says: Option<SpeechExpectation>,
    pub says_like: Option<String>,
    pub says_nothing: bool,
    pub reprompts: Option<SpeechExpectation>,
    pub reprompts_like: Option<String>,
    pub reprompts_nothing: bool,
    pub should_end_session: Option<bool>,
    pub elicits_slot: Option<String>,
    pub confirms_slot: Option<String>,
    pub confirms_intent: bool,
    /// Per-key checks against the response's session attributes.
    pub has_attributes: Vec<(String, AttributeExpectation)>,
    /// Per-key checks against the attributes written to the persisted store.
    pub stores_attributes: Vec<(String, AttributeExpectation)>,
    pub has_card_title: Option<String>,
    pub has_card_content: Option<String>,
    pub has_card_content_like: Option<String>,
    pub has_card_text: Option<String>,
    pub has_card_text_like: Option<String>,
    pub has_small_image_url_like: Option<String>,
    pub has_large_image_url_like: Option<String>,
    pub plays_stream: Option<PlaysStream>,
    pub stops_stream: bool,
    /// Expected clear behavior of an audio-queue-clear directive.
    pub clears_queue: Option<String>,
    pub says_callback: Option<SaysCallback>,
    pub callback: Option<ResponseCallback>,
}
