//! Error taxonomy for the harness.
//!
//! Three kinds of failure terminate a scenario: setup errors (bad harness
//! configuration, raised before any turn runs), handler errors (the skill
//! handler rejected or never resolved), and assertion failures (a declared
//! expectation was violated). All carry enough context to trace the failure
//! to a specific scripted turn.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Missing or invalid harness configuration, detected before any turn runs.
    #[error("setup: {0}")]
    Setup(String),

    /// A request-factory precondition was violated (e.g. attaching slot data
    /// to a request that carries no intent).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The skill handler rejected, threw, or completed without a response.
    #[error("Turn #{position} ({request_type}): handler failed: {source}")]
    Handler {
        /// 1-based position of the turn within its scenario.
        position: usize,
        /// Intent name for intent requests, request kind otherwise.
        request_type: String,
        #[source]
        source: anyhow::Error,
    },

    /// The handler produced a response document the harness cannot interpret.
    #[error("Turn #{position} ({request_type}): malformed response: {detail}")]
    MalformedResponse {
        position: usize,
        request_type: String,
        detail: String,
    },

    /// One declared expectation was violated.
    #[error("{0}")]
    Assertion(AssertionFailure),

    /// Several expectations were violated in the same turn
    /// (`FailurePolicy::CollectAll` only).
    #[error("{}", format_failures(.0))]
    Assertions(Vec<AssertionFailure>),

    /// A translation key could not be resolved for the current locale.
    #[error("locale: {0}")]
    Locale(String),
}

impl HarnessError {
    /// All assertion failures carried by this error, in declaration order.
    #[must_use]
    pub fn assertion_failures(&self) -> &[AssertionFailure] {
        match self {
            Self::Assertion(failure) => std::slice::from_ref(failure),
            Self::Assertions(failures) => failures,
            _ => &[],
        }
    }
}

/// A single violated expectation, annotated with its position in the scenario.
#[derive(Debug, Clone)]
pub struct AssertionFailure {
    /// 1-based position of the turn within its scenario.
    pub position: usize,
    /// Intent name for intent requests, request kind otherwise.
    pub request_type: String,
    /// Human-readable description of the violation.
    pub message: String,
    /// What the expectation demanded, when a diff is meaningful.
    pub expected: Option<String>,
    /// What the response actually contained.
    pub actual: Option<String>,
}

impl AssertionFailure {
    pub fn new(
        position: usize,
        request_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            position,
            request_type: request_type.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    #[must_use]
    pub fn with_diff(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Turn #{} ({}): {}",
            self.position, self.request_type, self.message
        )?;
        if let Some(expected) = &self.expected {
            write!(f, "\n  expected: {expected}")?;
        }
        if let Some(actual) = &self.actual {
            write!(f, "\n  actual:   {actual}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}

fn format_failures(failures: &[AssertionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_turn_and_request_type() {
        let failure = AssertionFailure::new(3, "HelloWorldIntent", "did not return the correct speech")
            .with_diff("Hello World!", "Goodbye!");
        let rendered = failure.to_string();
        assert!(rendered.starts_with("Turn #3 (HelloWorldIntent):"));
        assert!(rendered.contains("expected: Hello World!"));
        assert!(rendered.contains("actual:   Goodbye!"));
    }

    #[test]
    fn collected_failures_render_one_per_line() {
        let err = HarnessError::Assertions(vec![
            AssertionFailure::new(1, "LaunchRequest", "first"),
            AssertionFailure::new(1, "LaunchRequest", "second"),
        ]);
        let rendered = err.to_string();
        assert_eq!(rendered.lines().count(), 2);
        assert_eq!(err.assertion_failures().len(), 2);
    }

    #[test]
    fn assertion_failures_empty_for_other_kinds() {
        let err = HarnessError::Setup("no scenario".to_string());
        assert!(err.assertion_failures().is_empty());
    }
}
