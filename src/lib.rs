//! Scripted multi-turn conversation testing for voice-assistant skills.
//!
//! A [`Harness`] wraps a skill's request handler and drives it through a
//! [`Scenario`]: an ordered list of [`Turn`]s, each pairing a synthetic
//! request with declarative expectations about the response. The harness
//! threads session attributes from one turn to the next, simulates the
//! persistence layer when one is configured, and reports the first
//! violated expectation with the turn position and request type attached.
//!
//! ```no_run
//! use serde_json::json;
//! use skilltest::{
//!     Harness, HarnessConfig, HandlerCallback, HandlerContext, HandlerSignal,
//!     RequestEnvelope, Turn,
//! };
//!
//! fn skill(
//!     _request: RequestEnvelope,
//!     _ctx: HandlerContext,
//!     _cb: HandlerCallback,
//!     _test_mode: bool,
//! ) -> anyhow::Result<HandlerSignal> {
//!     Ok(HandlerSignal::Value(json!({
//!         "response": {
//!             "outputSpeech": { "type": "SSML", "ssml": "<speak> Hello World! </speak>" },
//!             "shouldEndSession": true
//!         }
//!     })))
//! }
//!
//! # async fn demo() -> skilltest::Result<()> {
//! let mut harness = Harness::new(skill, HarnessConfig::default());
//! let turn = Turn::new(harness.launch_request())
//!     .says("Hello World!")
//!     .should_end_session(true);
//! harness.run(vec![turn]).await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod expect;
pub mod handler;
pub mod harness;
pub mod locale;
pub mod persistence;
pub mod request;
pub mod response;
pub mod scenario;
pub mod sequencer;

pub use config::{FailurePolicy, HarnessConfig, LintChecks, StoreConfig};
pub use error::{AssertionFailure, HarnessError, Result};
pub use expect::{AssertionContext, AttributeExpectation, PlaysStream, SpeechExpectation};
pub use handler::{HandlerCallback, HandlerContext, HandlerSignal, SkillHandler};
pub use harness::Harness;
pub use persistence::AttributeStore;
pub use request::{
    PlayerActivity, RequestEnvelope, ResolutionStatusCode, SessionEndedReason,
};
pub use response::ResponseEnvelope;
pub use scenario::{Scenario, Turn};
