//! Normalized response documents.
//!
//! Handlers return loose JSON; it is deserialized into an explicit struct
//! with optional fields so checkers never probe nested properties ad hoc.
//! Speech fields arrive wrapped in SSML markup (`<speak> ... </speak>`)
//! which is stripped before literal comparison.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A complete handler response: the response body plus the session
/// attributes threaded into the next turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub response: ResponseBody,
    #[serde(default, rename = "sessionAttributes")]
    pub session_attributes: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Deserialize a raw handler result.
    pub fn from_value(value: Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Raw output speech SSML, wrapper included.
    #[must_use]
    pub fn speech_ssml(&self) -> Option<&str> {
        self.response
            .output_speech
            .as_ref()
            .and_then(|speech| speech.ssml.as_deref())
    }

    /// Output speech with the SSML wrapper stripped.
    #[must_use]
    pub fn speech_text(&self) -> Option<String> {
        self.response
            .output_speech
            .as_ref()
            .and_then(OutputSpeech::rendered)
    }

    /// Reprompt speech with the SSML wrapper stripped.
    #[must_use]
    pub fn reprompt_text(&self) -> Option<String> {
        self.response
            .reprompt
            .as_ref()
            .and_then(|reprompt| reprompt.output_speech.as_ref())
            .and_then(OutputSpeech::rendered)
    }

    /// Whether this response ends the session. An absent flag counts as
    /// ending the session, matching the platform default.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        self.response.should_end_session.unwrap_or(true)
    }

    /// First directive of the given type, in response order.
    #[must_use]
    pub fn first_directive_of_type(&self, kind: &str) -> Option<&Directive> {
        self.response
            .directives
            .iter()
            .find(|directive| directive.kind == kind)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_end_session: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
}

/// Speech payload: SSML in practice, plain text for older handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSpeech {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl OutputSpeech {
    fn rendered(&self) -> Option<String> {
        self.ssml
            .as_deref()
            .map(strip_speech_markup)
            .or_else(|| self.text.as_ref().map(|text| text.trim().to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
}

/// Visual card attached to a response, tagged by subtype.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Card {
    Simple {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Standard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<CardImage>,
    },
    LinkAccount,
}

impl Card {
    /// Title for either card subtype.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Simple { title, .. } | Self::Standard { title, .. } => title.as_deref(),
            Self::LinkAccount => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image_url: Option<String>,
}

/// A structured instruction embedded in a response, e.g. start audio
/// playback or elicit a slot. The payload keeps whatever fields the
/// directive type carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Directive {
    /// Walk a nested path through the payload.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.payload.get(*first)?;
        for key in rest {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// String at a nested payload path.
    #[must_use]
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// Integer at a nested payload path.
    #[must_use]
    pub fn u64_at(&self, path: &[&str]) -> Option<u64> {
        self.lookup(path).and_then(Value::as_u64)
    }
}

/// Strip the SSML wrapper from a speech string and trim the remainder.
///
/// Symmetric with expectation construction: comparing `X` against a
/// response wrapped as `"<speak> X </speak>"` succeeds.
#[must_use]
pub fn strip_speech_markup(speech: &str) -> String {
    let trimmed = speech.trim();
    let trimmed = trimmed.strip_prefix("<speak>").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("</speak>").unwrap_or(trimmed);
    trimmed.trim().to_string()
}

/// Parse the raw value a handler produced, labeling parse failures with the
/// turn that caused them.
pub(crate) fn normalize(
    raw: Value,
    position: usize,
    request_type: &str,
) -> Result<ResponseEnvelope> {
    ResponseEnvelope::from_value(raw).map_err(|err| crate::error::HarnessError::MalformedResponse {
        position,
        request_type: request_type.to_string(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn speech_text_strips_ssml_wrapper() {
        let envelope = ResponseEnvelope::from_value(json!({
            "response": {
                "outputSpeech": { "type": "SSML", "ssml": "<speak> Hello World! </speak>" },
                "shouldEndSession": true
            },
            "sessionAttributes": {}
        }))
        .unwrap();
        assert_eq!(envelope.speech_text().as_deref(), Some("Hello World!"));
        assert!(envelope.ends_session());
    }

    #[test]
    fn absent_should_end_session_counts_as_ending() {
        let envelope = ResponseEnvelope::from_value(json!({ "response": {} })).unwrap();
        assert!(envelope.ends_session());
        assert!(envelope.speech_text().is_none());
        assert!(envelope.reprompt_text().is_none());
    }

    #[test]
    fn explicit_false_keeps_session_open() {
        let envelope =
            ResponseEnvelope::from_value(json!({ "response": { "shouldEndSession": false } }))
                .unwrap();
        assert!(!envelope.ends_session());
    }

    #[test]
    fn reprompt_text_strips_wrapper() {
        let envelope = ResponseEnvelope::from_value(json!({
            "response": {
                "reprompt": { "outputSpeech": { "ssml": "<speak> How are you? </speak>" } }
            }
        }))
        .unwrap();
        assert_eq!(envelope.reprompt_text().as_deref(), Some("How are you?"));
    }

    #[test]
    fn card_deserializes_by_subtype() {
        let envelope = ResponseEnvelope::from_value(json!({
            "response": {
                "card": {
                    "type": "Standard",
                    "title": "Facts",
                    "text": "A fact",
                    "image": {
                        "smallImageUrl": "https://img.example/small.png",
                        "largeImageUrl": "https://img.example/large.png"
                    }
                }
            }
        }))
        .unwrap();
        match envelope.response.card.as_ref().unwrap() {
            Card::Standard { title, text, image } => {
                assert_eq!(title.as_deref(), Some("Facts"));
                assert_eq!(text.as_deref(), Some("A fact"));
                let image = image.as_ref().unwrap();
                assert_eq!(image.small_image_url.as_deref(), Some("https://img.example/small.png"));
            }
            other => panic!("expected standard card, got {other:?}"),
        }
    }

    #[test]
    fn first_directive_of_type_respects_order() {
        let envelope = ResponseEnvelope::from_value(json!({
            "response": {
                "directives": [
                    { "type": "AudioPlayer.Stop" },
                    {
                        "type": "AudioPlayer.Play",
                        "playBehavior": "REPLACE_ALL",
                        "audioItem": { "stream": { "url": "https://a.example/s", "token": "t", "offsetInMilliseconds": 0 } }
                    },
                    { "type": "AudioPlayer.Play", "playBehavior": "ENQUEUE" }
                ]
            }
        }))
        .unwrap();
        let play = envelope.first_directive_of_type("AudioPlayer.Play").unwrap();
        assert_eq!(play.str_at(&["playBehavior"]), Some("REPLACE_ALL"));
        assert_eq!(play.str_at(&["audioItem", "stream", "url"]), Some("https://a.example/s"));
        assert_eq!(play.u64_at(&["audioItem", "stream", "offsetInMilliseconds"]), Some(0));
        assert!(envelope.first_directive_of_type("Dialog.ElicitSlot").is_none());
    }

    #[test]
    fn strip_handles_unwrapped_text() {
        assert_eq!(strip_speech_markup("  plain text "), "plain text");
        assert_eq!(strip_speech_markup("<speak>tight</speak>"), "tight");
    }

    proptest! {
        #[test]
        fn strip_is_symmetric_with_wrapping(text in "[^<>]*") {
            let wrapped = format!("<speak> {text} </speak>");
            prop_assert_eq!(strip_speech_markup(&wrapped), text.trim());
        }
    }
}
