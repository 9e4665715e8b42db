//! Request document types, serializing to the platform wire shape.
//!
//! The JSON layout mirrors what a skill handler receives in production:
//! a version string, a session descriptor, a device/system context, and
//! the request body tagged by `type`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete synthetic turn request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub version: String,
    pub session: Session,
    pub context: DeviceContext,
    pub request: RequestBody,
}

impl RequestEnvelope {
    /// Label used in failure messages: the intent name for intent requests,
    /// the request kind otherwise.
    #[must_use]
    pub fn type_label(&self) -> &str {
        match &self.request.kind {
            RequestKind::Launch => "LaunchRequest",
            RequestKind::Intent { intent } => &intent.name,
            RequestKind::SessionEnded { .. } => "SessionEndedRequest",
        }
    }

    /// The intent carried by this request, if any.
    #[must_use]
    pub fn intent(&self) -> Option<&Intent> {
        match &self.request.kind {
            RequestKind::Intent { intent } => Some(intent),
            _ => None,
        }
    }

    pub(crate) fn intent_mut(&mut self) -> Option<&mut Intent> {
        match &mut self.request.kind {
            RequestKind::Intent { intent } => Some(intent),
            _ => None,
        }
    }

    /// Override the locale stamped into this request.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.request.locale = locale.into();
        self
    }
}

/// Session descriptor: identity plus the attribute mapping threaded
/// between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub application: Application,
    pub attributes: Map<String, Value>,
    pub user: User,
    pub new: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
}

/// Device/system context attached to every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceContext {
    #[serde(rename = "System")]
    pub system: System,
    #[serde(rename = "AudioPlayer")]
    pub audio_player: AudioPlayerState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub application: Application,
    pub user: User,
    pub device: Device,
    pub api_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub supported_interfaces: Map<String, Value>,
}

/// Current media-player state on the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPlayerState {
    pub player_activity: PlayerActivity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_in_milliseconds: Option<u64>,
}

impl Default for AudioPlayerState {
    fn default() -> Self {
        Self {
            player_activity: PlayerActivity::Idle,
            token: None,
            offset_in_milliseconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerActivity {
    Idle,
    Paused,
    Playing,
    BufferUnderrun,
    Finished,
    Stopped,
}

/// Request body: the tagged variant plus fields common to all variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(flatten)]
    pub kind: RequestKind,
    pub request_id: String,
    pub timestamp: String,
    pub locale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestKind {
    #[serde(rename = "LaunchRequest")]
    Launch,
    #[serde(rename = "IntentRequest")]
    Intent { intent: Intent },
    #[serde(rename = "SessionEndedRequest")]
    SessionEnded { reason: SessionEndedReason },
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEndedReason {
    UserInitiated,
    Error,
    ExceededMaxReprompts,
}

/// A spoken intent with its named slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub slots: HashMap<String, Slot>,
}

/// A named argument extracted from user speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolutions: Option<Resolutions>,
}

/// Entity-resolution annotations for one slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolutions {
    pub resolutions_per_authority: Vec<ResolutionAuthority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionAuthority {
    pub authority: String,
    pub status: ResolutionStatus,
    pub values: Vec<ResolutionValueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionStatus {
    pub code: ResolutionStatusCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStatusCode {
    #[serde(rename = "ER_SUCCESS_MATCH")]
    Match,
    #[serde(rename = "ER_SUCCESS_NO_MATCH")]
    NoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionValueEntry {
    pub value: ResolutionValue,
}

/// A canonical catalog value a spoken slot value resolved to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionValue {
    pub name: String,
    pub id: String,
}
