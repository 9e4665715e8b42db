//! Builds synthetic turn requests.
//!
//! Every build call returns a fresh, independently mutable document with a
//! unique request id and a current timestamp. The sequencer later overwrites
//! the session id and attributes before dispatch.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{HarnessConfig, PROTOCOL_VERSION};
use crate::error::{HarnessError, Result};

use super::document::{
    Application, AudioPlayerState, Device, DeviceContext, Intent, PlayerActivity, RequestBody,
    RequestEnvelope, RequestKind, ResolutionAuthority, ResolutionStatus, ResolutionStatusCode,
    ResolutionValue, ResolutionValueEntry, Resolutions, Session, SessionEndedReason, Slot, System,
    User,
};

/// Request builder bound to one harness configuration.
pub struct RequestFactory<'a> {
    config: &'a HarnessConfig,
}

impl<'a> RequestFactory<'a> {
    #[must_use]
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// A launch request in the configured locale.
    #[must_use]
    pub fn launch_request(&self) -> RequestEnvelope {
        self.envelope(RequestKind::Launch)
    }

    /// An intent request. Flat `(name, value)` slot pairs are normalized
    /// into full slot records.
    #[must_use]
    pub fn intent_request(&self, name: &str, slots: &[(&str, &str)]) -> RequestEnvelope {
        let slots = slots
            .iter()
            .map(|(slot_name, value)| {
                (
                    (*slot_name).to_string(),
                    Slot {
                        name: (*slot_name).to_string(),
                        value: Some((*value).to_string()),
                        resolutions: None,
                    },
                )
            })
            .collect();
        self.envelope(RequestKind::Intent {
            intent: Intent {
                name: name.to_string(),
                slots,
            },
        })
    }

    /// A session-ended request with the given reason.
    #[must_use]
    pub fn session_ended_request(&self, reason: SessionEndedReason) -> RequestEnvelope {
        self.envelope(RequestKind::SessionEnded { reason })
    }

    /// Set the device's current media-player context on a request, e.g. to
    /// model resuming a stream at an offset.
    pub fn attach_audio_player_context(
        &self,
        request: &mut RequestEnvelope,
        token: impl Into<String>,
        offset_ms: u64,
        activity: PlayerActivity,
    ) {
        request.context.audio_player = AudioPlayerState {
            player_activity: activity,
            token: Some(token.into()),
            offset_in_milliseconds: Some(offset_ms),
        };
    }

    /// Attach a successful entity resolution to a slot, creating the slot if
    /// the request does not carry it yet.
    ///
    /// Additive per authority: a second call for the same slot and type
    /// appends another canonical value to the existing authority entry
    /// instead of duplicating the authority.
    pub fn attach_entity_resolution(
        &self,
        request: &mut RequestEnvelope,
        slot_name: &str,
        slot_type: &str,
        value: &str,
        id: &str,
    ) -> Result<()> {
        let authority = self.authority(slot_type);
        let slot = Self::slot_entry(request, slot_name, value)?;
        let resolutions = slot.resolutions.get_or_insert_with(Resolutions::default);

        let entry = ResolutionValueEntry {
            value: ResolutionValue {
                name: value.to_string(),
                id: id.to_string(),
            },
        };
        match resolutions
            .resolutions_per_authority
            .iter_mut()
            .find(|per| per.authority == authority && per.status.code == ResolutionStatusCode::Match)
        {
            Some(per) => per.values.push(entry),
            None => resolutions.resolutions_per_authority.push(ResolutionAuthority {
                authority,
                status: ResolutionStatus {
                    code: ResolutionStatusCode::Match,
                },
                values: vec![entry],
            }),
        }
        Ok(())
    }

    /// Attach a failed (no-match) entity resolution to a slot.
    pub fn attach_no_match_resolution(
        &self,
        request: &mut RequestEnvelope,
        slot_name: &str,
        slot_type: &str,
        value: &str,
    ) -> Result<()> {
        let authority = self.authority(slot_type);
        let slot = Self::slot_entry(request, slot_name, value)?;
        let resolutions = slot.resolutions.get_or_insert_with(Resolutions::default);

        let already_present = resolutions.resolutions_per_authority.iter().any(|per| {
            per.authority == authority && per.status.code == ResolutionStatusCode::NoMatch
        });
        if !already_present {
            resolutions.resolutions_per_authority.push(ResolutionAuthority {
                authority,
                status: ResolutionStatus {
                    code: ResolutionStatusCode::NoMatch,
                },
                values: Vec::new(),
            });
        }
        Ok(())
    }

    fn authority(&self, slot_type: &str) -> String {
        format!(
            "amzn1.er-authority.echo-sdk.{}.{slot_type}",
            self.config.application_id
        )
    }

    fn slot_entry<'r>(
        request: &'r mut RequestEnvelope,
        slot_name: &str,
        value: &str,
    ) -> Result<&'r mut Slot> {
        if slot_name.is_empty() {
            return Err(HarnessError::InvalidRequest(
                "entity resolution requires a slot name".to_string(),
            ));
        }
        if value.is_empty() {
            return Err(HarnessError::InvalidRequest(
                "entity resolution requires a slot value".to_string(),
            ));
        }
        let intent = request.intent_mut().ok_or_else(|| {
            HarnessError::InvalidRequest(
                "entity resolution requires an intent request".to_string(),
            )
        })?;
        Ok(intent
            .slots
            .entry(slot_name.to_string())
            .or_insert_with(|| Slot {
                name: slot_name.to_string(),
                value: Some(value.to_string()),
                resolutions: None,
            }))
    }

    fn envelope(&self, kind: RequestKind) -> RequestEnvelope {
        let application = Application {
            application_id: self.config.application_id.clone(),
        };
        let user = User {
            user_id: self.config.user_id.clone(),
        };
        let mut supported_interfaces = Map::new();
        supported_interfaces.insert("AudioPlayer".to_string(), Value::Object(Map::new()));

        RequestEnvelope {
            version: PROTOCOL_VERSION.to_string(),
            session: Session {
                session_id: format!("SessionId.{}", Uuid::new_v4()),
                application: application.clone(),
                attributes: Map::new(),
                user: user.clone(),
                new: true,
            },
            context: DeviceContext {
                system: System {
                    application,
                    user,
                    device: Device {
                        device_id: self.config.device_id.clone(),
                        supported_interfaces,
                    },
                    api_endpoint: self.config.api_endpoint.clone(),
                },
                audio_player: AudioPlayerState::default(),
            },
            request: RequestBody {
                kind,
                request_id: format!("EdwRequestId.{}", Uuid::new_v4()),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                locale: self.config.locale.clone(),
            },
        }
    }
}
