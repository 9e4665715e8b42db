//! Top-level harness: one instance per skill under test.
//!
//! Owns the configuration, the handler reference, the persistence mock
//! (when a store is configured), the locale service, and the assertion
//! engine. Independently constructed harnesses share nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::expect::AssertionEngine;
use crate::handler::SkillHandler;
use crate::locale::LocaleService;
use crate::persistence::PersistenceMock;
use crate::request::{PlayerActivity, RequestEnvelope, RequestFactory, SessionEndedReason};
use crate::scenario::Scenario;
use crate::sequencer::Sequencer;

pub struct Harness {
    config: HarnessConfig,
    handler: Arc<dyn SkillHandler>,
    persistence: Option<Arc<PersistenceMock>>,
    locale: Option<LocaleService>,
    engine: AssertionEngine,
}

impl Harness {
    /// Wire a harness around the skill's handler entry point.
    pub fn new(handler: impl SkillHandler + 'static, config: HarnessConfig) -> Self {
        let persistence = config
            .store
            .clone()
            .map(|store| Arc::new(PersistenceMock::new(store, config.user_id.clone())));
        Self {
            config,
            handler: Arc::new(handler),
            persistence,
            locale: None,
            engine: AssertionEngine::new(),
        }
    }

    /// Attach `locale -> key -> string-or-list` translation resources.
    #[must_use]
    pub fn with_resources(
        mut self,
        resources: HashMap<String, HashMap<String, Value>>,
    ) -> Self {
        self.locale = Some(LocaleService::new(self.config.locale.clone(), resources));
        self
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Switch the locale used for generated requests and translations.
    pub fn set_locale(&mut self, locale: impl Into<String>) {
        let locale = locale.into();
        if let Some(service) = &mut self.locale {
            service.set_locale(locale.clone());
        }
        self.config.locale = locale;
    }

    /// The assertion engine, e.g. to register additional checkers.
    pub fn engine_mut(&mut self) -> &mut AssertionEngine {
        &mut self.engine
    }

    /// Resolve a translation key against the current locale.
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

    #[must_use]
    pub fn launch_request(&self) -> RequestEnvelope {
        self.factory().launch_request()
    }

    #[must_use]
    pub fn intent_request(&self, name: &str, slots: &[(&str, &str)]) -> RequestEnvelope {
        self.factory().intent_request(name, slots)
    }

    #[must_use]
    pub fn session_ended_request(&self, reason: SessionEndedReason) -> RequestEnvelope {
        self.factory().session_ended_request(reason)
    }

    pub fn attach_audio_player_context(
        &self,
        request: &mut RequestEnvelope,
        token: impl Into<String>,
        offset_ms: u64,
        activity: PlayerActivity,
    ) {
        self.factory()
            .attach_audio_player_context(request, token, offset_ms, activity);
    }

    pub fn attach_entity_resolution(
        &self,
        request: &mut RequestEnvelope,
        slot_name: &str,
        slot_type: &str,
        value: &str,
        id: &str,
    ) -> Result<()> {
        self.factory()
            .attach_entity_resolution(request, slot_name, slot_type, value, id)
    }

    pub fn attach_no_match_resolution(
        &self,
        request: &mut RequestEnvelope,
        slot_name: &str,
        slot_type: &str,
        value: &str,
    ) -> Result<()> {
        self.factory()
            .attach_no_match_resolution(request, slot_name, slot_type, value)
    }

    /// Run a scenario to completion, failing at the first handler error or
    /// violated expectation.
    ///
    /// Takes `&mut self`: the persistence mock's prior state and captured
    /// write are scenario-scoped, so one harness never runs two scenarios
    /// concurrently.
    pub async fn run(&mut self, scenario: impl Into<Scenario>) -> Result<()> {
        let mut sequencer = Sequencer::new(
            self.handler.as_ref(),
            &self.engine,
            &self.config,
            self.persistence.as_ref(),
            self.locale.as_ref(),
        );
        sequencer.run(scenario.into()).await
    }

    fn factory(&self) -> RequestFactory<'_> {
        RequestFactory::new(&self.config)
    }

    fn locale_service(&self) -> Result<&LocaleService> {
        self.locale.as_ref().ok_or_else(|| {
            crate::error::HarnessError::Setup(
                "no translation resources configured; call with_resources first".to_string(),
            )
        })
    }
}
