//! Harness configuration.
//!
//! One explicit configuration struct per harness instance; independently
//! constructed harnesses never share state through globals.

use serde::{Deserialize, Serialize};

/// Protocol version stamped into every generated request.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Placeholder identities used when a test does not care about real ids.
pub const DEFAULT_APPLICATION_ID: &str = "amzn1.ask.skill.00000000-0000-0000-0000-000000000000";
pub const DEFAULT_USER_ID: &str = "amzn1.ask.account.VOID";
pub const DEFAULT_DEVICE_ID: &str = "amzn1.ask.device.VOID";
pub const DEFAULT_API_ENDPOINT: &str = "https://api.amazonalexa.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Locale stamped into generated requests and used for translations.
    pub locale: String,
    /// Skill application id carried by the session descriptor.
    pub application_id: String,
    /// User id carried by the session descriptor and the persisted store key.
    pub user_id: String,
    /// Device id carried by the system context.
    pub device_id: String,
    /// API endpoint carried by the system context.
    pub api_endpoint: String,
    /// Persisted-store emulation; `None` leaves the mock uninstalled.
    #[serde(default)]
    pub store: Option<StoreConfig>,
    /// Optional lint-style checks.
    #[serde(default)]
    pub checks: LintChecks,
    /// How violated expectations within one turn are reported.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            store: None,
            checks: LintChecks::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl HarnessConfig {
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    #[must_use]
    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = application_id.into();
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Enable the persisted-store mock against the named table.
    #[must_use]
    pub fn with_store_table(mut self, table: impl Into<String>) -> Self {
        self.store = Some(StoreConfig::new(table));
        self
    }

    #[must_use]
    pub fn with_checks(mut self, checks: LintChecks) -> Self {
        self.checks = checks;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Names for the emulated single-item key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Table name the handler is expected to address.
    pub table: String,
    /// Item attribute holding the user id.
    #[serde(default = "default_partition_key")]
    pub partition_key: String,
    /// Item attribute holding the persisted attribute mapping.
    #[serde(default = "default_attributes_field")]
    pub attributes_field: String,
}

impl StoreConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            partition_key: default_partition_key(),
            attributes_field: default_attributes_field(),
        }
    }
}

fn default_partition_key() -> String {
    "userId".to_string()
}

fn default_attributes_field() -> String {
    "mapAttr".to_string()
}

/// Soft lint checks evaluated alongside the declared expectations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintChecks {
    /// Flag a turn whose speech contains a question mark yet ends the session.
    #[serde(default)]
    pub question_mark: bool,
}

/// Reporting policy for a turn that violates more than one expectation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first violated expectation.
    #[default]
    FailFast,
    /// Evaluate every expectation and report all violations together.
    CollectAll,
}
