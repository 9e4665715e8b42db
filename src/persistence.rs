//! Single-item key-value store emulation.
//!
//! The mock stands in for the skill's persistence tier: reads are seeded
//! from the current turn's declared prior state, writes are diverted into
//! a capture point the assertion engine inspects. Nothing survives past
//! the scenario; each harness instance owns its own mock.

use anyhow::{anyhow, bail};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::config::StoreConfig;

/// Persisted-attribute store interface handed to handlers through the
/// execution context.
pub trait AttributeStore: Send + Sync {
    /// Read the item for a user key. Returns `{"Item": { ... }}`.
    fn read(&self, table: &str, key: &Map<String, Value>) -> anyhow::Result<Value>;

    /// Write an item. Takes `{"Item": { ... }}`.
    fn write(&self, table: &str, input: Value) -> anyhow::Result<()>;
}

/// Scenario-scoped mock of a single key-value table row.
pub struct PersistenceMock {
    store: StoreConfig,
    user_id: String,
    state: Mutex<TurnState>,
}

#[derive(Default)]
struct TurnState {
    prior: Map<String, Value>,
    captured: Option<Map<String, Value>>,
}

impl PersistenceMock {
    pub(crate) fn new(store: StoreConfig, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            state: Mutex::new(TurnState::default()),
        }
    }

    /// Seed the next turn: reads return `prior`, any earlier captured write
    /// is discarded.
    pub(crate) fn begin_turn(&self, prior: Map<String, Value>) {
        let mut state = self.state.lock();
        state.prior = prior;
        state.captured = None;
    }

    /// The attribute mapping the handler last wrote this turn, if any.
    pub(crate) fn captured_attributes(&self) -> Option<Map<String, Value>> {
        let state = self.state.lock();
        let item = state.captured.as_ref()?;
        match item.get(&self.store.attributes_field) {
            Some(Value::Object(attributes)) => Some(attributes.clone()),
            _ => None,
        }
    }

    fn check_table(&self, table: &str) -> anyhow::Result<()> {
        if table != self.store.table {
            bail!(
                "store addressed table '{table}', expected '{}'",
                self.store.table
            );
        }
        Ok(())
    }

    fn check_user(&self, actual: Option<&Value>) -> anyhow::Result<()> {
        match actual.and_then(Value::as_str) {
            Some(user) if user == self.user_id => Ok(()),
            Some(user) => bail!("store addressed user '{user}', expected '{}'", self.user_id),
            None => bail!("store key is missing '{}'", self.store.partition_key),
        }
    }
}

impl AttributeStore for PersistenceMock {
    fn read(&self, table: &str, key: &Map<String, Value>) -> anyhow::Result<Value> {
        self.check_table(table)?;
        self.check_user(key.get(&self.store.partition_key))?;

        let mut item = Map::new();
        item.insert(
            self.store.partition_key.clone(),
            Value::String(self.user_id.clone()),
        );
        item.insert(
            self.store.attributes_field.clone(),
            Value::Object(self.state.lock().prior.clone()),
        );
        let mut wrapper = Map::new();
        wrapper.insert("Item".to_string(), Value::Object(item));
        Ok(Value::Object(wrapper))
    }

    fn write(&self, table: &str, input: Value) -> anyhow::Result<()> {
        self.check_table(table)?;
        let item = input
            .get("Item")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("store write input is missing 'Item'"))?;
        self.check_user(item.get(&self.store.partition_key))?;
        self.state.lock().captured = Some(item.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn mock() -> PersistenceMock {
        PersistenceMock::new(StoreConfig::new("TestTable"), "amzn1.ask.account.VOID")
    }

    fn user_key() -> Map<String, Value> {
        let mut key = Map::new();
        key.insert("userId".to_string(), json!("amzn1.ask.account.VOID"));
        key
    }

    #[test]
    fn read_returns_declared_prior_state() {
        let mock = mock();
        let mut prior = Map::new();
        prior.insert("foo".to_string(), json!("bar"));
        mock.begin_turn(prior);

        let result = mock.read("TestTable", &user_key()).unwrap();
        assert_eq!(result["Item"]["mapAttr"]["foo"], "bar");
        assert_eq!(result["Item"]["userId"], "amzn1.ask.account.VOID");
    }

    #[test]
    fn read_defaults_to_empty_state() {
        let mock = mock();
        let result = mock.read("TestTable", &user_key()).unwrap();
        assert_eq!(result["Item"]["mapAttr"], json!({}));
    }

    #[test]
    fn read_rejects_wrong_table() {
        let mock = mock();
        let err = mock.read("OtherTable", &user_key()).unwrap_err();
        assert!(err.to_string().contains("expected 'TestTable'"));
    }

    #[test]
    fn read_rejects_wrong_user() {
        let mock = mock();
        let mut key = Map::new();
        key.insert("userId".to_string(), json!("amzn1.ask.account.OTHER"));
        assert!(mock.read("TestTable", &key).is_err());
    }

    #[test]
    fn write_captures_attributes_for_assertion() {
        let mock = mock();
        mock.write(
            "TestTable",
            json!({ "Item": { "userId": "amzn1.ask.account.VOID", "mapAttr": { "foo": "bar" } } }),
        )
        .unwrap();
        let captured = mock.captured_attributes().unwrap();
        assert_eq!(captured["foo"], "bar");
    }

    #[test]
    fn write_without_item_is_rejected() {
        let mock = mock();
        let err = mock.write("TestTable", json!({ "foo": 1 })).unwrap_err();
        assert!(err.to_string().contains("missing 'Item'"));
    }

    #[test]
    fn begin_turn_resets_captured_write() {
        let mock = mock();
        mock.write(
            "TestTable",
            json!({ "Item": { "userId": "amzn1.ask.account.VOID", "mapAttr": {} } }),
        )
        .unwrap();
        assert!(mock.captured_attributes().is_some());
        mock.begin_turn(Map::new());
        assert!(mock.captured_attributes().is_none());
    }
}
