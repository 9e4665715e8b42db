//! Translation-key resolution for expected strings.
//!
//! Resources are maps from key to either a string or a list of strings,
//! grouped by locale. `%s` placeholders are substituted in argument order,
//! mirroring sprintf-style post-processing. A pass-through collaborator;
//! the hard logic lives elsewhere.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{HarnessError, Result};

/// Per-locale translation resources.
#[derive(Debug, Clone, Default)]
pub struct LocaleService {
    locale: String,
    resources: HashMap<String, HashMap<String, Value>>,
}

impl LocaleService {
    /// Build from `locale -> key -> string-or-list` resources.
    #[must_use]
    pub fn new(
        locale: impl Into<String>,
        resources: HashMap<String, HashMap<String, Value>>,
    ) -> Self {
        Self {
            locale: locale.into(),
            resources,
        }
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Resolve a key to a string, substituting `%s` placeholders in order.
    /// A list-valued resource resolves to its first element.
    pub fn translate(&self, key: &str, args: &[&str]) -> Result<String> {
        let value = self.entry(key)?;
        let template = match value {
            Value::String(text) => text.clone(),
            Value::Array(items) => items
                .first()
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| {
                    HarnessError::Locale(format!("key '{key}' resolves to an empty list"))
                })?,
            other => {
                return Err(HarnessError::Locale(format!(
                    "key '{key}' resolves to unsupported value: {other}"
                )));
            }
        };
        Ok(substitute(&template, args))
    }

    /// Resolve a key to its list form; a string-valued resource resolves to
    /// a one-element list.
    pub fn translate_list(&self, key: &str) -> Result<Vec<String>> {
        match self.entry(key)? {
            Value::String(text) => Ok(vec![text.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(ToString::to_string).ok_or_else(|| {
                        HarnessError::Locale(format!("key '{key}' contains a non-string entry"))
                    })
                })
                .collect(),
            other => Err(HarnessError::Locale(format!(
                "key '{key}' resolves to unsupported value: {other}"
            ))),
        }
    }

    fn entry(&self, key: &str) -> Result<&Value> {
        let table = self.resources.get(&self.locale).ok_or_else(|| {
            HarnessError::Locale(format!("no resources for locale '{}'", self.locale))
        })?;
        table.get(key).ok_or_else(|| {
            HarnessError::Locale(format!(
                "key '{key}' not found for locale '{}'",
                self.locale
            ))
        })
    }
}

fn substitute(template: &str, args: &[&str]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;
    let mut args = args.iter();
    while let Some(index) = remaining.find("%s") {
        result.push_str(&remaining[..index]);
        match args.next() {
            Some(arg) => result.push_str(arg),
            None => result.push_str("%s"),
        }
        remaining = &remaining[index + 2..];
    }
    result.push_str(remaining);
    result
}
