use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A named, categorized value computed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultValue {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_localized: Option<String>,
    pub node_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    pub created_on: DateTime<Utc>,
}

/// Normalizes a result name into its stable mapping key: case-folded, with
/// runs of non-alphanumeric characters collapsed to single underscores.
pub fn snakify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// The per-run result mapping: normalized name → latest value,
/// last-write-wins. History is preserved in the event log, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results(BTreeMap<String, ResultValue>);

impl Results {
    pub fn new() -> Self {
        Results::default()
    }

    /// Stores a result, overwriting any prior entry under the same
    /// normalized key. Values are never validated; any text is accepted.
    pub fn save(&mut self, result: ResultValue) {
        self.0.insert(snakify(&result.name), result);
    }

    pub fn get(&self, name: &str) -> Option<&ResultValue> {
        self.0.get(&snakify(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResultValue)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, value: &str) -> ResultValue {
        ResultValue {
            name: name.to_string(),
            value: value.to_string(),
            category: None,
            category_localized: None,
            node_uuid: Uuid::new_v4(),
            input: None,
            extra: None,
            created_on: Utc::now(),
        }
    }

    #[test]
    fn test_snakify() {
        assert_eq!(snakify("Favorite Color"), "favorite_color");
        assert_eq!(snakify("  Response  1 "), "response_1");
        assert_eq!(snakify("RÉPONSE"), "réponse");
        assert_eq!(snakify("a-b_c"), "a_b_c");
    }

    #[test]
    fn test_save_overwrites_by_normalized_key() {
        let mut results = Results::new();
        results.save(result("Favorite Color", "red"));
        results.save(result("favorite color", "blue"));

        assert_eq!(results.len(), 1);
        assert_eq!(results.get("Favorite  Color").map(|r| r.value.as_str()), Some("blue"));
    }
}
