use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Everything after the scheme must be non-empty; `tel` paths are kept in a
/// normalized `+<digits>` form.
static TEL_CLEANUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-().]").unwrap());

#[derive(Debug, Error)]
pub enum UrnError {
    #[error("'{0}' is not a valid URN")]
    Invalid(String),
    #[error("'{0}' is not a valid URN scheme")]
    InvalidScheme(String),
}

/// A uniform resource name for reaching a contact, e.g. `tel:+12065551212`
/// or `telegram:74747474`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    pub fn parse(value: &str) -> Result<Urn, UrnError> {
        match value.split_once(':') {
            Some((scheme, path)) if !scheme.is_empty() && !path.is_empty() => {
                Ok(Urn(format!("{}:{}", scheme, path)))
            }
            _ => Err(UrnError::Invalid(value.to_string())),
        }
    }

    /// Builds a URN from a scheme and raw path, normalizing `tel` paths the
    /// way the legacy variable resolution expects: strip formatting
    /// characters and require something that still looks like a number.
    pub fn from_parts(scheme: &str, path: &str) -> Result<Urn, UrnError> {
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(UrnError::InvalidScheme(scheme.to_string()));
        }
        let path = if scheme == "tel" {
            let cleaned = TEL_CLEANUP.replace_all(path, "").to_string();
            let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(UrnError::Invalid(format!("{}:{}", scheme, path)));
            }
            if cleaned.starts_with('+') {
                cleaned
            } else {
                format!("+{}", cleaned)
            }
        } else {
            path.to_string()
        };
        if path.is_empty() {
            return Err(UrnError::Invalid(format!("{}:{}", scheme, path)));
        }
        Ok(Urn(format!("{}:{}", scheme, path)))
    }

    pub fn scheme(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.0.split_once(':').map(|(_, p)| p).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Active,
    Blocked,
    Stopped,
    Archived,
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContactStatus::Active => "active",
            ContactStatus::Blocked => "blocked",
            ContactStatus::Stopped => "stopped",
            ContactStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// The mutable contact snapshot scoped to a session. There is exactly one
/// writer (the session's traversal), so mutations are applied in place and
/// are immediately visible to subsequent actions and routers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Contact {
    uuid: Uuid,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
    status: ContactStatus,
    #[serde(default)]
    urns: Vec<Urn>,
    /// UUIDs of the groups the contact belongs to.
    #[serde(default)]
    groups: Vec<Uuid>,
    /// Field key to text value; a `None` value means the field is cleared.
    #[serde(default)]
    fields: HashMap<String, Option<String>>,
    created_on: DateTime<Utc>,
}

impl Contact {
    pub fn new(name: impl Into<String>) -> Self {
        Contact {
            uuid: Uuid::new_v4(),
            name: name.into(),
            language: None,
            timezone: None,
            status: ContactStatus::Active,
            urns: Vec::new(),
            groups: Vec::new(),
            fields: HashMap::new(),
            created_on: Utc::now(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    pub fn set_timezone(&mut self, timezone: Option<String>) {
        self.timezone = timezone;
    }

    pub fn status(&self) -> ContactStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ContactStatus) {
        self.status = status;
    }

    pub fn urns(&self) -> &[Urn] {
        &self.urns
    }

    /// The highest-priority URN, used as the default message destination.
    pub fn preferred_urn(&self) -> Option<&Urn> {
        self.urns.first()
    }

    /// Appends a URN unless the contact already has it.
    pub fn add_urn(&mut self, urn: Urn) -> bool {
        if self.urns.contains(&urn) {
            return false;
        }
        self.urns.push(urn);
        true
    }

    pub fn remove_urn(&mut self, urn: &Urn) -> bool {
        let before = self.urns.len();
        self.urns.retain(|u| u != urn);
        self.urns.len() != before
    }

    pub fn group_uuids(&self) -> &[Uuid] {
        &self.groups
    }

    pub fn in_group(&self, uuid: Uuid) -> bool {
        self.groups.contains(&uuid)
    }

    pub fn add_to_group(&mut self, uuid: Uuid) -> bool {
        if self.groups.contains(&uuid) {
            return false;
        }
        self.groups.push(uuid);
        true
    }

    pub fn remove_from_group(&mut self, uuid: Uuid) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| *g != uuid);
        self.groups.len() != before
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_deref())
    }

    pub fn fields(&self) -> &HashMap<String, Option<String>> {
        &self.fields
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: Option<String>) {
        self.fields.insert(key.into(), value);
    }

    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn_parse() {
        let urn = Urn::parse("tel:+12065551212").unwrap();
        assert_eq!(urn.scheme(), "tel");
        assert_eq!(urn.path(), "+12065551212");
        assert!(Urn::parse("nocolon").is_err());
        assert!(Urn::parse("tel:").is_err());
    }

    #[test]
    fn test_tel_urn_normalization() {
        let urn = Urn::from_parts("tel", "(206) 555-1212").unwrap();
        assert_eq!(urn.as_str(), "tel:+2065551212");
        assert!(Urn::from_parts("tel", "bananas").is_err());
        assert!(Urn::from_parts("Tel", "+12065551212").is_err());
    }

    #[test]
    fn test_urn_dedup() {
        let mut contact = Contact::new("Bob");
        let urn = Urn::parse("tel:+12065551212").unwrap();
        assert!(contact.add_urn(urn.clone()));
        assert!(!contact.add_urn(urn.clone()));
        assert_eq!(contact.urns().len(), 1);
        assert!(contact.remove_urn(&urn));
        assert!(contact.preferred_urn().is_none());
    }

    #[test]
    fn test_group_membership() {
        let mut contact = Contact::new("Bob");
        let group = Uuid::new_v4();
        assert!(!contact.in_group(group));
        assert!(contact.add_to_group(group));
        assert!(!contact.add_to_group(group));
        assert!(contact.in_group(group));
        assert!(contact.remove_from_group(group));
        assert!(!contact.in_group(group));
    }

    #[test]
    fn test_cleared_field_reads_as_absent() {
        let mut contact = Contact::new("Bob");
        contact.set_field("gender", Some("Male".to_string()));
        assert_eq!(contact.field("gender"), Some("Male"));
        contact.set_field("gender", None);
        assert_eq!(contact.field("gender"), None);
    }
}
