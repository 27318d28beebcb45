use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::contact::Contact;
use crate::definition::Flow;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unable to parse query '{0}'")]
    Unparseable(String),
    #[error("group queries may not reference group membership: '{0}'")]
    GroupCondition(String),
}

/// A minimal dynamic-group query: a conjunction of `key = "value"` clauses
/// over contact fields, `language` and `status`. Queries cannot reference
/// group membership, which is what keeps cascading re-evaluation acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupQuery {
    raw: String,
    clauses: Vec<(String, String)>,
}

impl GroupQuery {
    pub fn parse(raw: &str) -> Result<GroupQuery, QueryError> {
        let mut clauses = Vec::new();
        for part in raw.split(" AND ") {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| QueryError::Unparseable(raw.to_string()))?;
            let key = key.trim().to_lowercase();
            let value = value.trim().trim_matches('"').to_string();
            if key.is_empty() {
                return Err(QueryError::Unparseable(raw.to_string()));
            }
            if key == "group" || key == "groups" {
                return Err(QueryError::GroupCondition(raw.to_string()));
            }
            clauses.push((key, value));
        }
        Ok(GroupQuery { raw: raw.to_string(), clauses })
    }

    /// Tests the contact against every clause; all must match.
    pub fn matches(&self, contact: &Contact) -> bool {
        self.clauses.iter().all(|(key, value)| match key.as_str() {
            "language" => contact.language().map(|l| l.eq_ignore_ascii_case(value)).unwrap_or(false),
            "status" => contact.status().to_string() == value.to_lowercase(),
            _ => contact.field(key).map(|v| v.eq_ignore_ascii_case(value)).unwrap_or(false),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for GroupQuery {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GroupQuery::parse(&value)
    }
}

impl From<GroupQuery> for String {
    fn from(query: GroupQuery) -> String {
        query.raw
    }
}

/// A contact group, either static or dynamic (query-based).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub query: Option<GroupQuery>,
}

impl Group {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Group { uuid, name: name.into(), query: None }
    }

    pub fn with_query(mut self, query: GroupQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.query.is_some()
    }

    pub fn reference(&self) -> GroupReference {
        GroupReference { uuid: Some(self.uuid), name: self.name.clone(), name_match: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Label {
    pub uuid: Uuid,
    pub name: String,
}

impl Label {
    pub fn reference(&self) -> LabelReference {
        LabelReference { uuid: Some(self.uuid), name: self.name.clone(), name_match: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Channel {
    pub uuid: Uuid,
    pub name: String,
    /// URN schemes this channel can deliver to.
    #[serde(default)]
    pub schemes: Vec<String>,
}

impl Channel {
    pub fn reference(&self) -> ChannelReference {
        ChannelReference { uuid: self.uuid, name: self.name.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub key: String,
    pub name: String,
}

/// Reference to a group: either a fixed UUID or a name expression evaluated
/// at runtime against the group catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChannelReference {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldReference {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContactReference {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowReference {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
}

/// All static assets a session may reference, queried by UUID (`get`) or by
/// exact name (`find_by_name`). Absence of a UUID match is reported by the
/// caller as a dependency-missing event, never as a panic.
#[derive(Debug, Default)]
pub struct SessionAssets {
    groups: Vec<Group>,
    labels: Vec<Label>,
    channels: Vec<Channel>,
    fields: HashMap<String, Field>,
    flows: HashMap<Uuid, Flow>,
}

impl SessionAssets {
    pub fn new(groups: Vec<Group>, labels: Vec<Label>, channels: Vec<Channel>, fields: Vec<Field>, flows: Vec<Flow>) -> Self {
        SessionAssets {
            groups,
            labels,
            channels,
            fields: fields.into_iter().map(|f| (f.key.clone(), f)).collect(),
            flows: flows.into_iter().map(|f| (f.uuid(), f)).collect(),
        }
    }

    pub fn group(&self, uuid: Uuid) -> Option<&Group> {
        self.groups.iter().find(|g| g.uuid == uuid)
    }

    pub fn find_group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn label(&self, uuid: Uuid) -> Option<&Label> {
        self.labels.iter().find(|l| l.uuid == uuid)
    }

    pub fn find_label_by_name(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }

    pub fn channel(&self, uuid: Uuid) -> Option<&Channel> {
        self.channels.iter().find(|c| c.uuid == uuid)
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn flow(&self, uuid: Uuid) -> Option<&Flow> {
        self.flows.get(&uuid)
    }
}
