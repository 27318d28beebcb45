use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::ChannelReference;
use crate::contact::Urn;

/// An incoming message from the remote party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MsgIn {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelReference>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl MsgIn {
    pub fn new(text: impl Into<String>) -> Self {
        MsgIn {
            uuid: Uuid::new_v4(),
            urn: None,
            channel: None,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_urn(mut self, urn: Urn) -> Self {
        self.urn = Some(urn);
        self
    }
}

/// An outgoing message created by a message-sending action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MsgOut {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

impl MsgOut {
    pub fn new(urn: Option<Urn>, text: String, attachments: Vec<String>, quick_replies: Vec<String>) -> Self {
        MsgOut { uuid: Uuid::new_v4(), urn, text, attachments, quick_replies }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DialStatus {
    Answered,
    Busy,
    NoAnswer,
    Failed,
}

/// The session-level input: the last external stimulus a resume supplied.
/// Template evaluations see it as `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    Msg {
        msg: MsgIn,
        created_on: DateTime<Utc>,
    },
    Dial {
        status: DialStatus,
        duration_seconds: u64,
        created_on: DateTime<Utc>,
    },
}

impl Input {
    /// The raw text of this input, used as the default router operand.
    pub fn text(&self) -> Option<&str> {
        match self {
            Input::Msg { msg, .. } => Some(&msg.text),
            Input::Dial { .. } => None,
        }
    }
}
