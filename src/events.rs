use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::{ContactReference, FieldReference, FlowReference, GroupReference, LabelReference};
use crate::contact::{ContactStatus, Urn};
use crate::inputs::{DialStatus, MsgIn, MsgOut};
use crate::results::ResultValue;
use crate::services::{AirtimeTransfer, CallStatus, ServiceCall};

/// An immutable record of something that happened during execution. Events
/// are the sole channel for observing side effects outside a run's own
/// state; within a run they are strictly ordered by emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub created_on: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Event { created_on: Utc::now(), payload }
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    MsgCreated {
        msg: MsgOut,
    },
    MsgReceived {
        msg: MsgIn,
    },
    BroadcastCreated {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        quick_replies: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups: Vec<GroupReference>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contacts: Vec<ContactReference>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        urns: Vec<Urn>,
    },
    EmailSent {
        to: Vec<String>,
        subject: String,
        body: String,
    },
    WebhookCalled {
        call: ServiceCall,
        status: CallStatus,
    },
    AirtimeTransferred {
        transfer: AirtimeTransfer,
        status: CallStatus,
    },
    ContactStatusChanged {
        status: ContactStatus,
    },
    ContactFieldChanged {
        field: FieldReference,
        value: Option<String>,
    },
    ContactGroupsChanged {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups_added: Vec<GroupReference>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups_removed: Vec<GroupReference>,
    },
    ContactLanguageChanged {
        language: Option<String>,
    },
    ContactTimezoneChanged {
        timezone: Option<String>,
    },
    ContactNameChanged {
        name: String,
    },
    ContactUrnsChanged {
        urns: Vec<Urn>,
    },
    InputLabelsAdded {
        labels: Vec<LabelReference>,
    },
    RunResultChanged {
        result: ResultValue,
    },
    FlowEntered {
        flow: FlowReference,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_run_uuid: Option<Uuid>,
        #[serde(default)]
        terminal: bool,
    },
    MsgWait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_on: Option<DateTime<Utc>>,
    },
    DialWait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_on: Option<DateTime<Utc>>,
    },
    DialEnded {
        status: DialStatus,
        duration_seconds: u64,
    },
    RunExpired,
    Error {
        text: String,
    },
    Failure {
        text: String,
    },
    DependencyMissing {
        reference: serde_json::Value,
    },
}

impl EventPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::MsgCreated { .. } => "msg_created",
            EventPayload::MsgReceived { .. } => "msg_received",
            EventPayload::BroadcastCreated { .. } => "broadcast_created",
            EventPayload::EmailSent { .. } => "email_sent",
            EventPayload::WebhookCalled { .. } => "webhook_called",
            EventPayload::AirtimeTransferred { .. } => "airtime_transferred",
            EventPayload::ContactStatusChanged { .. } => "contact_status_changed",
            EventPayload::ContactFieldChanged { .. } => "contact_field_changed",
            EventPayload::ContactGroupsChanged { .. } => "contact_groups_changed",
            EventPayload::ContactLanguageChanged { .. } => "contact_language_changed",
            EventPayload::ContactTimezoneChanged { .. } => "contact_timezone_changed",
            EventPayload::ContactNameChanged { .. } => "contact_name_changed",
            EventPayload::ContactUrnsChanged { .. } => "contact_urns_changed",
            EventPayload::InputLabelsAdded { .. } => "input_labels_added",
            EventPayload::RunResultChanged { .. } => "run_result_changed",
            EventPayload::FlowEntered { .. } => "flow_entered",
            EventPayload::MsgWait { .. } => "msg_wait",
            EventPayload::DialWait { .. } => "dial_wait",
            EventPayload::DialEnded { .. } => "dial_ended",
            EventPayload::RunExpired => "run_expired",
            EventPayload::Error { .. } => "error",
            EventPayload::Failure { .. } => "failure",
            EventPayload::DependencyMissing { .. } => "dependency_missing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trip() {
        let event = Event::new(EventPayload::ContactStatusChanged { status: ContactStatus::Blocked });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "contact_status_changed");
        assert_eq!(json["status"], "blocked");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_type_names_match_serialized_tags() {
        let payloads = vec![
            EventPayload::Error { text: "boom".to_string() },
            EventPayload::RunExpired,
            EventPayload::ContactNameChanged { name: "Bob".to_string() },
        ];
        for payload in payloads {
            let json = serde_json::to_value(Event::new(payload.clone())).unwrap();
            assert_eq!(json["type"], payload.type_name());
        }
    }
}
