use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::{ContactReference, GroupReference, LabelReference};
use crate::contact::Urn;
use crate::events::EventPayload;
use crate::inputs::MsgOut;
use crate::run::RunContext;

use super::{evaluate_message, resolve_labels, resolve_recipients, Action};

/// Sends a message to the current contact over their preferred URN, or over
/// every URN when `all_urns` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMsgAction {
    pub uuid: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
    #[serde(default)]
    pub all_urns: bool,
}

#[typetag::serde(name = "send_msg")]
impl Action for SendMsgAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("text is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let (text, attachments, quick_replies) =
            evaluate_message(ctx, self.uuid, &self.text, &self.attachments, &self.quick_replies);
        if text.is_empty() && attachments.is_empty() {
            ctx.log_event(EventPayload::Error { text: "need text or attachments to send a message".to_string() });
            return;
        }

        let destinations: Vec<Option<Urn>> = if self.all_urns && !ctx.contact().urns().is_empty() {
            ctx.contact().urns().iter().cloned().map(Some).collect()
        } else {
            vec![ctx.contact().preferred_urn().cloned()]
        };

        for urn in destinations {
            let msg = MsgOut::new(urn, text.clone(), attachments.clone(), quick_replies.clone());
            ctx.log_event(EventPayload::MsgCreated { msg });
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Sends a message to a set of groups, contacts and raw URNs beyond the
/// current session's contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendBroadcastAction {
    pub uuid: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<ContactReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urns: Vec<Urn>,
    /// Recipient expressions from imported legacy flows, resolved at
    /// runtime into contacts, groups or URNs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_vars: Vec<String>,
}

#[typetag::serde(name = "send_broadcast")]
impl Action for SendBroadcastAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("text is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let (text, attachments, quick_replies) =
            evaluate_message(ctx, self.uuid, &self.text, &self.attachments, &self.quick_replies);

        let mut groups = super::resolve_groups(ctx, &self.groups);
        let mut contacts = self.contacts.clone();
        let mut urns = self.urns.clone();

        let (legacy_groups, legacy_contacts, legacy_urns) = resolve_recipients(ctx, &self.legacy_vars);
        groups.extend(legacy_groups);
        contacts.extend(legacy_contacts);
        urns.extend(legacy_urns);

        if groups.is_empty() && contacts.is_empty() && urns.is_empty() {
            ctx.log_event(EventPayload::Error { text: "need at least one recipient to send a broadcast".to_string() });
            return;
        }
        if text.is_empty() {
            ctx.log_event(EventPayload::Error { text: "need text to send a broadcast".to_string() });
            return;
        }

        ctx.log_event(EventPayload::BroadcastCreated { text, attachments, quick_replies, groups, contacts, urns });
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Sends an email via the configured email service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailAction {
    pub uuid: Uuid,
    pub addresses: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[typetag::serde(name = "send_email")]
impl Action for SendEmailAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.addresses.is_empty() {
            return Err("addresses are required".to_string());
        }
        if self.subject.is_empty() {
            return Err("subject is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        // subjects can't contain newlines, even when templates produce them
        let subject = ctx.evaluate_logged(&self.subject).replace(['\n', '\r'], " ").trim().to_string();
        let body = ctx.evaluate_logged(&self.body);
        let addresses: Vec<String> = self
            .addresses
            .iter()
            .map(|a| ctx.evaluate_logged(a))
            .map(|a| a.trim_start_matches("mailto:").to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if subject.is_empty() {
            ctx.log_event(EventPayload::Error { text: "email subject evaluated to empty string, skipping".to_string() });
            return;
        }
        if addresses.is_empty() {
            ctx.log_event(EventPayload::Error { text: "no email addresses to send to, skipping".to_string() });
            return;
        }

        match ctx.engine().email_service() {
            Some(service) => match service.send(&addresses, &subject, &body) {
                Ok(()) => ctx.log_event(EventPayload::EmailSent { to: addresses, subject, body }),
                Err(e) => ctx.log_event(EventPayload::Error { text: e.to_string() }),
            },
            None => ctx.log_event(EventPayload::Error { text: "no email service configured".to_string() }),
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Applies labels to the input that started or resumed the current run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddInputLabelsAction {
    pub uuid: Uuid,
    pub labels: Vec<LabelReference>,
}

#[typetag::serde(name = "add_input_labels")]
impl Action for AddInputLabelsAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.labels.is_empty() {
            return Err("labels are required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        if ctx.input().is_none() {
            ctx.log_event(EventPayload::Error { text: "no input to add labels to".to_string() });
            return;
        }
        let labels = resolve_labels(ctx, &self.labels);
        if !labels.is_empty() {
            ctx.log_event(EventPayload::InputLabelsAdded { labels });
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}
