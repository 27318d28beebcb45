pub mod calls;
pub mod contact;
pub mod flows;
pub mod msg;

use std::fmt::Debug;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::assets::{ContactReference, GroupReference, LabelReference};
use crate::contact::Urn;
use crate::events::EventPayload;
use crate::results::ResultValue;
use crate::run::RunContext;
use crate::services::{CallStatus, ServiceCall};

pub use calls::{CallWebhookAction, TransferAirtimeAction};
pub use contact::{
    AddContactGroupsAction, AddContactUrnAction, RemoveContactGroupsAction, SetContactFieldAction,
    SetContactLanguageAction, SetContactNameAction, SetContactStatusAction, SetContactTimezoneAction,
};
pub use flows::{EnterFlowAction, SetRunResultAction};
pub use msg::{AddInputLabelsAction, SendBroadcastAction, SendEmailAction, SendMsgAction};

pub const CATEGORY_SUCCESS: &str = "Success";
pub const CATEGORY_FAILURE: &str = "Failure";

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
});

/// A side-effecting step executed when a run passes through a node. Actions
/// never route; failures inside an action surface as error events and the
/// run continues.
#[typetag::serde(tag = "type")]
pub trait Action: Debug + Send + Sync {
    fn uuid(&self) -> Uuid;

    /// Static checks performed at flow validation time.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext);

    fn clone_box(&self) -> Box<dyn Action>;
}

impl Clone for Box<dyn Action> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Localizes then evaluates a message's text, attachments and quick replies.
/// Entries that evaluate to empty are dropped with an error event.
pub(crate) fn evaluate_message(
    ctx: &mut RunContext,
    action_uuid: Uuid,
    text: &str,
    attachments: &[String],
    quick_replies: &[String],
) -> (String, Vec<String>, Vec<String>) {
    let text_defaults = [text.to_string()];
    let localized_text = ctx.translate(action_uuid, "text", &text_defaults);
    let evaluated_text = ctx.evaluate_logged(&localized_text[0]);

    let localized_attachments = ctx.translate(action_uuid, "attachments", attachments);
    let mut evaluated_attachments = Vec::new();
    for attachment in &localized_attachments {
        let evaluated = ctx.evaluate_logged(attachment);
        if evaluated.trim().is_empty() {
            ctx.log_event(EventPayload::Error {
                text: "attachment text evaluated to empty string, skipping".to_string(),
            });
        } else {
            evaluated_attachments.push(evaluated);
        }
    }

    let localized_replies = ctx.translate(action_uuid, "quick_replies", quick_replies);
    let mut evaluated_replies = Vec::new();
    for reply in &localized_replies {
        let evaluated = ctx.evaluate_logged(reply);
        if evaluated.trim().is_empty() {
            ctx.log_event(EventPayload::Error {
                text: "quick reply evaluated to empty string, skipping".to_string(),
            });
        } else {
            evaluated_replies.push(evaluated);
        }
    }

    (evaluated_text, evaluated_attachments, evaluated_replies)
}

pub(crate) fn call_status_category(status: CallStatus) -> &'static str {
    match status {
        CallStatus::Success => CATEGORY_SUCCESS,
        _ => CATEGORY_FAILURE,
    }
}

/// Records an external call as a run result: value is the HTTP status code
/// ("0" for connection errors), extra is the response body when it parsed
/// as JSON.
pub(crate) fn save_call_result(ctx: &mut RunContext, name: &str, call: &ServiceCall) {
    let status = call.status();
    let value = call.response.as_ref().map(|r| r.status.to_string()).unwrap_or_else(|| "0".to_string());
    let extra = call
        .response
        .as_ref()
        .and_then(|r| r.body.as_deref())
        .and_then(|body| serde_json::from_str::<Value>(body).ok());

    let node_uuid = ctx.run().current_node_uuid().unwrap_or_else(Uuid::nil);
    ctx.save_result(ResultValue {
        name: name.to_string(),
        value,
        category: Some(call_status_category(status).to_string()),
        category_localized: None,
        node_uuid,
        input: Some(format!("{} {}", call.request.method, call.request.url)),
        extra,
        created_on: Utc::now(),
    });
}

/// Makes the latest webhook response available to templates as `webhook`.
/// Non-JSON bodies expose an empty object.
pub(crate) fn update_webhook(ctx: &mut RunContext, call: &ServiceCall) {
    let parsed = call
        .response
        .as_ref()
        .and_then(|r| r.body.as_deref())
        .and_then(|body| serde_json::from_str::<Value>(body).ok())
        .unwrap_or_else(|| Value::Object(Default::default()));
    ctx.run.set_webhook(parsed);
}

/// Resolves group references against the asset catalog. `name_match`
/// templates are evaluated and matched by name; a name that matches no
/// group is a plain error, while a broken static reference is a missing
/// dependency. Either way the entry is skipped.
pub(crate) fn resolve_groups(ctx: &mut RunContext, references: &[GroupReference]) -> Vec<GroupReference> {
    let mut resolved = Vec::with_capacity(references.len());
    for reference in references {
        if let Some(name_match) = &reference.name_match {
            let name = ctx.evaluate_logged(name_match);
            match ctx.assets().find_group_by_name(&name) {
                Some(group) => resolved.push(group.reference()),
                None => ctx.log_event(EventPayload::Error {
                    text: format!("no such group with name '{name}'"),
                }),
            }
            continue;
        }

        let found = if let Some(uuid) = reference.uuid {
            ctx.assets().group(uuid).map(|g| g.reference())
        } else {
            ctx.assets().find_group_by_name(&reference.name).map(|g| g.reference())
        };
        match found {
            Some(group) => resolved.push(group),
            None => ctx.log_event(EventPayload::DependencyMissing {
                reference: serde_json::json!({ "type": "group", "uuid": reference.uuid, "name": reference.name }),
            }),
        }
    }
    resolved
}

pub(crate) fn resolve_labels(ctx: &mut RunContext, references: &[LabelReference]) -> Vec<LabelReference> {
    let mut resolved = Vec::with_capacity(references.len());
    for reference in references {
        if let Some(name_match) = &reference.name_match {
            let name = ctx.evaluate_logged(name_match);
            match ctx.assets().find_label_by_name(&name) {
                Some(label) => resolved.push(label.reference()),
                None => ctx.log_event(EventPayload::Error {
                    text: format!("no such label with name '{name}'"),
                }),
            }
            continue;
        }

        let found = if let Some(uuid) = reference.uuid {
            ctx.assets().label(uuid).map(|l| l.reference())
        } else {
            ctx.assets().find_label_by_name(&reference.name).map(|l| l.reference())
        };
        match found {
            Some(label) => resolved.push(label),
            None => ctx.log_event(EventPayload::DependencyMissing {
                reference: serde_json::json!({ "type": "label", "uuid": reference.uuid, "name": reference.name }),
            }),
        }
    }
    resolved
}

/// Interprets legacy recipient variables, in priority order: a UUID is a
/// contact reference, then a group name match, then a parsable URN, and
/// finally a bare phone number.
pub(crate) fn resolve_recipients(
    ctx: &mut RunContext,
    legacy_vars: &[String],
) -> (Vec<GroupReference>, Vec<ContactReference>, Vec<Urn>) {
    let mut groups = Vec::new();
    let mut contacts = Vec::new();
    let mut urns = Vec::new();

    for var in legacy_vars {
        let evaluated = ctx.evaluate_logged(var);
        let evaluated = evaluated.trim();
        if evaluated.is_empty() {
            continue;
        }
        if UUID_REGEX.is_match(evaluated) {
            if let Ok(uuid) = evaluated.parse::<Uuid>() {
                contacts.push(ContactReference { uuid, name: String::new() });
                continue;
            }
        }
        if let Some(group) = ctx.assets().find_group_by_name(evaluated) {
            groups.push(group.reference());
            continue;
        }
        if let Ok(urn) = Urn::parse(evaluated) {
            urns.push(urn);
            continue;
        }
        if let Ok(urn) = Urn::from_parts("tel", evaluated) {
            urns.push(urn);
        }
    }

    (groups, contacts, urns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{RequestDescriptor, ResponseDescriptor};

    fn call(status: u16, body: Option<&str>) -> ServiceCall {
        ServiceCall {
            request: RequestDescriptor {
                method: "POST".to_string(),
                url: "http://example.com/hook".to_string(),
                headers: vec![],
                body: None,
            },
            response: Some(ResponseDescriptor { status, body: body.map(|b| b.to_string()) }),
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_call_status_category() {
        assert_eq!(call_status_category(call(200, None).status()), CATEGORY_SUCCESS);
        assert_eq!(call_status_category(call(500, None).status()), CATEGORY_FAILURE);
        assert_eq!(call_status_category(call(410, None).status()), CATEGORY_FAILURE);
    }

    #[test]
    fn test_uuid_regex() {
        assert!(!UUID_REGEX.is_match("0725normal-not-a-uuid"));
        assert!(!UUID_REGEX.is_match("5e08c2d7-88f9-48a7-92f2-e01b32fsdf90"));
        assert!(UUID_REGEX.is_match(&Uuid::new_v4().to_string()));
    }
}
