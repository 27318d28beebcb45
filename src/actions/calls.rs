use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::EventPayload;
use crate::results::ResultValue;
use crate::run::RunContext;
use crate::services::{CallStatus, RequestDescriptor};

use super::{call_status_category, save_call_result, update_webhook, Action, CATEGORY_FAILURE};

/// Makes a single HTTP call and exposes its response to later nodes, both
/// as the `webhook` template context and optionally as a named result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallWebhookAction {
    pub uuid: Uuid,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
}

#[typetag::serde(name = "call_webhook")]
impl Action for CallWebhookAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("url is required".to_string());
        }
        match self.method.to_uppercase().as_str() {
            "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" => Ok(()),
            other => Err(format!("invalid method '{other}'")),
        }
    }

    fn execute(&self, ctx: &mut RunContext) {
        let url = ctx.evaluate_logged(&self.url).trim().to_string();
        if url.is_empty() {
            ctx.log_event(EventPayload::Error { text: "webhook URL evaluated to empty string, skipping".to_string() });
            return;
        }

        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), ctx.evaluate_logged(value)))
            .collect();
        let body = self.body.as_ref().map(|b| ctx.evaluate_logged(b));

        let request = RequestDescriptor { method: self.method.to_uppercase(), url, headers, body };

        let service = match ctx.engine().webhook_service() {
            Some(service) => service,
            None => {
                ctx.log_event(EventPayload::Error { text: "no webhook service configured".to_string() });
                return;
            }
        };

        match service.call(request) {
            Ok(mut call) => {
                // bodies over the capture ceiling are omitted, not truncated
                let max_body_bytes = ctx.engine().max_body_bytes();
                if let Some(response) = &mut call.response {
                    if response.body.as_ref().is_some_and(|b| b.len() > max_body_bytes) {
                        response.body = None;
                    }
                }

                let status = call.status();
                update_webhook(ctx, &call);
                if let Some(result_name) = &self.result_name {
                    save_call_result(ctx, result_name, &call);
                }
                ctx.log_event(EventPayload::WebhookCalled { call, status });
            }
            Err(e) => ctx.log_event(EventPayload::Error { text: e.to_string() }),
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Transfers airtime to the contact's phone number via the configured
/// airtime service. The outcome is always recorded as a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAirtimeAction {
    pub uuid: Uuid,
    /// Transferable amount per currency code; the service picks the
    /// currency matching the recipient.
    pub amounts: HashMap<String, f64>,
    pub result_name: String,
}

#[typetag::serde(name = "transfer_airtime")]
impl Action for TransferAirtimeAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.amounts.is_empty() {
            return Err("amounts are required".to_string());
        }
        if self.result_name.is_empty() {
            return Err("result_name is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let recipient = ctx.contact().urns().iter().find(|u| u.scheme() == "tel").cloned();
        let node_uuid = ctx.run().current_node_uuid().unwrap_or_else(Uuid::nil);

        fn failed(ctx: &mut RunContext<'_>, name: &str, node_uuid: Uuid, text: String) {
            ctx.log_event(EventPayload::Error { text });
            ctx.save_result(ResultValue {
                name: name.to_string(),
                value: "0".to_string(),
                category: Some(CATEGORY_FAILURE.to_string()),
                category_localized: None,
                node_uuid,
                input: None,
                extra: None,
                created_on: Utc::now(),
            });
        }

        let recipient = match recipient {
            Some(recipient) => recipient,
            None => {
                failed(ctx, &self.result_name, node_uuid, "can't transfer airtime to contact without a phone number".to_string());
                return;
            }
        };

        let service = match ctx.engine().airtime_service() {
            Some(service) => service,
            None => {
                failed(ctx, &self.result_name, node_uuid, "no airtime service configured".to_string());
                return;
            }
        };

        match service.transfer(None, &recipient, &self.amounts) {
            Ok(transfer) => {
                let status = transfer.status();
                ctx.save_result(ResultValue {
                    name: self.result_name.clone(),
                    value: transfer.actual_amount.to_string(),
                    category: Some(call_status_category(status).to_string()),
                    category_localized: None,
                    node_uuid,
                    input: None,
                    extra: None,
                    created_on: Utc::now(),
                });
                if status != CallStatus::Success {
                    ctx.log_event(EventPayload::Error { text: "airtime transfer failed".to_string() });
                }
                ctx.log_event(EventPayload::AirtimeTransferred { transfer, status });
            }
            Err(e) => failed(ctx, &self.result_name, node_uuid, e.to_string()),
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}
