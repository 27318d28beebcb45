use std::collections::HashMap;
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::contact::Urn;

/// Max bytes of a response body captured into events and result extras.
/// Larger bodies are omitted entirely rather than truncated mid-content.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10_000;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no {0} service configured")]
    NotConfigured(&'static str),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Provider(String),
}

/// The fixed status taxonomy every external call outcome is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    ResponseError,
    ConnectionError,
    SubscriberGone,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::ResponseError => "response_error",
            CallStatus::ConnectionError => "connection_error",
            CallStatus::SubscriberGone => "subscriber_gone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseDescriptor {
    pub status: u16,
    /// `None` when there was no body or it exceeded the capture ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One completed or failed call attempt. Never persisted beyond the run's
/// captured event and result payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceCall {
    pub request: RequestDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseDescriptor>,
    pub elapsed_ms: u64,
}

impl ServiceCall {
    /// Classifies this call: transport failure without a response is a
    /// connection error, HTTP 410 means the destination explicitly rejected
    /// delivery, any other non-2xx is a response error. Provider-level
    /// errors hidden inside 2xx bodies are the provider service's concern
    /// (see `AirtimeService`).
    pub fn status(&self) -> CallStatus {
        match &self.response {
            None => CallStatus::ConnectionError,
            Some(response) if response.status == 410 => CallStatus::SubscriberGone,
            Some(response) if (200..300).contains(&response.status) => CallStatus::Success,
            Some(_) => CallStatus::ResponseError,
        }
    }
}

/// Webhook transport. `call` makes exactly one synchronous attempt; the
/// engine never retries. Transport failures are returned as a `ServiceCall`
/// without a response so the classifier sees them; `Err` is reserved for
/// requests that could not even be constructed.
pub trait WebhookService: Send + Sync {
    fn call(&self, request: RequestDescriptor) -> Result<ServiceCall, ServiceError>;
}

/// The outcome of an airtime transfer attempt. An actual amount of zero
/// means the provider rejected the transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AirtimeTransfer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Urn>,
    pub recipient: Urn,
    pub currency: String,
    pub desired_amount: f64,
    pub actual_amount: f64,
}

impl AirtimeTransfer {
    pub fn status(&self) -> CallStatus {
        if self.actual_amount > 0.0 {
            CallStatus::Success
        } else {
            CallStatus::ResponseError
        }
    }
}

pub trait AirtimeService: Send + Sync {
    fn transfer(
        &self,
        sender: Option<&Urn>,
        recipient: &Urn,
        amounts: &HashMap<String, f64>,
    ) -> Result<AirtimeTransfer, ServiceError>;
}

pub trait EmailService: Send + Sync {
    fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), ServiceError>;
}

/// Stock webhook service over blocking reqwest with a per-request timeout.
pub struct HttpWebhookService {
    client: reqwest::blocking::Client,
    max_body_bytes: usize,
}

impl HttpWebhookService {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self, ServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;
        Ok(HttpWebhookService { client, max_body_bytes })
    }
}

impl WebhookService for HttpWebhookService {
    fn call(&self, request: RequestDescriptor) -> Result<ServiceCall, ServiceError> {
        let url = Url::parse(&request.url).map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ServiceError::InvalidRequest(format!("invalid method '{}'", request.method)))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let outcome = builder.send();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().ok().filter(|b| !b.is_empty() && b.len() <= self.max_body_bytes);
                Some(ResponseDescriptor { status, body })
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "webhook transport failure");
                None
            }
        };

        Ok(ServiceCall { request, response, elapsed_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(response: Option<ResponseDescriptor>) -> ServiceCall {
        ServiceCall {
            request: RequestDescriptor {
                method: "GET".to_string(),
                url: "http://example.com/hook".to_string(),
                headers: vec![],
                body: None,
            },
            response,
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(call(None).status(), CallStatus::ConnectionError);
        assert_eq!(call(Some(ResponseDescriptor { status: 200, body: None })).status(), CallStatus::Success);
        assert_eq!(call(Some(ResponseDescriptor { status: 201, body: None })).status(), CallStatus::Success);
        assert_eq!(call(Some(ResponseDescriptor { status: 410, body: None })).status(), CallStatus::SubscriberGone);
        assert_eq!(call(Some(ResponseDescriptor { status: 500, body: None })).status(), CallStatus::ResponseError);
        assert_eq!(call(Some(ResponseDescriptor { status: 400, body: None })).status(), CallStatus::ResponseError);
    }

    #[test]
    fn test_airtime_transfer_status() {
        let urn = Urn::parse("tel:+12065551212").unwrap();
        let mut transfer = AirtimeTransfer {
            sender: None,
            recipient: urn,
            currency: "USD".to_string(),
            desired_amount: 1.5,
            actual_amount: 0.0,
        };
        assert_eq!(transfer.status(), CallStatus::ResponseError);
        transfer.actual_amount = 1.5;
        assert_eq!(transfer.status(), CallStatus::Success);
    }
}
