use crate::config::WebhookConfig;
use crate::payload::CanonicalEvent;
use async_trait::async_trait;
use hyper::StatusCode;
use reqwest::header;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a delivery did not succeed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryFailure {
    /// The webhook could not be reached or did not answer in time.
    #[error("{0}")]
    Transport(String),

    /// The webhook answered with a status outside `[200, 400)`.
    #[error("HTTP {}", .status.as_u16())]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// `response` is the parsed JSON body, or the raw body when it does not
    /// parse to a truthy JSON value.
    Success { response: Value, status: StatusCode },
    Failure(DeliveryFailure),
}

impl DeliveryOutcome {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryOutcome::Success { status, .. } => Some(*status),
            DeliveryOutcome::Failure(DeliveryFailure::Status { status, .. }) => Some(*status),
            DeliveryOutcome::Failure(DeliveryFailure::Transport(_)) => None,
        }
    }
}

/// Sends one event to the webhook. Exactly one attempt per call.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, url: &Url, event: &CanonicalEvent) -> DeliveryOutcome;
}

/// Delivers events over HTTP(S) with reqwest.
///
/// Certificates and hostnames are always verified. Redirects are not
/// followed: a 3xx from the webhook is its final answer.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Deliver for WebhookClient {
    async fn deliver(&self, url: &Url, event: &CanonicalEvent) -> DeliveryOutcome {
        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::Failure(DeliveryFailure::Transport(e.to_string())),
        };

        let response = match self.client.post(url.clone()).body(body).send().await {
            Ok(response) => response,
            Err(e) => {
                return DeliveryOutcome::Failure(DeliveryFailure::Transport(describe_error(&e)));
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(text) => classify_response(status, text),
            Err(e) => DeliveryOutcome::Failure(DeliveryFailure::Transport(describe_error(&e))),
        }
    }
}

/// Maps an answer from the webhook to an outcome. Any status in `[200, 400)`
/// counts as delivered.
pub fn classify_response(status: StatusCode, body: String) -> DeliveryOutcome {
    if !(200..400).contains(&status.as_u16()) {
        return DeliveryOutcome::Failure(DeliveryFailure::Status { status, body });
    }

    let response = match serde_json::from_str::<Value>(&body) {
        Ok(parsed) if is_truthy(&parsed) => parsed,
        _ => Value::String(body),
    };

    DeliveryOutcome::Success { response, status }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// reqwest's display only names the failing step; the cause (refused,
/// timed out, certificate rejected) lives in the source chain.
fn describe_error(error: &reqwest::Error) -> String {
    let mut description = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }

    description
}
