use crate::config::WebhookTarget;
use crate::delivery::{Deliver, DeliveryFailure, DeliveryOutcome};
use crate::diagnostic_log::DiagnosticLog;
use crate::errors::RelayError;
use crate::metrics_defs::{DELIVERY_DURATION, REQUEST_DURATION, REQUESTS};
use crate::payload::{RawSelection, RequestMeta, format_timestamp, normalize};
use crate::response;
use chrono::Utc;
use http::request::Parts;
use http::uri::Authority;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HOST, HeaderName, USER_AGENT};
use hyper::service::Service;
use hyper::{Method, Request, Response};
use serde::Serialize;
use serde_json::Value;
use shared::http::PeerAddr;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use url::Url;
use uuid::Uuid;

pub type HookBody = BoxBody<Bytes, Infallible>;

/// What a successfully handled request turns into.
enum Reply {
    Preflight,
    TestPage,
    Delivered {
        n8n_response: Value,
        timestamp: String,
        route_id: String,
    },
}

/// A failed request, with the caller's payload when it was valid.
struct Rejection {
    error: RelayError,
    received: Option<(RawSelection, String)>,
}

impl From<RelayError> for Rejection {
    fn from(error: RelayError) -> Self {
        Rejection {
            error,
            received: None,
        }
    }
}

#[derive(Serialize)]
struct DeliveryLogEntry<'a> {
    url: &'a str,
    payload_size: usize,
    http_code: Option<u16>,
    response: Value,
    error: Option<String>,
}

/// Relays city selections to the configured webhook.
///
/// Cheap to clone; all state is shared and read-only.
#[derive(Clone)]
pub struct RouteHook {
    inner: Arc<RouteHookInner>,
}

struct RouteHookInner {
    target: WebhookTarget,
    delivery: Arc<dyn Deliver>,
    log: DiagnosticLog,
    max_body_bytes: usize,
}

impl RouteHook {
    pub fn new(
        target: WebhookTarget,
        delivery: Arc<dyn Deliver>,
        log: DiagnosticLog,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            inner: Arc::new(RouteHookInner {
                target,
                delivery,
                log,
                max_body_bytes,
            }),
        }
    }

    /// Handles one request. Never fails: every problem is turned into a
    /// response for the caller.
    pub async fn handle(&self, method: &Method, body: Bytes, meta: RequestMeta) -> Response<Bytes> {
        self.respond(method, async move { Ok(body) }, meta).await
    }

    /// Like [`RouteHook::handle`], but the body is only awaited once the
    /// method calls for one.
    async fn respond<F>(&self, method: &Method, body: F, meta: RequestMeta) -> Response<Bytes>
    where
        F: Future<Output = Result<Bytes, RelayError>>,
    {
        let started = Instant::now();

        let (response, outcome) = match self.process(method, body, &meta).await {
            Ok(Reply::Preflight) => (response::preflight(), "preflight"),
            Ok(Reply::TestPage) => (response::test_page(), "test_page"),
            Ok(Reply::Delivered {
                n8n_response,
                timestamp,
                route_id,
            }) => {
                tracing::info!(%route_id, "city route delivered");
                (
                    response::delivered(&n8n_response, &timestamp, &route_id),
                    "delivered",
                )
            }
            Err(rejection) => self.reject(rejection),
        };

        shared::counter!(REQUESTS, "method" => method.to_string(), "outcome" => outcome)
            .increment(1);
        shared::histogram!(REQUEST_DURATION, "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());

        response
    }

    fn reject(&self, rejection: Rejection) -> (Response<Bytes>, &'static str) {
        let Rejection { error, received } = rejection;

        match &error {
            RelayError::Delivery(failure) => {
                tracing::warn!(error = %failure, "failed to deliver city route")
            }
            RelayError::WebhookNotConfigured => {
                tracing::warn!("webhook URL not configured, city route not forwarded")
            }
            other => tracing::debug!(error = %other, "rejected request"),
        }

        let received = received
            .as_ref()
            .map(|(data, timestamp)| (data, timestamp.as_str()));
        (response::failure(&error, received), error.outcome())
    }

    async fn process<F>(&self, method: &Method, body: F, meta: &RequestMeta) -> Result<Reply, Rejection>
    where
        F: Future<Output = Result<Bytes, RelayError>>,
    {
        match method {
            &Method::OPTIONS => return Ok(Reply::Preflight),
            &Method::GET | &Method::POST => {}
            _ => return Err(RelayError::MethodNotAllowed.into()),
        }

        let body = body.await?;
        if *method == Method::GET {
            // A browser opening the endpoint directly
            return match body.is_empty() {
                true => Ok(Reply::TestPage),
                false => Err(RelayError::MethodNotAllowed.into()),
            };
        }

        let selection = parse_selection(&body)?;
        let now = Utc::now();
        let timestamp = format_timestamp(now);

        let url = match &self.inner.target {
            WebhookTarget::Configured(url) => url,
            WebhookTarget::Unconfigured => {
                return Err(Rejection {
                    error: RelayError::WebhookNotConfigured,
                    received: Some((selection, timestamp)),
                });
            }
        };

        self.inner
            .log
            .record("City selection received:", &selection)
            .await;

        let event = normalize(&selection, meta, now);
        let payload_size = serde_json::to_vec(&event).map_or(0, |bytes| bytes.len());

        let delivery_started = Instant::now();
        let outcome = self.inner.delivery.deliver(url, &event).await;
        let status_tag = outcome
            .status()
            .map_or_else(|| "transport_error".to_string(), |s| s.as_u16().to_string());
        shared::histogram!(DELIVERY_DURATION, "status" => status_tag)
            .record(delivery_started.elapsed().as_secs_f64());

        self.log_delivery(url, payload_size, &outcome).await;

        match outcome {
            DeliveryOutcome::Success { response, .. } => Ok(Reply::Delivered {
                n8n_response: response,
                timestamp,
                route_id: new_route_id(),
            }),
            DeliveryOutcome::Failure(failure) => Err(Rejection {
                error: failure.into(),
                received: Some((selection, timestamp)),
            }),
        }
    }

    async fn log_delivery(&self, url: &Url, payload_size: usize, outcome: &DeliveryOutcome) {
        let (response, error) = match outcome {
            DeliveryOutcome::Success { response, .. } => (response.clone(), None),
            DeliveryOutcome::Failure(DeliveryFailure::Status { body, .. }) => {
                (Value::String(body.clone()), None)
            }
            DeliveryOutcome::Failure(DeliveryFailure::Transport(description)) => {
                (Value::Null, Some(description.clone()))
            }
        };

        let entry = DeliveryLogEntry {
            url: url.as_str(),
            payload_size,
            http_code: outcome.status().map(|s| s.as_u16()),
            response,
            error,
        };
        self.inner.log.record("City data sent to n8n:", &entry).await;
    }
}

impl Service<Request<Incoming>> for RouteHook {
    type Response = Response<HookBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let hook = self.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let meta = request_meta(&parts);

            let limit = hook.inner.max_body_bytes;
            let body = async move {
                match Limited::new(body, limit).collect().await {
                    Ok(collected) => Ok(collected.to_bytes()),
                    Err(e) => {
                        tracing::debug!(error = %e, "failed to read request body");
                        Err(RelayError::InvalidPayload)
                    }
                }
            };

            let response = hook.respond(&parts.method, body, meta).await;
            Ok(response.map(|bytes| Full::new(bytes).boxed()))
        })
    }
}

/// The body must be a JSON object with at least one member; `{}` is
/// rejected the same way as malformed JSON.
fn parse_selection(body: &[u8]) -> Result<RawSelection, RelayError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(selection)) if !selection.is_empty() => Ok(selection),
        _ => Err(RelayError::InvalidPayload),
    }
}

fn new_route_id() -> String {
    format!("ROUTE_{}", Uuid::new_v4().simple())
}

/// Collects the transport metadata the normalizer needs.
pub fn request_meta(parts: &Parts) -> RequestMeta {
    let header = |name: HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let server_name = header(HOST)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .map(|host| strip_port(&host));

    RequestMeta {
        remote_addr: parts.extensions.get::<PeerAddr>().map(|peer| peer.0.ip()),
        user_agent: header(USER_AGENT),
        server_name,
    }
}

fn strip_port(host: &str) -> String {
    match host.parse::<Authority>() {
        Ok(authority) => authority.host().to_string(),
        Err(_) => host.to_string(),
    }
}
