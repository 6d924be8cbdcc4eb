use crate::delivery::{Deliver, DeliveryOutcome};
use crate::payload::CanonicalEvent;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, USER_AGENT};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Canned answer of a fake webhook.
#[derive(Clone)]
pub struct MockUpstream {
    status: StatusCode,
    body: String,
    headers: Vec<(&'static str, String)>,
    delay: Option<Duration>,
}

impl MockUpstream {
    pub fn json(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: vec![("content-type", "application/json".to_string())],
            delay: None,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub method: String,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body: Bytes,
}

pub struct UpstreamHandle {
    port: u16,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl UpstreamHandle {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}/webhook/form/route", self.port))
            .expect("valid url")
    }

    pub async fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }
}

async fn answer(
    req: Request<Incoming>,
    mock: MockUpstream,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let header = |name: hyper::header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_else(|_| Bytes::new());

    received.lock().unwrap().push(ReceivedRequest {
        method: parts.method.to_string(),
        content_type: header(CONTENT_TYPE),
        user_agent: header(USER_AGENT),
        body,
    });

    if let Some(delay) = mock.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = Response::new(Full::new(Bytes::from(mock.body)));
    *response.status_mut() = mock.status;
    for (name, value) in mock.headers {
        response
            .headers_mut()
            .insert(name, value.parse().expect("valid header value"));
    }
    Ok(response)
}

/// Starts a fake webhook on an ephemeral local port.
pub async fn start_upstream(mock: MockUpstream) -> UpstreamHandle {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Vec::new()));

    let server_received = received.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let mock = mock.clone();
            let received = server_received.clone();

            tokio::spawn(async move {
                let service =
                    service_fn(move |req| answer(req, mock.clone(), received.clone()));
                if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    UpstreamHandle { port, received }
}

/// In-process stand-in for the webhook that records every call.
pub struct MockDelivery {
    outcome: DeliveryOutcome,
    calls: AtomicUsize,
    events: Mutex<Vec<(Url, CanonicalEvent)>>,
}

impl MockDelivery {
    pub fn new(outcome: DeliveryOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(Url, CanonicalEvent)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliver for MockDelivery {
    async fn deliver(&self, url: &Url, event: &CanonicalEvent) -> DeliveryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push((url.clone(), event.clone()));
        self.outcome.clone()
    }
}
