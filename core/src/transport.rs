//! Transport invoker.
//!
//! # Design
//! `Transport` is the seam where bytes actually move; `ReqwestTransport` is
//! the production implementation and tests plug in scripted ones. `Invoker`
//! wraps any transport with the lifecycle policy: it announces the request
//! to every `RequestObserver`, enforces the request timeout, honours the
//! caller's cancellation token and always announces the end, even when the
//! future is dropped half-way. It never looks inside the body.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpMethod, HttpResponse, NormalizedRequest};

/// Why a request produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Network,
    Cancelled,
}

/// Raw outcome of one round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResult {
    /// The server answered, whatever the status code.
    Completed(HttpResponse),
    Failed {
        kind: FailureKind,
        status: Option<u16>,
        raw_body: Option<String>,
    },
}

impl TransportResult {
    pub fn failed(kind: FailureKind) -> Self {
        TransportResult::Failed {
            kind,
            status: None,
            raw_body: None,
        }
    }
}

/// Executes normalized requests against the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &NormalizedRequest) -> TransportResult;
}

/// Notified around every request an `Invoker` sends.
///
/// `request_ended` is called exactly once for each `request_started`.
pub trait RequestObserver: Send + Sync {
    fn request_started(&self, request: &NormalizedRequest);
    fn request_ended(&self, request: &NormalizedRequest);
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &NormalizedRequest) -> TransportResult {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return failure(&e, None),
        };
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        match response.text().await {
            Ok(body) => TransportResult::Completed(HttpResponse {
                status,
                headers,
                body,
            }),
            Err(e) => failure(&e, Some(status)),
        }
    }
}

fn failure(e: &reqwest::Error, status: Option<u16>) -> TransportResult {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    tracing::debug!(error = %e, ?kind, "transport failure");
    TransportResult::Failed {
        kind,
        status: status.or_else(|| e.status().map(|s| s.as_u16())),
        raw_body: None,
    }
}

/// Pairs a start notification with its end notification on drop.
struct Settle<'a> {
    request: &'a NormalizedRequest,
    observers: Vec<&'a dyn RequestObserver>,
}

impl<'a> Settle<'a> {
    fn begin(request: &'a NormalizedRequest, observers: Vec<&'a dyn RequestObserver>) -> Self {
        for observer in &observers {
            observer.request_started(request);
        }
        Self { request, observers }
    }
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        for observer in &self.observers {
            observer.request_ended(self.request);
        }
    }
}

/// Sends requests through a transport under the lifecycle policy.
pub struct Invoker<T> {
    transport: T,
    observers: Vec<Arc<dyn RequestObserver>>,
}

impl<T: Transport> Invoker<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            observers: Vec::new(),
        }
    }

    /// Register an observer notified around every request.
    pub fn observe(&mut self, observer: Arc<dyn RequestObserver>) {
        self.observers.push(observer);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one request. `extra` is notified for this call only.
    pub async fn send(
        &self,
        request: &NormalizedRequest,
        cancel: Option<&CancellationToken>,
        extra: Option<&dyn RequestObserver>,
    ) -> TransportResult {
        let mut observers: Vec<&dyn RequestObserver> = Vec::with_capacity(self.observers.len() + 1);
        for observer in &self.observers {
            observers.push(observer.as_ref());
        }
        if let Some(extra) = extra {
            observers.push(extra);
        }
        let _settle = Settle::begin(request, observers);

        let call = async {
            match tokio::time::timeout(request.timeout, self.transport.execute(request)).await {
                Ok(result) => result,
                Err(_) => TransportResult::failed(FailureKind::Timeout),
            }
        };
        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => TransportResult::failed(FailureKind::Cancelled),
                    result = call => result,
                }
            }
            None => call.await,
        };

        match &result {
            TransportResult::Completed(response) => {
                tracing::debug!(id = %request.id, status = response.status, url = %request.url, "response received");
            }
            TransportResult::Failed { kind, .. } => {
                tracing::debug!(id = %request.id, ?kind, url = %request.url, "request failed");
            }
        }
        result
    }
}
