//! Request/response service composed from the individual stages.
//!
//! # Design
//! `CoreClient` owns the shared `Config` and an `Invoker`, and runs each
//! call through normalize → send → classify. It keeps no per-request state,
//! so concurrent calls on one client never interfere. Observers such as a
//! `BusySignal` are attached by the host when it builds the client; a
//! per-call observer (e.g. a form whose submit control must be disabled
//! while its request runs) can be passed to `request_with`.

use std::sync::Arc;

use crate::classify::{classify, Outcome};
use crate::config::Config;
use crate::error::{CoreError, InvalidRequest};
use crate::http::NormalizedRequest;
use crate::request::{normalize, RequestDescriptor};
use crate::transport::{Invoker, ReqwestTransport, RequestObserver, Transport};

/// Shared request service for application modules.
pub struct CoreClient<T = ReqwestTransport> {
    config: Arc<Config>,
    invoker: Invoker<T>,
}

impl CoreClient<ReqwestTransport> {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: Transport> CoreClient<T> {
    pub fn with_transport(config: Arc<Config>, transport: T) -> Self {
        Self {
            config,
            invoker: Invoker::new(transport),
        }
    }

    /// Attach an observer notified around every request.
    pub fn observe(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.invoker.observe(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.invoker.transport()
    }

    pub fn normalize(&self, descriptor: &RequestDescriptor) -> Result<NormalizedRequest, InvalidRequest> {
        normalize(descriptor, &self.config)
    }

    pub async fn request(&self, descriptor: &RequestDescriptor) -> Result<Outcome, CoreError> {
        self.run(descriptor, None).await
    }

    /// Like `request`, additionally notifying `observer` for this call.
    pub async fn request_with(
        &self,
        descriptor: &RequestDescriptor,
        observer: &dyn RequestObserver,
    ) -> Result<Outcome, CoreError> {
        self.run(descriptor, Some(observer)).await
    }

    pub async fn get(&self, path: &str) -> Result<Outcome, CoreError> {
        self.request(&RequestDescriptor::get(path)).await
    }

    pub async fn post<'a, I>(&self, path: &str, fields: I) -> Result<Outcome, CoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let descriptor = fields
            .into_iter()
            .fold(RequestDescriptor::post(path), |d, (name, value)| d.field(name, value));
        self.request(&descriptor).await
    }

    async fn run(
        &self,
        descriptor: &RequestDescriptor,
        observer: Option<&dyn RequestObserver>,
    ) -> Result<Outcome, CoreError> {
        let request = self.normalize(descriptor)?;
        let result = self
            .invoker
            .send(&request, descriptor.cancel.as_ref(), observer)
            .await;
        let outcome = classify(&result, &self.config)?;
        tracing::debug!(id = %request.id, url = %request.url, "request resolved");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::error::ErrorKind;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::transport::TransportResult;

    /// Replies with a fixed body and remembers what it was asked to send.
    struct Scripted {
        status: u16,
        body: String,
        seen: Mutex<Vec<NormalizedRequest>>,
    }

    impl Scripted {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> NormalizedRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, request: &NormalizedRequest) -> TransportResult {
            self.seen.lock().unwrap().push(request.clone());
            TransportResult::Completed(HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: self.body.clone(),
            })
        }
    }

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        ended: AtomicUsize,
    }

    impl RequestObserver for Counter {
        fn request_started(&self, _request: &NormalizedRequest) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn request_ended(&self, _request: &NormalizedRequest) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client(status: u16, body: &str) -> CoreClient<Scripted> {
        let config = Config::new("http://localhost:3000/").with_csrf("csrf", "tok1");
        CoreClient::with_transport(Arc::new(config), Scripted::new(status, body))
    }

    #[tokio::test]
    async fn resolves_payload() {
        let c = client(200, r#"{"status":"ok","payload":{"a":1}}"#);
        let outcome = c.get("items").await.unwrap();
        assert_eq!(outcome.payload(), Some(&json!({"a": 1})));
        assert_eq!(c.transport().last().url, "http://localhost:3000/items");
    }

    #[tokio::test]
    async fn post_sends_form_with_csrf() {
        let c = client(200, r#"{"status":"ok","redirect":"account"}"#);
        let outcome = c.post("auth/login", [("email", "a@b.com")]).await.unwrap();
        assert_eq!(outcome.redirect(), Some("account"));

        let sent = c.transport().last();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.body.as_deref(), Some("csrf=tok1&email=a%40b.com"));
    }

    #[tokio::test]
    async fn error_envelope_becomes_classified_error() {
        let c = client(200, r#"{"status":"error","code":498}"#);
        let err = c.get("x").await.unwrap_err();
        let classified = err.classified().unwrap();
        assert_eq!(classified.kind, ErrorKind::CsrfInvalid);
        assert_eq!(
            classified.message.as_deref(),
            Some(c.config().alerts.csrf_invalid.as_str())
        );
    }

    #[tokio::test]
    async fn invalid_descriptor_fails_before_sending() {
        let c = client(200, r#"{"status":"ok"}"#);
        let err = c.request(&RequestDescriptor::default()).await.unwrap_err();
        assert_eq!(err, CoreError::Invalid(InvalidRequest::MissingTarget));
        assert!(c.transport().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn observers_are_paired() {
        let global = Arc::new(Counter::default());
        let c = client(200, r#"{"status":"error","code":500}"#).observe(global.clone());
        let local = Counter::default();

        let _ = c.request_with(&RequestDescriptor::get("a"), &local).await;
        let _ = c.request(&RequestDescriptor::get("b")).await;

        assert_eq!(global.started.load(Ordering::SeqCst), 2);
        assert_eq!(global.ended.load(Ordering::SeqCst), 2);
        assert_eq!(local.started.load(Ordering::SeqCst), 1);
        assert_eq!(local.ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_request_is_silent() {
        let c = client(200, r#"{"status":"ok"}"#);
        let token = CancellationToken::new();
        token.cancel();
        let err = c
            .request(&RequestDescriptor::get("slow").cancel_with(token))
            .await
            .unwrap_err();
        let classified = err.classified().unwrap();
        assert_eq!(classified.kind, ErrorKind::Cancelled);
        assert!(!classified.should_alert());
    }
}
