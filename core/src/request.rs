//! Request normalizer.
//!
//! # Design
//! `normalize` is a pure function from a caller's partial
//! `RequestDescriptor` and the shared `Config` to a `NormalizedRequest`.
//! It resolves the target URL, merges headers over the AJAX defaults, picks
//! the timeout and form-encodes the body. The CSRF token is read from the
//! config on every call so a rotation between two requests is honoured.
//! Malformed descriptors are rejected here, before any I/O happens.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::InvalidRequest;
use crate::http::{HttpMethod, NormalizedRequest, FORM_CONTENT_TYPE, REQUESTED_WITH};

/// What a caller asks for. Exactly one of `path` and `url` must be set.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Relative to `Config::base_url`.
    pub path: Option<String>,
    /// Fully qualified.
    pub url: Option<String>,
    /// Form fields, ignored for `GET`.
    pub body: BTreeMap<String, String>,
    /// Merged over the defaults; the caller wins on conflict.
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Inject the CSRF field into `POST` bodies.
    pub csrf: bool,
    /// Drive the busy signal for this request.
    pub loading: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            path: None,
            url: None,
            body: BTreeMap::new(),
            headers: Vec::new(),
            timeout: None,
            csrf: true,
            loading: true,
            cancel: None,
        }
    }
}

impl RequestDescriptor {
    pub fn get(path: impl Into<String>) -> Self {
        Self::with_path(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::with_path(HttpMethod::Post, path)
    }

    pub fn with_path(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_url(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_csrf(mut self) -> Self {
        self.csrf = false;
        self
    }

    pub fn without_loading(mut self) -> Self {
        self.loading = false;
        self
    }

    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Resolve a descriptor against the configuration.
pub fn normalize(
    descriptor: &RequestDescriptor,
    config: &Config,
) -> Result<NormalizedRequest, InvalidRequest> {
    let url = match (&descriptor.path, &descriptor.url) {
        (Some(_), Some(_)) => return Err(InvalidRequest::BothTargets),
        (None, None) => return Err(InvalidRequest::MissingTarget),
        (Some(path), None) => config.base_url_for(path),
        (None, Some(url)) => url.clone(),
    };
    if let Err(e) = Url::parse(&url) {
        return Err(InvalidRequest::BadUrl {
            url,
            reason: e.to_string(),
        });
    }

    let body = if descriptor.method.has_body() {
        encode_body(descriptor, config)?
    } else {
        if !descriptor.body.is_empty() {
            tracing::debug!(%url, "ignoring body fields on GET request");
        }
        None
    };

    let request = NormalizedRequest {
        id: Uuid::new_v4(),
        method: descriptor.method,
        url,
        headers: merge_headers(&descriptor.headers),
        body,
        timeout: descriptor.timeout.unwrap_or(config.default_timeout),
        loading: descriptor.loading,
    };
    tracing::debug!(
        id = %request.id,
        method = %request.method,
        url = %request.url,
        "new request"
    );
    Ok(request)
}

fn encode_body(
    descriptor: &RequestDescriptor,
    config: &Config,
) -> Result<Option<String>, InvalidRequest> {
    let mut fields = descriptor.body.clone();
    if descriptor.method == HttpMethod::Post && descriptor.csrf {
        if let Some(token) = config.csrf().current() {
            fields.insert(token.key.clone(), token.value.clone());
        }
    }
    if fields.is_empty() {
        return Ok(None);
    }
    serde_urlencoded::to_string(&fields)
        .map(Some)
        .map_err(|e| InvalidRequest::Encoding(e.to_string()))
}

fn merge_headers(overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = [REQUESTED_WITH, FORM_CONTENT_TYPE]
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for (name, value) in overrides {
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => *slot = (name.clone(), value.clone()),
            None => headers.push((name.clone(), value.clone())),
        }
    }
    headers
}
