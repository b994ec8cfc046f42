//! Configuration context.
//!
//! # Design
//! A `Config` is built once at startup, either in code or from a TOML file,
//! validated, then shared behind an `Arc` by every component. The only part
//! that changes at runtime is the CSRF token, which lives in a `CsrfSource`
//! so a rotated token is picked up by the next request without rebuilding
//! the rest of the configuration.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_MS: u64 = 44_000;
pub const DEFAULT_LOADING_DELAY_MS: u64 = 1_500;

/// Localized alert messages shown for classified failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub access_forbidden: String,
    pub server_timeout: String,
    pub not_found: String,
    pub csrf_invalid: String,
    pub server_error: String,
    pub bad_request: String,
    pub internal_error: String,
    pub loading: String,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            access_forbidden: "Access forbidden.".to_string(),
            server_timeout: "The server took too long to respond, please try again.".to_string(),
            not_found: "The requested resource was not found.".to_string(),
            csrf_invalid: "Your session has expired, please reload the page.".to_string(),
            server_error: "Something went wrong on our side, please try again later.".to_string(),
            bad_request: "The request could not be processed.".to_string(),
            internal_error: "An unexpected error occurred.".to_string(),
            loading: "Loading...".to_string(),
        }
    }
}

impl Alerts {
    /// Look an entry up by its table key, e.g. `"not_found"`.
    pub fn by_key(&self, key: &str) -> Option<&str> {
        let value = match key {
            "access_forbidden" => &self.access_forbidden,
            "server_timeout" => &self.server_timeout,
            "not_found" => &self.not_found,
            "csrf_invalid" => &self.csrf_invalid,
            "server_error" => &self.server_error,
            "bad_request" => &self.bad_request,
            "internal_error" => &self.internal_error,
            "loading" => &self.loading,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Name and value of the CSRF form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfToken {
    pub key: String,
    pub value: String,
}

impl CsrfToken {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Current CSRF token, swappable while requests are in flight.
#[derive(Default)]
pub struct CsrfSource {
    current: ArcSwapOption<CsrfToken>,
}

impl CsrfSource {
    pub fn new(token: Option<CsrfToken>) -> Self {
        Self {
            current: ArcSwapOption::from(token.map(Arc::new)),
        }
    }

    /// Token to inject right now. Entries with an empty key count as unset.
    pub fn current(&self) -> Option<Arc<CsrfToken>> {
        self.current.load_full().filter(|token| !token.key.is_empty())
    }

    pub fn rotate(&self, token: CsrfToken) {
        tracing::debug!(key = %token.key, "csrf token rotated");
        self.current.store(Some(Arc::new(token)));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }
}

impl fmt::Debug for CsrfSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the token value
        let key = self.current.load_full().map(|token| token.key.clone());
        f.debug_struct("CsrfSource").field("key", &key).finish()
    }
}

/// Logging settings consumed by `logging::init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// On-disk shape of the configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct ConfigFile {
    base_url: String,
    #[serde(default)]
    static_url: String,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_loading_delay_ms")]
    loading_delay_ms: u64,
    #[serde(default)]
    csrf: Option<CsrfToken>,
    #[serde(default)]
    alerts: Alerts,
    #[serde(default)]
    logging: LoggingConfig,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_loading_delay_ms() -> u64 {
    DEFAULT_LOADING_DELAY_MS
}

/// Process-wide settings read by every request component.
#[derive(Debug)]
pub struct Config {
    pub base_url: String,
    pub static_url: String,
    pub default_timeout: Duration,
    /// How long a request must run before the busy signal turns active.
    pub loading_delay: Duration,
    pub alerts: Alerts,
    pub logging: LoggingConfig,
    csrf: CsrfSource,
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            static_url: String::new(),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            loading_delay: Duration::from_millis(DEFAULT_LOADING_DELAY_MS),
            alerts: Alerts::default(),
            logging: LoggingConfig::default(),
            csrf: CsrfSource::default(),
        }
    }

    pub fn with_static_url(mut self, static_url: impl Into<String>) -> Self {
        self.static_url = static_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_loading_delay(mut self, delay: Duration) -> Self {
        self.loading_delay = delay;
        self
    }

    pub fn with_alerts(mut self, alerts: Alerts) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_csrf(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.csrf.rotate(CsrfToken::new(key, value));
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let config = Self {
            base_url: file.base_url,
            static_url: file.static_url,
            default_timeout: Duration::from_millis(file.timeout_ms),
            loading_delay: Duration::from_millis(file.loading_delay_ms),
            alerts: file.alerts,
            logging: file.logging,
            csrf: CsrfSource::new(file.csrf),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.base_url.is_empty() {
            errors.push("base_url must not be empty".to_string());
        } else if let Err(e) = Url::parse(&self.base_url) {
            errors.push(format!("base_url `{}` is not an absolute url: {e}", self.base_url));
        }
        if !self.static_url.is_empty() {
            if let Err(e) = Url::parse(&self.static_url) {
                errors.push(format!("static_url `{}` is not an absolute url: {e}", self.static_url));
            }
        }
        if self.default_timeout.is_zero() {
            errors.push("timeout_ms must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn csrf(&self) -> &CsrfSource {
        &self.csrf
    }

    pub fn base_url_for(&self, uri: &str) -> String {
        format!("{}{uri}", self.base_url)
    }

    pub fn static_url_for(&self, uri: &str) -> String {
        format!("{}{uri}", self.static_url)
    }

    /// Absolute navigation target for a redirect instruction.
    ///
    /// Absolute `http` targets are kept as is, the `notFound` alias maps to
    /// the error page, anything else is taken relative to the base URL.
    pub fn resolve_redirect(&self, target: &str) -> String {
        if is_url(target) {
            return target.to_string();
        }
        let target = match target {
            "notFound" => "error/notFound",
            other => other.trim_start_matches('/'),
        };
        if self.base_url.ends_with('/') {
            self.base_url_for(target)
        } else {
            format!("{}/{target}", self.base_url)
        }
    }
}

/// Whether `url` is absolute over http(s).
pub fn is_url(url: &str) -> bool {
    url.starts_with("http")
}

/// Whether `url` is absolute and points at an image.
pub fn is_resource_url(url: &str) -> bool {
    const IMAGE_TYPES: [&str; 4] = [".jpg", ".png", ".svg", ".gif"];
    let lower = url.to_ascii_lowercase();
    is_url(url) && IMAGE_TYPES.iter().any(|ext| lower.contains(ext))
}
