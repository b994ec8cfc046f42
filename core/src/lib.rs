//! Request/response lifecycle core for server-rendered web applications.
//!
//! # Overview
//! Issues HTTP requests on behalf of application modules and turns every
//! reply into one of two things: an `Outcome` (payload or redirect) or a
//! `ClassifiedError` with a localized message. A debounced `BusySignal`
//! follows the same requests so a UI can show a loading indicator for slow
//! calls only.
//!
//! # Design
//! - Each stage is its own small piece: `request::normalize` (pure),
//!   `transport::Invoker` (I/O, timeout, cancellation, start/end events),
//!   `classify::classify` (pure). `CoreClient` composes them.
//! - `Config` is built once and passed explicitly; only the CSRF token may
//!   change afterwards.
//! - Runtime failures are values, never panics. Caller misuse is reported
//!   as `InvalidRequest` before anything is sent.
//! - `registry` holds the application modules started by the host.

pub mod busy;
pub mod classify;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod logging;
pub mod registry;
pub mod request;
pub mod transport;

pub use busy::BusySignal;
pub use classify::{classify, Outcome};
pub use client::CoreClient;
pub use config::{Alerts, Config, CsrfToken};
pub use envelope::Envelope;
pub use error::{ClassifiedError, ConfigError, CoreError, ErrorKind, InvalidRequest};
pub use http::{HttpMethod, HttpResponse, NormalizedRequest};
pub use registry::{Module, ModuleRegistry, StartReport};
pub use request::{normalize, RequestDescriptor};
pub use transport::{
    FailureKind, Invoker, ReqwestTransport, RequestObserver, Transport, TransportResult,
};
