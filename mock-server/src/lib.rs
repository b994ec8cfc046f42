use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Form field the backend expects the CSRF token in.
pub const CSRF_KEY: &str = "csrf";

/// CSRF token handed out by `GET /csrf`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrfToken {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub csrf: Arc<RwLock<String>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            csrf: Arc::new(RwLock::new(Uuid::new_v4().to_string())),
        }
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/csrf", get(issue_csrf))
        .route("/auth/login", post(login))
        .route("/echo", get(echo_get).post(echo_post))
        .route("/status/{code}", get(error_status))
        .route("/slow/{ms}", get(slow))
        .route("/aborted", get(aborted))
        .route("/broken", get(broken))
        .fallback(not_found)
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn ok(payload: Value) -> Json<Value> {
    Json(json!({ "status": "ok", "payload": payload }))
}

fn error(code: u16, error: &str, message: Option<&str>) -> Json<Value> {
    let mut body = json!({ "status": "error", "code": code, "error": error });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    Json(body)
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

fn header_map(headers: &HeaderMap) -> Value {
    let map: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();
    Value::Object(map)
}

/// Rotates the session token on every call.
async fn issue_csrf(State(state): State<AppState>) -> Json<Value> {
    let value = Uuid::new_v4().to_string();
    *state.csrf.write().await = value.clone();
    tracing::debug!("csrf token rotated");
    ok(json!(CsrfToken {
        key: CSRF_KEY.to_string(),
        value,
    }))
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    if !is_ajax(&headers) {
        return error(400, "not_ajax", None);
    }
    let expected = state.csrf.read().await.clone();
    if fields.get(CSRF_KEY) != Some(&expected) {
        return error(498, "csrf", None);
    }
    match fields.get("email") {
        Some(email) if email.contains('@') => Json(json!({ "status": "ok", "redirect": "account" })),
        _ => error(400, "validation", Some("A valid email is required.")),
    }
}

async fn echo_get(headers: HeaderMap) -> Json<Value> {
    ok(json!({ "method": "GET", "headers": header_map(&headers) }))
}

async fn echo_post(
    headers: HeaderMap,
    Form(fields): Form<std::collections::BTreeMap<String, String>>,
) -> Json<Value> {
    ok(json!({ "method": "POST", "fields": fields, "headers": header_map(&headers) }))
}

async fn error_status(Path(code): Path<u16>) -> Json<Value> {
    error(code, "requested", None)
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    ok(json!({ "slept_ms": ms }))
}

/// Error envelope without code or identifier, as sent for user aborts.
async fn aborted() -> Json<Value> {
    Json(json!({ "status": "error" }))
}

async fn broken() -> &'static str {
    "<html><body>Fatal error</body></html>"
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
