//! Response classifier.
//!
//! # Design
//! `classify` is the only place that decides what a round-trip meant. Every
//! transport failure and every error envelope ends up as a
//! `ClassifiedError` carrying a localized message from the config's alert
//! table, so callers never see raw server text unless the backend sent an
//! explicit `message`. A redirect is reported back as
//! `Outcome::Redirect`; performing the navigation is the caller's job.

use serde_json::Value;

use crate::config::{Alerts, Config};
use crate::envelope::Envelope;
use crate::error::{ClassifiedError, ErrorKind, DEFAULT_ERROR_CODE, TIMEOUT_CODE};
use crate::transport::{FailureKind, TransportResult};

/// What a successful request resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Payload(Value),
    /// Navigate to this target instead of using a payload.
    Redirect(String),
}

impl Outcome {
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Outcome::Payload(payload) => Some(payload),
            Outcome::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&str> {
        match self {
            Outcome::Redirect(target) => Some(target),
            Outcome::Payload(_) => None,
        }
    }
}

/// Map a transport result to an outcome or a classified error.
pub fn classify(result: &TransportResult, config: &Config) -> Result<Outcome, ClassifiedError> {
    let alerts = &config.alerts;
    let response = match result {
        TransportResult::Completed(response) => response,
        TransportResult::Failed { kind, status, .. } => {
            let err = match kind {
                FailureKind::Timeout => ClassifiedError::new(
                    TIMEOUT_CODE,
                    ErrorKind::Timeout,
                    Some(alerts.server_timeout.clone()),
                ),
                FailureKind::Cancelled => ClassifiedError::cancelled(),
                FailureKind::Network => ClassifiedError::new(
                    status.unwrap_or(0),
                    ErrorKind::Unknown,
                    Some(alerts.server_error.clone()),
                ),
            };
            return Err(report(err));
        }
    };

    match Envelope::decode(&response.body) {
        Envelope::Success {
            redirect: Some(target),
            ..
        } => Ok(Outcome::Redirect(target)),
        Envelope::Success { payload, .. } => Ok(Outcome::Payload(payload)),
        Envelope::Failure {
            code,
            error,
            message,
        } => {
            let code = code
                .filter(|c| *c != 0)
                .or((response.status >= 400).then_some(response.status));
            if code.is_none() && error.is_none() {
                return Err(ClassifiedError::cancelled());
            }
            let code = code.unwrap_or(DEFAULT_ERROR_CODE);
            let (kind, alert) = lookup(code, alerts);
            let message = message
                .or_else(|| alert.map(str::to_string))
                .unwrap_or_else(|| alerts.internal_error.clone());
            Err(report(ClassifiedError::new(code, kind, Some(message))))
        }
        Envelope::Malformed { reason } => {
            tracing::warn!(
                status = response.status,
                content_type = response.content_type().unwrap_or("none"),
                %reason,
                "unexpected response body"
            );
            let err = if response.status >= 400 {
                let (kind, alert) = lookup(response.status, alerts);
                let message = alert.unwrap_or(alerts.internal_error.as_str()).to_string();
                ClassifiedError::new(response.status, kind, Some(message))
            } else {
                let (kind, _) = lookup(DEFAULT_ERROR_CODE, alerts);
                ClassifiedError::new(
                    DEFAULT_ERROR_CODE,
                    kind,
                    Some(alerts.internal_error.clone()),
                )
            };
            Err(report(err))
        }
    }
}

/// Kind and alert entry for an application error code.
fn lookup(code: u16, alerts: &Alerts) -> (ErrorKind, Option<&str>) {
    match code {
        400 => (ErrorKind::BadRequest, Some(alerts.bad_request.as_str())),
        401 | 403 => (ErrorKind::Forbidden, Some(alerts.access_forbidden.as_str())),
        404 | 405 => (ErrorKind::NotFound, Some(alerts.not_found.as_str())),
        408 => (ErrorKind::Timeout, Some(alerts.server_timeout.as_str())),
        498 => (ErrorKind::CsrfInvalid, Some(alerts.csrf_invalid.as_str())),
        500 => (ErrorKind::ServerError, Some(alerts.server_error.as_str())),
        501..=599 => (ErrorKind::ServerError, None),
        _ => (ErrorKind::Unknown, None),
    }
}

fn report(err: ClassifiedError) -> ClassifiedError {
    tracing::warn!(code = err.code, kind = %err.kind, "request classified as failure");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use serde_json::json;

    fn config() -> Config {
        Config::new("http://localhost:3000/")
    }

    fn completed(status: u16, body: &str) -> TransportResult {
        TransportResult::Completed(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    fn ok_body(body: &str) -> TransportResult {
        completed(200, body)
    }

    #[test]
    fn payload_round_trip() {
        let outcome = classify(&ok_body(r#"{"status":"ok","payload":{"a":1}}"#), &config()).unwrap();
        assert_eq!(outcome, Outcome::Payload(json!({"a": 1})));
    }

    #[test]
    fn missing_payload_is_empty_object() {
        let outcome = classify(&ok_body(r#"{"status":"ok"}"#), &config()).unwrap();
        assert_eq!(outcome.payload(), Some(&json!({})));
    }

    #[test]
    fn redirect_wins_over_payload() {
        let outcome = classify(
            &ok_body(r#"{"status":"ok","redirect":"/x","payload":{"a":1}}"#),
            &config(),
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Redirect("/x".to_string()));
        assert!(outcome.payload().is_none());
    }

    #[test]
    fn not_found_code() {
        let cfg = config();
        let err = classify(&ok_body(r#"{"status":"error","code":404}"#), &cfg).unwrap_err();
        assert_eq!(
            err,
            ClassifiedError::new(404, ErrorKind::NotFound, Some(cfg.alerts.not_found.clone()))
        );
    }

    #[test]
    fn csrf_code() {
        let cfg = config();
        let err = classify(&ok_body(r#"{"status":"error","code":498}"#), &cfg).unwrap_err();
        assert_eq!(err.code, 498);
        assert_eq!(err.kind, ErrorKind::CsrfInvalid);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.csrf_invalid.as_str()));
    }

    #[test]
    fn explicit_message_takes_priority() {
        let err = classify(
            &ok_body(r#"{"status":"error","code":404,"message":"No such user"}"#),
            &config(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message.as_deref(), Some("No such user"));
    }

    #[test]
    fn unmapped_code_falls_back_to_generic_message() {
        let cfg = config();
        let err = classify(&ok_body(r#"{"status":"error","code":418}"#), &cfg).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.internal_error.as_str()));

        let err = classify(&ok_body(r#"{"status":"error","code":503}"#), &cfg).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.internal_error.as_str()));
    }

    #[test]
    fn missing_code_defaults_to_bad_request() {
        let cfg = config();
        let err = classify(&ok_body(r#"{"status":"error","error":"validation"}"#), &cfg).unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.kind, ErrorKind::BadRequest);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.bad_request.as_str()));
    }

    #[test]
    fn missing_code_uses_http_error_status() {
        let cfg = config();
        let err = classify(&completed(500, r#"{"status":"error","error":"db"}"#), &cfg).unwrap_err();
        assert_eq!(
            err,
            ClassifiedError::new(500, ErrorKind::ServerError, Some(cfg.alerts.server_error.clone()))
        );

        let err = classify(&completed(403, r#"{"status":"error"}"#), &cfg).unwrap_err();
        assert_eq!(err.code, 403);
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert!(err.should_alert());
    }

    #[test]
    fn envelope_code_wins_over_http_status() {
        let err = classify(&completed(500, r#"{"status":"error","code":404}"#), &config()).unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn body_without_status_is_not_silenced() {
        let cfg = config();
        for body in [r#"{"payload":{"a":1}}"#, r#"{"message":"hello"}"#] {
            let err = classify(&ok_body(body), &cfg).unwrap_err();
            assert_eq!(
                err,
                ClassifiedError::new(
                    400,
                    ErrorKind::BadRequest,
                    Some(cfg.alerts.internal_error.clone())
                ),
                "{body}"
            );
            assert!(err.should_alert());
        }

        let err = classify(&completed(502, r#"{"payload":{}}"#), &cfg).unwrap_err();
        assert_eq!(err.code, 502);
        assert_eq!(err.kind, ErrorKind::ServerError);
    }

    #[test]
    fn error_without_code_or_identifier_is_cancelled() {
        let err = classify(&ok_body(r#"{"status":"error"}"#), &config()).unwrap_err();
        assert_eq!(err, ClassifiedError::cancelled());

        let err = classify(&ok_body(r#"{"status":"error","code":0}"#), &config()).unwrap_err();
        assert!(!err.should_alert());
    }

    #[test]
    fn aborted_code_is_a_timeout() {
        let err = classify(
            &ok_body(r#"{"status":"error","code":"ECONNABORTED","error":"timeout"}"#),
            &config(),
        )
        .unwrap_err();
        assert_eq!(err.code, 408);
        assert_eq!(err.kind, ErrorKind::Timeout);
    }

    #[test]
    fn transport_timeout_ignores_body() {
        let cfg = config();
        let result = TransportResult::Failed {
            kind: FailureKind::Timeout,
            status: Some(200),
            raw_body: Some(r#"{"status":"ok","payload":{}}"#.to_string()),
        };
        let err = classify(&result, &cfg).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.code, 408);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.server_timeout.as_str()));
    }

    #[test]
    fn transport_cancel_has_no_message() {
        let err = classify(&TransportResult::failed(FailureKind::Cancelled), &config()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert!(err.message.is_none());
    }

    #[test]
    fn network_failure_is_unknown_with_server_error_message() {
        let cfg = config();
        let err = classify(&TransportResult::failed(FailureKind::Network), &cfg).unwrap_err();
        assert_eq!(err.code, 0);
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.server_error.as_str()));
    }

    #[test]
    fn malformed_success_body() {
        let cfg = config();
        let err = classify(&ok_body("<html>oops</html>"), &cfg).unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.kind, ErrorKind::BadRequest);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.internal_error.as_str()));
    }

    #[test]
    fn malformed_error_status_uses_http_code() {
        let cfg = config();
        let err = classify(&completed(404, "Not Found"), &cfg).unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.not_found.as_str()));

        let err = classify(&completed(502, ""), &cfg).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.message.as_deref(), Some(cfg.alerts.internal_error.as_str()));
    }

    #[test]
    fn forbidden_codes() {
        for code in [401, 403] {
            let body = format!(r#"{{"status":"error","code":{code}}}"#);
            let err = classify(&ok_body(&body), &config()).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Forbidden, "code {code}");
        }
    }
}
