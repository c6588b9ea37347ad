//! Transport-agnostic submission proxy.
//!
//! Sits between raters and the annotation backend: POST forwards one record,
//! GET relays the completed list. The handler works on plain request/response
//! values so any HTTP server (or a test) can drive it.

use std::env;

use serde_json::{Value, json};
use tracing::{error, info};

use crate::constants::proxy::{
    BACKEND_URL_ENV, FETCH_FAILED_MSG, LEGACY_BACKEND_URL_ENV, METHOD_NOT_ALLOWED_MSG,
    SUBMIT_FAILED_MSG,
};
use crate::errors::AnnotateError;
use crate::transport::http::{TransportError, fetch_text, post_json};

/// Incoming proxy request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyRequest {
    /// HTTP method, matched case-insensitively.
    pub method: String,
    /// Raw request body.
    pub body: Option<String>,
}

impl ProxyRequest {
    /// GET with no body.
    pub fn get() -> Self {
        Self {
            method: "GET".to_string(),
            body: None,
        }
    }

    /// POST carrying `body`.
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            body: Some(body.into()),
        }
    }
}

/// Proxy reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl ProxyResponse {
    fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            body: value.to_string(),
        }
    }

    fn error(message: &str) -> Self {
        Self::json(500, &json!({ "error": message }))
    }
}

/// Backend the proxy forwards to.
pub trait ProxyBackend: Send + Sync {
    /// Forward one JSON record.
    fn forward(&self, payload: &Value) -> Result<(), AnnotateError>;
    /// Fetch the completed list as JSON.
    fn completed(&self) -> Result<Value, AnnotateError>;
}

/// Backend reached over HTTP.
pub struct UreqBackend {
    url: String,
}

impl UreqBackend {
    /// Backend at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Backend named by the environment, preferring the current variable over the legacy one.
    pub fn from_env() -> Result<Self, AnnotateError> {
        backend_url_from(|key| env::var(key).ok()).map(Self::new)
    }
}

impl ProxyBackend for UreqBackend {
    fn forward(&self, payload: &Value) -> Result<(), AnnotateError> {
        match post_json(&self.url, &payload.to_string()) {
            // The backend's reply status is not inspected, only delivery.
            Ok(_) | Err(TransportError::Status(_)) => Ok(()),
            Err(err) => Err(AnnotateError::Proxy(err.to_string())),
        }
    }

    fn completed(&self) -> Result<Value, AnnotateError> {
        let body = fetch_text(&self.url).map_err(|err| AnnotateError::Proxy(err.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|err| AnnotateError::Proxy(format!("backend returned invalid JSON: {err}")))
    }
}

/// Resolve the backend URL through `lookup`; blank values count as unset.
pub fn backend_url_from<F>(lookup: F) -> Result<String, AnnotateError>
where
    F: Fn(&str) -> Option<String>,
{
    [BACKEND_URL_ENV, LEGACY_BACKEND_URL_ENV]
        .into_iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or_else(|| {
            AnnotateError::Configuration(format!(
                "set {BACKEND_URL_ENV} (or {LEGACY_BACKEND_URL_ENV}) to the backend URL"
            ))
        })
}

/// Maps proxy requests onto a backend.
pub struct ProxyHandler<B> {
    backend: B,
}

impl<B: ProxyBackend> ProxyHandler<B> {
    /// Handler forwarding to `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Handle one request.
    pub fn handle(&self, request: &ProxyRequest) -> ProxyResponse {
        match request.method.to_ascii_uppercase().as_str() {
            "POST" => self.handle_post(request.body.as_deref().unwrap_or_default()),
            "GET" => self.handle_get(),
            _ => ProxyResponse {
                status: 405,
                body: METHOD_NOT_ALLOWED_MSG.to_string(),
            },
        }
    }

    fn handle_post(&self, body: &str) -> ProxyResponse {
        let forwarded = serde_json::from_str::<Value>(body)
            .map_err(|err| AnnotateError::Proxy(format!("invalid request body: {err}")))
            .and_then(|payload| self.backend.forward(&payload));
        match forwarded {
            Ok(()) => {
                info!("[annotator:proxy] annotation forwarded");
                ProxyResponse::json(200, &json!({ "status": "success" }))
            }
            Err(err) => {
                error!(error = %err, "[annotator:proxy] error in POST");
                ProxyResponse::error(SUBMIT_FAILED_MSG)
            }
        }
    }

    fn handle_get(&self) -> ProxyResponse {
        match self.backend.completed() {
            Ok(value) => ProxyResponse::json(200, &value),
            Err(err) => {
                error!(error = %err, "[annotator:proxy] error in GET");
                ProxyResponse::error(FETCH_FAILED_MSG)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        forwarded: Mutex<Vec<Value>>,
        completed: Option<Value>,
        fail_forward: bool,
    }

    impl ProxyBackend for FakeBackend {
        fn forward(&self, payload: &Value) -> Result<(), AnnotateError> {
            if self.fail_forward {
                return Err(AnnotateError::Proxy("down".into()));
            }
            self.forwarded.lock().unwrap().push(payload.clone());
            Ok(())
        }

        fn completed(&self) -> Result<Value, AnnotateError> {
            self.completed
                .clone()
                .ok_or_else(|| AnnotateError::Proxy("down".into()))
        }
    }

    #[test]
    fn post_forwards_payload_and_acknowledges() {
        let handler = ProxyHandler::new(FakeBackend::default());
        let body = r#"{"evaluation_id":"q1_minimum_1","human_choice":"A","human_id":"user-1-abc"}"#;
        let response = handler.handle(&ProxyRequest::post(body));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"status":"success"}"#);
        let forwarded = handler.backend.forwarded.lock().unwrap();
        assert_eq!(forwarded[0]["human_choice"], "A");
    }

    #[test]
    fn invalid_post_body_is_a_server_error() {
        let handler = ProxyHandler::new(FakeBackend::default());
        let response = handler.handle(&ProxyRequest::post("not json"));
        assert_eq!(response.status, 500);
        assert!(response.body.contains(SUBMIT_FAILED_MSG));
        assert!(handler.backend.forwarded.lock().unwrap().is_empty());
    }

    #[test]
    fn backend_failures_map_to_fixed_messages() {
        let handler = ProxyHandler::new(FakeBackend {
            fail_forward: true,
            ..FakeBackend::default()
        });
        assert!(handler.handle(&ProxyRequest::post("{}")).body.contains(SUBMIT_FAILED_MSG));
        let get = handler.handle(&ProxyRequest::get());
        assert_eq!(get.status, 500);
        assert!(get.body.contains(FETCH_FAILED_MSG));
    }

    #[test]
    fn get_relays_backend_json() {
        let handler = ProxyHandler::new(FakeBackend {
            completed: Some(json!(["q1_minimum_1", "q2_detailed_3"])),
            ..FakeBackend::default()
        });
        let response = handler.handle(&ProxyRequest::get());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"["q1_minimum_1","q2_detailed_3"]"#);
    }

    #[test]
    fn other_methods_are_rejected() {
        let handler = ProxyHandler::new(FakeBackend::default());
        let response = handler.handle(&ProxyRequest {
            method: "DELETE".into(),
            body: None,
        });
        assert_eq!(response.status, 405);
        assert_eq!(response.body, METHOD_NOT_ALLOWED_MSG);
    }

    #[test]
    fn backend_url_prefers_current_variable() {
        let url = backend_url_from(|key| match key {
            BACKEND_URL_ENV => Some("https://current".into()),
            LEGACY_BACKEND_URL_ENV => Some("https://legacy".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(url, "https://current");

        let url = backend_url_from(|key| match key {
            BACKEND_URL_ENV => Some("  ".into()),
            LEGACY_BACKEND_URL_ENV => Some("https://legacy".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(url, "https://legacy");

        assert!(backend_url_from(|_| None).is_err());
    }

    #[test]
    fn unreachable_backend_fails_both_directions() {
        let backend = UreqBackend::new("http://127.0.0.1:9/backend");
        assert!(backend.forward(&json!({})).is_err());
        assert!(backend.completed().is_err());
    }
}
