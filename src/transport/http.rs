use thiserror::Error;
use tracing::debug;

/// Upper bound on a fetched body; tables with long responses exceed ureq's default.
pub const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Failure of one HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server responded with status {0}")]
    Status(u16),
    /// The request never completed (DNS, connect, TLS, timeout, body read).
    #[error("transport failure: {0}")]
    Transport(String),
}

impl TransportError {
    /// True when the failure happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, TransportError::Transport(_))
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => TransportError::Status(code),
            other => TransportError::Transport(other.to_string()),
        }
    }
}

/// GET `url` and return the response body as text.
pub fn fetch_text(url: &str) -> Result<String, TransportError> {
    debug!(url = %url, "[annotator:http] GET");
    let response = ureq::get(url).call()?;
    let mut body = response.into_body();
    body.with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_string()
        .map_err(|err| TransportError::Transport(format!("failed reading body: {err}")))
}

/// POST a JSON payload to `url` and return the response body as text.
pub fn post_json(url: &str, payload: &str) -> Result<String, TransportError> {
    debug!(url = %url, bytes = payload.len(), "[annotator:http] POST");
    let response = ureq::post(url)
        .header("Content-Type", "application/json")
        .send(payload)?;
    let mut body = response.into_body();
    body.with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_string()
        .map_err(|err| TransportError::Transport(format!("failed reading body: {err}")))
}

/// True when `reference` names an HTTP(S) resource rather than a local path.
pub fn is_remote(reference: &str) -> bool {
    let lowered = reference.trim_start().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_references_are_detected_by_scheme() {
        assert!(is_remote("https://example.com/data.csv"));
        assert!(is_remote("HTTP://example.com/data.csv"));
        assert!(!is_remote("data/prompts.csv"));
        assert!(!is_remote("/tmp/https.csv"));
    }

    #[test]
    fn status_errors_are_not_transport_failures() {
        assert!(!TransportError::Status(500).is_transport());
        assert!(TransportError::Transport("refused".into()).is_transport());
    }

    #[test]
    fn unreachable_host_is_a_transport_failure() {
        let err = fetch_text("http://127.0.0.1:9/unreachable.csv").unwrap_err();
        assert!(err.is_transport());
    }
}
