//! Write path for annotation records.
//!
//! Submissions are best-effort and at-most-once from the client's side:
//! [`dispatch`] runs the write on a detached thread and nothing retries it.
//! A lost write only shows up later as an id missing from the completed list.

use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::Value;
use tracing::{debug, warn};

use crate::data::AnnotationRecord;
use crate::errors::AnnotateError;
use crate::transport::http::{TransportError, post_json};

/// Destination for annotation records.
pub trait SubmissionSink: Send + Sync {
    /// Deliver one record. Blocking; callers wanting fire-and-forget use [`dispatch`].
    fn submit(&self, record: &AnnotationRecord) -> Result<(), AnnotateError>;
}

/// How much of the proxy's reply the client may inspect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmitMode {
    /// Reply is unreadable; success is inferred from the absence of a transport failure.
    #[default]
    Opaque,
    /// Reply status and body are checked for an explicit success acknowledgment.
    Acknowledged,
}

/// Sink posting JSON records to the proxy endpoint.
pub struct HttpSubmissionSink {
    url: String,
    mode: SubmitMode,
}

impl HttpSubmissionSink {
    /// Create a sink posting to `url` in opaque mode.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: SubmitMode::default(),
        }
    }

    /// Override the reply-inspection mode.
    pub fn with_mode(mut self, mode: SubmitMode) -> Self {
        self.mode = mode;
        self
    }
}

impl SubmissionSink for HttpSubmissionSink {
    fn submit(&self, record: &AnnotationRecord) -> Result<(), AnnotateError> {
        let payload = serde_json::to_string(record)
            .map_err(|err| AnnotateError::Submit(format!("failed encoding record: {err}")))?;
        match (post_json(&self.url, &payload), self.mode) {
            (Ok(body), SubmitMode::Acknowledged) => check_acknowledgment(&body),
            (Ok(_), SubmitMode::Opaque) => Ok(()),
            (Err(TransportError::Status(_)), SubmitMode::Opaque) => Ok(()),
            (Err(err), _) => Err(AnnotateError::Submit(err.to_string())),
        }
    }
}

/// Accept `{"status":"success"}`; reject bodies carrying an `error` field.
/// Non-JSON bodies from a successful status are accepted.
pub fn check_acknowledgment(body: &str) -> Result<(), AnnotateError> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Ok(());
    };
    if let Some(error) = value.get("error") {
        return Err(AnnotateError::Submit(format!("proxy reported error: {error}")));
    }
    match value.get("status").and_then(Value::as_str) {
        Some("success") | None => Ok(()),
        Some(other) => Err(AnnotateError::Submit(format!(
            "proxy reported status '{other}'"
        ))),
    }
}

/// Handle to a dispatched submission.
///
/// Dropping it detaches the write; `wait` blocks for its outcome.
#[derive(Debug)]
pub struct SubmissionHandle {
    handle: thread::JoinHandle<Result<(), AnnotateError>>,
}

impl SubmissionHandle {
    /// Block until the write settles.
    pub fn wait(self) -> Result<(), AnnotateError> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(AnnotateError::Submit("submission thread panicked".into())))
    }

    /// Whether the write already settled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Send `record` on a detached thread. Failures are logged, never retried.
pub fn dispatch(sink: Arc<dyn SubmissionSink>, record: AnnotationRecord) -> SubmissionHandle {
    let handle = thread::spawn(move || {
        let result = sink.submit(&record);
        match &result {
            Ok(()) => debug!(
                evaluation_id = %record.evaluation_id,
                "[annotator:submit] annotation sent"
            ),
            Err(err) => warn!(
                evaluation_id = %record.evaluation_id,
                error = %err,
                "[annotator:submit] error saving annotation"
            ),
        }
        result
    });
    SubmissionHandle { handle }
}

/// Sink that keeps records in memory.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AnnotationRecord>>,
    fail: bool,
}

impl RecordingSink {
    /// Sink that accepts every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that records every attempt but reports failure.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Records received so far, in arrival order.
    pub fn records(&self) -> Vec<AnnotationRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl SubmissionSink for RecordingSink {
    fn submit(&self, record: &AnnotationRecord) -> Result<(), AnnotateError> {
        self.records
            .lock()
            .map_err(|_| AnnotateError::Submit("recording sink poisoned".into()))?
            .push(record.clone());
        if self.fail {
            return Err(AnnotateError::Submit("sink configured to fail".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Choice;

    #[test]
    fn acknowledgment_rules() {
        assert!(check_acknowledgment(r#"{"status":"success"}"#).is_ok());
        assert!(check_acknowledgment("ok").is_ok());
        assert!(check_acknowledgment(r#"{"error":"Failed to submit annotation."}"#).is_err());
        assert!(check_acknowledgment(r#"{"status":"queued"}"#).is_err());
    }

    #[test]
    fn dispatch_delivers_in_the_background() {
        let sink = Arc::new(RecordingSink::new());
        let handle = dispatch(
            sink.clone(),
            AnnotationRecord::new("q1_minimum_1", Choice::A, "user-1-abc"),
        );
        handle.wait().unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].human_choice, "A");
    }

    #[test]
    fn dispatch_reports_sink_failures_through_the_handle() {
        let sink = Arc::new(RecordingSink::failing());
        let handle = dispatch(
            sink.clone(),
            AnnotationRecord::new("q1_minimum_1", Choice::B, "user-1-abc"),
        );
        assert!(matches!(handle.wait(), Err(AnnotateError::Submit(_))));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn transport_failures_fail_even_in_opaque_mode() {
        let sink = HttpSubmissionSink::new("http://127.0.0.1:9/submit");
        let record = AnnotationRecord::new("q1_minimum_1", Choice::A, "user-1-abc");
        assert!(matches!(sink.submit(&record), Err(AnnotateError::Submit(_))));
    }
}
