//! Read path for the globally completed item list.
//!
//! The oracle is fail-open: any failure yields an empty set and a warning,
//! so raters may see saturated items rather than be blocked.

use std::collections::HashSet;
use std::sync::RwLock;

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AnnotateError;
use crate::transport::http::fetch_text;
use crate::types::ItemId;

/// Source of item ids other raters already saturated.
pub trait CompletionOracle: Send + Sync {
    /// Fetch the completed set. Never fails; errors degrade to an empty set.
    fn fetch_completed(&self) -> HashSet<ItemId>;
}

/// Oracle backed by the proxy's GET endpoint.
pub struct HttpCompletionOracle {
    url: String,
}

impl HttpCompletionOracle {
    /// Create an oracle reading from `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn try_fetch(&self) -> Result<HashSet<ItemId>, AnnotateError> {
        let body = fetch_text(&self.url)
            .map_err(|err| AnnotateError::Proxy(format!("completed list fetch failed: {err}")))?;
        parse_completed(&body)
    }
}

impl CompletionOracle for HttpCompletionOracle {
    fn fetch_completed(&self) -> HashSet<ItemId> {
        match self.try_fetch() {
            Ok(completed) => {
                info!(
                    completed = completed.len(),
                    "[annotator:oracle] completed questions loaded"
                );
                completed
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "[annotator:oracle] failed to load completed questions");
                HashSet::new()
            }
        }
    }
}

/// Parse a JSON array of completed ids. Numeric ids are accepted and stringified.
pub fn parse_completed(body: &str) -> Result<HashSet<ItemId>, AnnotateError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| AnnotateError::Proxy(format!("completed list is not JSON: {err}")))?;
    let Value::Array(entries) = value else {
        return Err(AnnotateError::Proxy(
            "completed list is not a JSON array".into(),
        ));
    };
    let mut completed = HashSet::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(id) => {
                let id = id.trim();
                if !id.is_empty() {
                    completed.insert(id.to_string());
                }
            }
            Value::Number(id) => {
                completed.insert(id.to_string());
            }
            Value::Null => {}
            other => {
                return Err(AnnotateError::Proxy(format!(
                    "unexpected completed list entry: {other}"
                )));
            }
        }
    }
    Ok(completed)
}

/// Fixed oracle for tests and offline runs; the set can be replaced between sessions.
#[derive(Default)]
pub struct StaticCompletionOracle {
    completed: RwLock<HashSet<ItemId>>,
}

impl StaticCompletionOracle {
    /// Create an oracle reporting `completed`.
    pub fn new<I, S>(completed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        Self {
            completed: RwLock::new(completed.into_iter().map(Into::into).collect()),
        }
    }

    /// Replace the reported set.
    pub fn set<I, S>(&self, completed: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        if let Ok(mut guard) = self.completed.write() {
            *guard = completed.into_iter().map(Into::into).collect();
        }
    }
}

impl CompletionOracle for StaticCompletionOracle {
    fn fetch_completed(&self) -> HashSet<ItemId> {
        self.completed
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}
