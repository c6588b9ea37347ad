use std::io;

use thiserror::Error;

use crate::types::{ItemId, TableId};

/// Error type for loading, persistence, submission, and session control failures.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("failed to load table '{table}': {reason}")]
    Load { table: TableId, reason: String },
    #[error("submission failed: {0}")]
    Submit(String),
    #[error("identity store failure: {0}")]
    Store(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("no samples available for the selected filters")]
    NoSamplesAvailable,
    #[error("action '{action}' is not valid on the {from} screen")]
    InvalidTransition { from: &'static str, action: &'static str },
    #[error("choice targets item '{got}' but the current item is '{expected}'")]
    StaleChoice { expected: ItemId, got: ItemId },
    #[error("proxy failure: {0}")]
    Proxy(String),
}
