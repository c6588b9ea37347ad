#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Annotator configuration.
pub mod config;
/// Centralized constants used across identity, join, sampler, and proxy.
pub mod constants;
/// Item, choice, record, and batch types.
pub mod data;
/// Reusable terminal runners behind the crate's binaries.
pub mod example_apps;
/// Domain and language filters plus setup-screen options.
pub mod filters;
/// Per-rater identity and annotated-id persistence.
pub mod identity;
/// Evaluation/question join and its report.
pub mod join;
/// Concurrent table and completed-list loading.
pub mod loader;
/// Completed-list providers.
pub mod oracle;
/// Transport-agnostic submission proxy.
pub mod proxy;
/// Shuffling and batch assembly.
pub mod sampler;
/// Rater session state machine.
pub mod session;
/// Table source traits and built-in sources.
pub mod source;
/// Annotation submission sinks.
pub mod submit;
/// Input transports used by sources and sinks (filesystem and HTTP).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Id and language helpers.
pub mod utils;

mod errors;

pub use config::AnnotatorConfig;
pub use data::{AnnotationRecord, Batch, BatchProgress, Choice, Item, PromptVariant, Row};
pub use errors::AnnotateError;
pub use filters::{LanguageFilter, SessionFilters, compute_available};
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore, open_identity_store};
pub use join::{JoinReport, JoinSkip, Joiner};
pub use loader::{WorkingSet, load_working_set};
pub use oracle::{CompletionOracle, HttpCompletionOracle, StaticCompletionOracle};
pub use proxy::{ProxyBackend, ProxyHandler, ProxyRequest, ProxyResponse, UreqBackend};
pub use sampler::{BatchSampler, build_batch};
pub use session::{DoneReason, SessionController, SessionState};
pub use source::{FileTable, HttpTable, InMemoryTable, TableSource, table_source};
pub use submit::{HttpSubmissionSink, SubmissionHandle, SubmissionSink, dispatch};
pub use types::{BaseId, DomainLabel, HumanId, ItemId, LanguageTag, QuestionId};
