//! Rater session state machine.
//!
//! ```text
//! Instructions -> Setup -> Annotating -> BatchComplete -> Setup | AllDone
//! ```
//!
//! All transitions are rater-driven except `Annotating -> BatchComplete`,
//! which happens when the last batch item receives a choice. `AllDone` is
//! terminal.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::data::{AnnotationRecord, Batch, BatchProgress, Choice, Item};
use crate::errors::AnnotateError;
use crate::filters::{SessionFilters, compute_available, domain_options};
use crate::identity::{IdentityStore, generate_human_id};
use crate::loader::WorkingSet;
use crate::oracle::CompletionOracle;
use crate::sampler::BatchSampler;
use crate::submit::{SubmissionHandle, SubmissionSink, dispatch};
use crate::types::{DomainLabel, HumanId, ItemId};

/// Why a session reached `AllDone`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoneReason {
    /// Nothing left to annotate under the selected filters.
    NoSamplesAvailable,
    /// The rater chose to stop.
    EndedByRater,
}

/// Screen currently shown to the rater.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Task description, shown once.
    Instructions,
    /// Domain and language selection.
    Setup,
    /// Comparing the item under the cursor.
    Annotating,
    /// Every batch item received a choice.
    BatchComplete,
    /// Terminal.
    AllDone(DoneReason),
}

impl SessionState {
    /// Screen name used in transition errors.
    pub const fn name(&self) -> &'static str {
        match self {
            SessionState::Instructions => "instructions",
            SessionState::Setup => "setup",
            SessionState::Annotating => "annotating",
            SessionState::BatchComplete => "batch-complete",
            SessionState::AllDone(_) => "all-done",
        }
    }
}

/// Owns one rater's session: working set, pool, batch, cursor, and identity.
pub struct SessionController {
    identity: Box<dyn IdentityStore>,
    oracle: Arc<dyn CompletionOracle>,
    sink: Arc<dyn SubmissionSink>,
    sampler: BatchSampler,
    human_id: HumanId,
    working_set: Vec<Item>,
    completed: HashSet<ItemId>,
    annotated: HashSet<ItemId>,
    filters: SessionFilters,
    available: Vec<Item>,
    batch: Batch,
    cursor: usize,
    annotated_this_session: usize,
    state: SessionState,
}

impl SessionController {
    /// Initialize identity and start on the instructions screen.
    ///
    /// Identity storage failures degrade to a per-session id and an empty annotated set.
    pub fn new(
        working_set: WorkingSet,
        identity: Box<dyn IdentityStore>,
        oracle: Arc<dyn CompletionOracle>,
        sink: Arc<dyn SubmissionSink>,
        sampler: BatchSampler,
    ) -> Self {
        let human_id = identity.ensure_identity().unwrap_or_else(|err| {
            warn!(error = %err, "[annotator:session] identity unavailable; using a session-only id");
            generate_human_id()
        });
        let annotated = identity.load_annotated().unwrap_or_else(|err| {
            warn!(error = %err, "[annotator:session] annotated set unavailable; starting empty");
            HashSet::new()
        });
        info!(
            human_id = %human_id,
            annotated = annotated.len(),
            working_set = working_set.items.len(),
            "[annotator:session] session initialized"
        );
        Self {
            identity,
            oracle,
            sink,
            sampler,
            human_id,
            working_set: working_set.items,
            completed: working_set.completed,
            annotated,
            filters: SessionFilters::default(),
            available: Vec::new(),
            batch: Batch::default(),
            cursor: 0,
            annotated_this_session: 0,
            state: SessionState::Instructions,
        }
    }

    /// Current screen.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Rater id attached to every submission.
    pub fn human_id(&self) -> &str {
        &self.human_id
    }

    /// Filters used by the next `start`.
    pub fn filters(&self) -> &SessionFilters {
        &self.filters
    }

    /// Domains offered on the setup screen.
    pub fn domain_options(&self) -> Vec<DomainLabel> {
        domain_options(&self.working_set, &self.completed)
    }

    /// Items remaining in the available pool.
    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    /// Items this rater has annotated across all sessions.
    pub fn annotated_total(&self) -> usize {
        self.annotated.len()
    }

    /// Items annotated since this controller was created.
    pub fn annotated_this_session(&self) -> usize {
        self.annotated_this_session
    }

    /// Whether `id` was annotated by this rater.
    pub fn is_annotated(&self, id: &str) -> bool {
        self.annotated.contains(id)
    }

    /// Active batch (empty before the first `start`).
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Leave the instructions or batch summary for the setup screen.
    pub fn show_setup(&mut self) -> Result<(), AnnotateError> {
        self.expect_state(
            &[SessionState::Instructions, SessionState::BatchComplete],
            "show_setup",
        )?;
        self.state = SessionState::Setup;
        Ok(())
    }

    /// Replace the domain/language selection.
    pub fn set_filters(&mut self, filters: SessionFilters) -> Result<(), AnnotateError> {
        self.expect_state(&[SessionState::Setup], "set_filters")?;
        self.filters = filters;
        Ok(())
    }

    /// Re-fetch the completed list from the oracle.
    pub fn refresh_completed(&mut self) {
        self.completed = self.oracle.fetch_completed();
    }

    /// Refresh the completed list, recompute the pool, and build a batch.
    ///
    /// An empty pool ends the session in `AllDone`, never `Annotating`.
    pub fn start(&mut self) -> Result<SessionState, AnnotateError> {
        self.expect_state(&[SessionState::Setup], "start")?;
        self.refresh_completed();
        self.available = compute_available(
            &self.working_set,
            &self.filters,
            &self.annotated,
            &self.completed,
        );
        info!(
            available = self.available.len(),
            "[annotator:session] samples available for this rater"
        );
        self.prepare_batch()?;
        Ok(self.state)
    }

    /// Item under the cursor, or `None` once the batch is exhausted.
    pub fn current(&self) -> Option<&Item> {
        if self.state != SessionState::Annotating {
            return None;
        }
        self.batch.get(self.cursor)
    }

    /// Position of the displayed item within the batch.
    pub fn progress(&self) -> Option<BatchProgress> {
        self.current().map(|_| BatchProgress {
            position: self.cursor + 1,
            total: self.batch.len(),
        })
    }

    /// Record `choice` for the displayed item and advance.
    ///
    /// `item_id` must name the displayed item, so a repeated call for the same
    /// screen is rejected instead of double counted. The local record is
    /// written before the remote submission is dispatched; the returned
    /// handle may be dropped.
    pub fn choose(
        &mut self,
        item_id: &str,
        choice: Choice,
    ) -> Result<SubmissionHandle, AnnotateError> {
        self.expect_state(&[SessionState::Annotating], "choose")?;
        let Some(item) = self.batch.get(self.cursor) else {
            return Err(AnnotateError::InvalidTransition {
                from: self.state.name(),
                action: "choose",
            });
        };
        if item.id != item_id {
            return Err(AnnotateError::StaleChoice {
                expected: item.id.clone(),
                got: item_id.to_string(),
            });
        }
        let item_id = item.id.clone();

        if let Err(err) = self.identity.record_annotated(&item_id) {
            warn!(
                evaluation_id = %item_id,
                error = %err,
                "[annotator:session] failed to persist annotated id"
            );
        }
        if self.annotated.insert(item_id.clone()) {
            self.annotated_this_session += 1;
        }
        let handle = dispatch(
            Arc::clone(&self.sink),
            AnnotationRecord::new(item_id.clone(), choice, self.human_id.clone()),
        );
        self.available.retain(|candidate| candidate.id != item_id);
        self.cursor += 1;
        debug!(
            evaluation_id = %item_id,
            choice = %choice,
            cursor = self.cursor,
            "[annotator:session] choice recorded"
        );
        if self.cursor >= self.batch.len() {
            self.state = SessionState::BatchComplete;
        }
        Ok(handle)
    }

    /// Stop annotating for good.
    pub fn end_session(&mut self) -> Result<(), AnnotateError> {
        self.expect_state(
            &[SessionState::Setup, SessionState::BatchComplete],
            "end_session",
        )?;
        self.state = SessionState::AllDone(DoneReason::EndedByRater);
        Ok(())
    }

    fn prepare_batch(&mut self) -> Result<(), AnnotateError> {
        match self.sampler.next_batch(&mut self.available) {
            Ok(batch) if !batch.is_empty() => {
                self.batch = batch;
                self.cursor = 0;
                self.state = SessionState::Annotating;
                Ok(())
            }
            Ok(_) | Err(AnnotateError::NoSamplesAvailable) => {
                self.batch = Batch::default();
                self.cursor = 0;
                self.state = SessionState::AllDone(DoneReason::NoSamplesAvailable);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn expect_state(
        &self,
        allowed: &[SessionState],
        action: &'static str,
    ) -> Result<(), AnnotateError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AnnotateError::InvalidTransition {
                from: self.state.name(),
                action,
            })
        }
    }
}
