//! Evaluation/question join and per-row normalization.
//!
//! Every evaluation row either becomes exactly one [`Item`] or is skipped
//! with a [`JoinSkip`] reason. Skips are tallied in a [`JoinReport`] and
//! never surface as errors.
//!
//! `human_count` must be a non-negative integer or blank; values such as
//! `2.5` or `-1` are skipped as [`JoinSkip::InvalidHumanCount`] rather than
//! truncated.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::AnnotatorConfig;
use crate::constants::join::{
    COL_DOMAIN, COL_EVALUATION_ID, COL_HUMAN_COUNT, COL_LANGUAGE, COL_QUESTION_ID,
    COL_RESPONSE_A, COL_RESPONSE_B, DEFAULT_LANGUAGE, PROMPT_COLUMN_PREFIX, SATURATION_THRESHOLD,
};
use crate::data::{Item, PromptVariant, Row};
use crate::types::ColumnName;
use crate::utils::{base_id_of, base_language, id_tokens, non_blank};

/// Reason an evaluation row was left out of the working set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JoinSkip {
    /// The row has no evaluation id.
    MissingEvaluationId,
    /// No question row shares the row's `question_id`.
    MissingQuestion,
    /// No id token names a known prompt variant.
    UnknownVariant,
    /// The resolved prompt column is absent or empty in the question row.
    MissingPromptColumn,
    /// `human_count` is present but not a non-negative integer.
    InvalidHumanCount,
    /// Enough prior human judgments already exist.
    Saturated,
    /// An earlier row already produced an item with the same id.
    DuplicateId,
}

/// Join outcome counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Evaluation rows examined.
    pub total_rows: usize,
    /// Rows that produced an item.
    pub joined: usize,
    /// Skipped rows per reason.
    pub skipped: BTreeMap<JoinSkip, usize>,
}

impl JoinReport {
    /// Number of rows skipped for `reason`.
    pub fn count(&self, reason: JoinSkip) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    /// Number of rows skipped for any reason.
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    fn record_skip(&mut self, reason: JoinSkip) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }
}

/// Working set plus the report describing how it was built.
#[derive(Clone, Debug, Default)]
pub struct JoinOutcome {
    /// Joined items in evaluation-row order.
    pub items: Vec<Item>,
    /// How each evaluation row was treated.
    pub report: JoinReport,
}

/// Joins evaluation rows with question rows.
#[derive(Clone, Debug)]
pub struct Joiner {
    default_language: String,
    saturation_threshold: Option<u32>,
}

impl Default for Joiner {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
            saturation_threshold: Some(SATURATION_THRESHOLD),
        }
    }
}

impl Joiner {
    /// Build a joiner from the annotator configuration.
    pub fn from_config(config: &AnnotatorConfig) -> Self {
        Self {
            default_language: config.default_language.clone(),
            saturation_threshold: config.saturation_threshold,
        }
    }

    /// Override the saturation gate (`None` disables it).
    pub fn with_saturation_threshold(mut self, threshold: Option<u32>) -> Self {
        self.saturation_threshold = threshold;
        self
    }

    /// Join every evaluation row against the question table.
    pub fn join(&self, eval_rows: &[Row], question_rows: &[Row]) -> JoinOutcome {
        let questions: HashMap<&str, &Row> = question_rows
            .iter()
            .filter_map(|row| {
                row.get(COL_QUESTION_ID)
                    .map(|id| (id.trim(), row))
            })
            .collect();

        let mut outcome = JoinOutcome::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        for row in eval_rows {
            outcome.report.total_rows += 1;
            match self.resolve_row(row, &questions) {
                Ok(item) => {
                    if !seen_ids.insert(item.id.clone()) {
                        outcome.report.record_skip(JoinSkip::DuplicateId);
                        continue;
                    }
                    outcome.report.joined += 1;
                    outcome.items.push(item);
                }
                Err(reason) => outcome.report.record_skip(reason),
            }
        }
        debug!(
            total = outcome.report.total_rows,
            joined = outcome.report.joined,
            skipped = outcome.report.total_skipped(),
            "[annotator:join] working set built"
        );
        outcome
    }

    fn resolve_row(&self, row: &Row, questions: &HashMap<&str, &Row>) -> Result<Item, JoinSkip> {
        let evaluation_id = non_blank(field(row, COL_EVALUATION_ID))
            .ok_or(JoinSkip::MissingEvaluationId)?;
        let question_id = field(row, COL_QUESTION_ID).unwrap_or_default().trim();
        let question = questions
            .get(question_id)
            .ok_or(JoinSkip::MissingQuestion)?;

        let language = non_blank(field(row, COL_LANGUAGE))
            .unwrap_or(self.default_language.as_str())
            .to_string();
        let variant = resolve_variant(evaluation_id).ok_or(JoinSkip::UnknownVariant)?;
        let column = prompt_column(variant, &language);
        let Some(prompt) = non_blank(field(question, &column)) else {
            warn!(
                column = %column,
                question_id = %question_id,
                "[annotator:join] prompt column missing or empty"
            );
            return Err(JoinSkip::MissingPromptColumn);
        };

        let prior_human_count = parse_human_count(field(row, COL_HUMAN_COUNT))?;
        if let Some(threshold) = self.saturation_threshold
            && prior_human_count >= threshold
        {
            return Err(JoinSkip::Saturated);
        }

        Ok(Item {
            id: evaluation_id.to_string(),
            base_id: base_id_of(evaluation_id).to_string(),
            prompt: prompt.to_string(),
            response_a: field(row, COL_RESPONSE_A).unwrap_or_default().to_string(),
            response_b: field(row, COL_RESPONSE_B).unwrap_or_default().to_string(),
            domain: field(row, COL_DOMAIN).unwrap_or_default().trim().to_string(),
            language,
            prior_human_count,
        })
    }
}

/// Join with default settings, discarding the report.
pub fn join(eval_rows: &[Row], question_rows: &[Row]) -> Vec<Item> {
    Joiner::default().join(eval_rows, question_rows).items
}

/// First id token naming a known prompt variant.
pub fn resolve_variant(evaluation_id: &str) -> Option<PromptVariant> {
    id_tokens(evaluation_id).find_map(|token| PromptVariant::from_token(&token))
}

/// Question column holding the prompt for `variant` in `language`'s base subtag.
pub fn prompt_column(variant: PromptVariant, language: &str) -> ColumnName {
    format!(
        "{PROMPT_COLUMN_PREFIX}_{}_{}",
        variant.as_str(),
        base_language(language)
    )
}

fn field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).map(String::as_str)
}

fn parse_human_count(raw: Option<&str>) -> Result<u32, JoinSkip> {
    match non_blank(raw) {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| JoinSkip::InvalidHumanCount),
    }
}
