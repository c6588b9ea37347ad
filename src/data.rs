use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use crate::types::{BaseId, DomainLabel, HumanId, ItemId, LanguageTag};

/// One parsed table row keyed by header, in header order.
pub type Row = IndexMap<String, String>;

/// Closed set of prompt-construction styles encoded in evaluation ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    /// Bare question with no added framing.
    Minimum,
    /// Question with situational context.
    Contextual,
    /// Question with detailed instructions.
    Detailed,
    /// Question with an explicit output structure.
    Structured,
}

impl PromptVariant {
    /// Every variant, in the order tokens are matched.
    pub const ALL: [PromptVariant; 4] = [
        PromptVariant::Minimum,
        PromptVariant::Contextual,
        PromptVariant::Detailed,
        PromptVariant::Structured,
    ];

    /// Lowercase label used in evaluation ids and prompt column names.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PromptVariant::Minimum => "minimum",
            PromptVariant::Contextual => "contextual",
            PromptVariant::Detailed => "detailed",
            PromptVariant::Structured => "structured",
        }
    }

    /// Match a single lowercase id token against the closed set.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str() == token)
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of annotation: one prompt plus two candidate responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique id within the working set (the evaluation id).
    pub id: ItemId,
    /// Evaluation id truncated at its first separator.
    pub base_id: BaseId,
    /// Resolved prompt text; never empty.
    pub prompt: String,
    /// First candidate response.
    pub response_a: String,
    /// Second candidate response.
    pub response_b: String,
    /// Domain category label.
    pub domain: DomainLabel,
    /// Full language tag, region included.
    pub language: LanguageTag,
    /// Prior human judgments reported by the evaluations table.
    pub prior_human_count: u32,
}

/// Preference recorded for the displayed item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    /// Response A preferred.
    A,
    /// Response B preferred.
    B,
    /// Neither response preferred over the other.
    #[serde(rename = "tie")]
    Tie,
}

impl Choice {
    /// Wire value sent as `human_choice`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::Tie => "tie",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Choice::A),
            "b" => Ok(Choice::B),
            "tie" => Ok(Choice::Tie),
            other => Err(format!("unknown choice '{other}' (expected A, B, or tie)")),
        }
    }
}

/// Payload forwarded to the proxy for each choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Item the choice applies to.
    pub evaluation_id: ItemId,
    /// `A`, `B`, or `tie`.
    pub human_choice: String,
    /// Rater id.
    pub human_id: HumanId,
}

impl AnnotationRecord {
    /// Build the wire record for `item_id` chosen by `human_id`.
    pub fn new(item_id: impl Into<ItemId>, choice: Choice, human_id: impl Into<HumanId>) -> Self {
        Self {
            evaluation_id: item_id.into(),
            human_choice: choice.as_str().to_string(),
            human_id: human_id.into(),
        }
    }
}

/// Ordered, bounded sequence of items presented in one session pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    /// Items in presentation order.
    pub items: Vec<Item>,
}

impl Batch {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Item> {
        self.items.get(idx)
    }

    /// Items in presentation order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }
}

/// Cursor position inside the active batch ("sample 3 of 10").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// One-based position of the displayed item.
    pub position: usize,
    /// Number of items in the batch.
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_variants_match_only_known_tokens() {
        assert_eq!(
            PromptVariant::from_token("contextual"),
            Some(PromptVariant::Contextual)
        );
        assert_eq!(PromptVariant::from_token("Minimum"), None);
        assert_eq!(PromptVariant::from_token("q1"), None);
        assert_eq!(PromptVariant::Structured.to_string(), "structured");
    }

    #[test]
    fn choices_parse_case_insensitively() {
        assert_eq!("a".parse::<Choice>(), Ok(Choice::A));
        assert_eq!(" B ".parse::<Choice>(), Ok(Choice::B));
        assert_eq!("TIE".parse::<Choice>(), Ok(Choice::Tie));
        assert!("c".parse::<Choice>().is_err());
    }

    #[test]
    fn annotation_record_serializes_wire_field_names() {
        let record = AnnotationRecord::new("q1_minimum_1", Choice::B, "user-1-abc");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "evaluation_id": "q1_minimum_1",
                "human_choice": "B",
                "human_id": "user-1-abc",
            })
        );
    }
}
