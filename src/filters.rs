//! Rater-chosen filters and the available-pool computation.

use std::collections::{BTreeSet, HashSet};

use crate::constants::sampler::{ANY_LANGUAGE, DEFAULT_LANGUAGE_FILTER};
use crate::data::Item;
use crate::types::{DomainLabel, ItemId, LanguageTag};
use crate::utils::base_language;

/// Language selection on the setup screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LanguageFilter {
    /// Match every item regardless of its tag.
    Any,
    /// Match items whose lowercased tag starts with this tag's base subtag.
    Tag(LanguageTag),
}

impl LanguageFilter {
    /// Parse a setup-screen value; `todos` (any case) selects every language.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(ANY_LANGUAGE) {
            LanguageFilter::Any
        } else {
            LanguageFilter::Tag(value.to_string())
        }
    }

    /// Value as shown in the language select.
    pub fn as_str(&self) -> &str {
        match self {
            LanguageFilter::Any => ANY_LANGUAGE,
            LanguageFilter::Tag(tag) => tag,
        }
    }

    /// Whether an item tagged `item_language` passes this filter.
    pub fn matches(&self, item_language: &str) -> bool {
        match self {
            LanguageFilter::Any => true,
            LanguageFilter::Tag(tag) => item_language
                .to_lowercase()
                .starts_with(&base_language(tag)),
        }
    }
}

impl Default for LanguageFilter {
    fn default() -> Self {
        LanguageFilter::Tag(DEFAULT_LANGUAGE_FILTER.to_string())
    }
}

/// Filters applied before each batch is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionFilters {
    /// Selected domains; empty selects every domain.
    pub domains: Vec<DomainLabel>,
    /// Selected language.
    pub language: LanguageFilter,
}

impl SessionFilters {
    /// Build filters from setup-screen selections.
    pub fn new<I, S>(domains: I, language: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DomainLabel>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
            language: LanguageFilter::parse(language),
        }
    }

    /// Case-insensitive domain membership; no selection matches all.
    pub fn matches_domain(&self, domain: &str) -> bool {
        self.domains.is_empty()
            || self
                .domains
                .iter()
                .any(|selected| selected.trim().to_lowercase() == domain.to_lowercase())
    }

    /// Whether `item` passes both filters.
    pub fn matches(&self, item: &Item) -> bool {
        self.matches_domain(&item.domain) && self.language.matches(&item.language)
    }
}

/// Items passing `filters` that this rater has not annotated and nobody has completed.
pub fn compute_available(
    working_set: &[Item],
    filters: &SessionFilters,
    annotated: &HashSet<ItemId>,
    completed: &HashSet<ItemId>,
) -> Vec<Item> {
    working_set
        .iter()
        .filter(|item| filters.matches(item))
        .filter(|item| !annotated.contains(&item.id) && !completed.contains(&item.id))
        .cloned()
        .collect()
}

/// Distinct non-empty domains among items not yet completed, sorted.
pub fn domain_options(working_set: &[Item], completed: &HashSet<ItemId>) -> Vec<DomainLabel> {
    working_set
        .iter()
        .filter(|item| !completed.contains(&item.id))
        .map(|item| item.domain.clone())
        .filter(|domain| !domain.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Display label for a domain on the setup screen.
pub fn domain_label(domain: &str) -> &str {
    match domain {
        "General Knowledge" => "Conhecimento Geral",
        "Technical" => "Técnico (Programação)",
        "Creative" => "Criatividade",
        other => other,
    }
}

/// Language select options as `(value, label)`; the first is preselected.
pub fn language_options() -> [(&'static str, &'static str); 3] {
    [
        (DEFAULT_LANGUAGE_FILTER, "Português"),
        ("en", "Inglês"),
        (ANY_LANGUAGE, "Ambos"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, domain: &str, language: &str) -> Item {
        Item {
            id: id.to_string(),
            base_id: id.split('_').next().unwrap().to_string(),
            prompt: "prompt".into(),
            response_a: "a".into(),
            response_b: "b".into(),
            domain: domain.into(),
            language: language.into(),
            prior_human_count: 0,
        }
    }

    fn working_set() -> Vec<Item> {
        vec![
            item("q1_minimum_1", "Technical", "en"),
            item("q2_minimum_1", "Creative", "pt-BR"),
            item("q3_minimum_1", "technical", "PT"),
            item("q4_minimum_1", "General Knowledge", "es"),
        ]
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn any_language_matches_every_tag() {
        let filters = SessionFilters::new(Vec::<String>::new(), "todos");
        let available =
            compute_available(&working_set(), &filters, &HashSet::new(), &HashSet::new());
        assert_eq!(available.len(), 4);
        assert!(LanguageFilter::parse("TODOS").matches("zz-Unknown"));
    }

    #[test]
    fn language_matches_on_base_subtag_prefix() {
        let filters = SessionFilters::new(Vec::<String>::new(), "pt-br");
        let available =
            compute_available(&working_set(), &filters, &HashSet::new(), &HashSet::new());
        assert_eq!(ids(&available), vec!["q2_minimum_1", "q3_minimum_1"]);
    }

    #[test]
    fn domains_match_case_insensitively() {
        let filters = SessionFilters::new(["TECHNICAL"], "todos");
        let available =
            compute_available(&working_set(), &filters, &HashSet::new(), &HashSet::new());
        assert_eq!(ids(&available), vec!["q1_minimum_1", "q3_minimum_1"]);
    }

    #[test]
    fn annotated_and_completed_items_are_excluded() {
        let filters = SessionFilters::new(Vec::<String>::new(), "todos");
        let annotated: HashSet<ItemId> = ["q1_minimum_1".to_string()].into();
        let completed: HashSet<ItemId> = ["q4_minimum_1".to_string()].into();
        let available = compute_available(&working_set(), &filters, &annotated, &completed);
        assert_eq!(ids(&available), vec!["q2_minimum_1", "q3_minimum_1"]);
    }

    #[test]
    fn domain_options_skip_completed_and_sort() {
        let completed: HashSet<ItemId> = ["q4_minimum_1".to_string()].into();
        let options = domain_options(&working_set(), &completed);
        assert_eq!(options, vec!["Creative", "Technical", "technical"]);
        assert_eq!(domain_label("Technical"), "Técnico (Programação)");
        assert_eq!(domain_label("Legal"), "Legal");
    }

    #[test]
    fn default_language_is_portuguese() {
        assert_eq!(SessionFilters::default().language.as_str(), "pt-br");
        assert_eq!(language_options()[0].0, "pt-br");
        assert_eq!(LanguageFilter::parse(" "), LanguageFilter::Any);
    }
}
