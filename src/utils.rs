//! Language-tag and id-token helpers shared by the joiner and the sampler.

use crate::constants::join::{ID_SEPARATOR, REGION_SEPARATOR};

/// Return the trimmed value, or `None` when it is empty or whitespace.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Base subtag of a language tag, lowercased (`pt-BR` -> `pt`).
pub fn base_language(tag: &str) -> String {
    tag.trim()
        .split(REGION_SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Portion of an evaluation id before its first separator (`q1_minimum_1` -> `q1`).
pub fn base_id_of(evaluation_id: &str) -> &str {
    evaluation_id
        .split(ID_SEPARATOR)
        .next()
        .unwrap_or(evaluation_id)
}

/// Lowercased tokens of an evaluation id.
pub fn id_tokens(evaluation_id: &str) -> impl Iterator<Item = String> + '_ {
    evaluation_id
        .split(ID_SEPARATOR)
        .map(|token| token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_language_drops_region_and_case() {
        assert_eq!(base_language("pt-BR"), "pt");
        assert_eq!(base_language("EN"), "en");
        assert_eq!(base_language(" en-us "), "en");
        assert_eq!(base_language(""), "");
    }

    #[test]
    fn base_id_truncates_at_first_separator() {
        assert_eq!(base_id_of("q1_minimum_1"), "q1");
        assert_eq!(base_id_of("plain"), "plain");
        assert_eq!(base_id_of("_leading"), "");
    }

    #[test]
    fn non_blank_filters_whitespace() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" pt-BR ")), Some("pt-BR"));
    }

    #[test]
    fn id_tokens_are_lowercased() {
        let tokens: Vec<String> = id_tokens("Q1_Detailed_X").collect();
        assert_eq!(tokens, vec!["q1", "detailed", "x"]);
    }
}
