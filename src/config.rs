use std::path::PathBuf;

use crate::constants::identity::{DEFAULT_STORE_DIR, DEFAULT_STORE_FILENAME};
use crate::constants::join::{DEFAULT_LANGUAGE, SATURATION_THRESHOLD};
use crate::constants::proxy::DEFAULT_PROXY_URL;
use crate::constants::sampler::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_PER_BASE_ID};
use crate::constants::tables::{DEFAULT_EVALUATIONS_URL, DEFAULT_QUESTIONS_URL};
use crate::errors::AnnotateError;

/// Top-level annotator configuration.
#[derive(Clone, Debug)]
pub struct AnnotatorConfig {
    /// URL or local path of the evaluations table.
    pub evaluations_source: String,
    /// URL or local path of the questions table.
    pub questions_source: String,
    /// Proxy endpoint used for both the completed-list GET and submission POST.
    pub proxy_url: String,
    /// Target number of items per batch.
    pub batch_size: usize,
    /// Items allowed per base id inside one batch.
    pub max_per_base_id: usize,
    /// Prior human judgment count at which rows are dropped during the join.
    ///
    /// `None` disables the gate and lets saturated rows reach raters.
    pub saturation_threshold: Option<u32>,
    /// Language assigned to evaluation rows with an empty language field.
    pub default_language: String,
    /// Location of the persisted identity store.
    pub store_path: PathBuf,
    /// Optional RNG seed for reproducible shuffles.
    pub seed: Option<u64>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            evaluations_source: DEFAULT_EVALUATIONS_URL.to_string(),
            questions_source: DEFAULT_QUESTIONS_URL.to_string(),
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_per_base_id: DEFAULT_MAX_PER_BASE_ID,
            saturation_threshold: Some(SATURATION_THRESHOLD),
            default_language: DEFAULT_LANGUAGE.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_DIR).join(DEFAULT_STORE_FILENAME),
            seed: None,
        }
    }
}

impl AnnotatorConfig {
    /// Reject settings that would make batch assembly meaningless.
    pub fn validate(&self) -> Result<(), AnnotateError> {
        if self.batch_size == 0 {
            return Err(AnnotateError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_per_base_id == 0 {
            return Err(AnnotateError::Configuration(
                "max_per_base_id must be at least 1".to_string(),
            ));
        }
        if self.default_language.trim().is_empty() {
            return Err(AnnotateError::Configuration(
                "default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_gated() {
        let config = AnnotatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_per_base_id, 1);
        assert_eq!(config.saturation_threshold, Some(3));
        assert_eq!(config.default_language, "en");
        assert!(config.store_path.ends_with("identity.bin"));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let config = AnnotatorConfig {
            batch_size: 0,
            ..AnnotatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnnotateError::Configuration(ref msg)) if msg.contains("batch_size")
        ));

        let config = AnnotatorConfig {
            max_per_base_id: 0,
            ..AnnotatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnnotateError::Configuration(ref msg)) if msg.contains("max_per_base_id")
        ));
    }
}
