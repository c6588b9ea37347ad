/// Constants used by the identity store and its persisted layout.
pub mod identity {
    /// Storage key holding the durable rater identifier.
    pub const HUMAN_ID_KEY: &[u8] = b"humanId";
    /// Storage key holding the JSON array of annotated item ids.
    pub const ANNOTATED_IDS_KEY: &[u8] = b"annotatedIds";
    /// Key prefix of single-id journal entries appended between compactions.
    pub const ANNOTATED_ENTRY_PREFIX: &[u8] = b"annotated:";
    /// Storage key holding the number of journal entries not yet folded into the array.
    pub const ANNOTATED_PENDING_KEY: &[u8] = b"annotatedPending";
    /// Prefix of generated rater identifiers.
    pub const HUMAN_ID_PREFIX: &str = "user";
    /// Number of base36 characters in the random identifier suffix.
    pub const HUMAN_ID_SUFFIX_LEN: usize = 9;
    /// Default directory for the persisted identity store.
    pub const DEFAULT_STORE_DIR: &str = ".annotator_store";
    /// Default filename for the persisted identity store.
    pub const DEFAULT_STORE_FILENAME: &str = "identity.bin";
    /// Version tag prepended to every persisted identity value.
    pub const IDENTITY_RECORD_VERSION: u8 = 1;
    /// Tombstone marker byte for cleared identity values.
    pub const IDENTITY_RECORD_TOMBSTONE: u8 = b'-';
}

/// Constants used when joining evaluation rows with question rows.
pub mod join {
    /// Separator between tokens of an evaluation id (for example `q1_minimum_1`).
    pub const ID_SEPARATOR: char = '_';
    /// Separator between a base language subtag and its region (for example `pt-BR`).
    pub const REGION_SEPARATOR: char = '-';
    /// Language assigned to evaluation rows with an empty language field.
    pub const DEFAULT_LANGUAGE: &str = "en";
    /// Prefix of prompt columns in the questions table.
    pub const PROMPT_COLUMN_PREFIX: &str = "prompt";
    /// Rows with this many prior human judgments (or more) never enter the working set.
    pub const SATURATION_THRESHOLD: u32 = 3;

    /// Join key column shared by both tables.
    pub const COL_QUESTION_ID: &str = "question_id";
    /// Evaluation id column.
    pub const COL_EVALUATION_ID: &str = "evaluation_id";
    /// First candidate response column.
    pub const COL_RESPONSE_A: &str = "response_A";
    /// Second candidate response column.
    pub const COL_RESPONSE_B: &str = "response_B";
    /// Domain label column.
    pub const COL_DOMAIN: &str = "domain";
    /// Language tag column.
    pub const COL_LANGUAGE: &str = "language";
    /// Optional prior human judgment count column.
    pub const COL_HUMAN_COUNT: &str = "human_count";
}

/// Constants used by filtering and batch assembly.
pub mod sampler {
    /// Items per annotation batch.
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    /// Items allowed per base id inside one batch.
    pub const DEFAULT_MAX_PER_BASE_ID: usize = 1;
    /// Language filter value that matches every item.
    pub const ANY_LANGUAGE: &str = "todos";
    /// Language preselected on the setup screen.
    pub const DEFAULT_LANGUAGE_FILTER: &str = "pt-br";
}

/// Constants used by the submission proxy and its clients.
pub mod proxy {
    /// Environment variable naming the backend the proxy forwards to.
    pub const BACKEND_URL_ENV: &str = "ANNOTATION_BACKEND_URL";
    /// Legacy environment variable accepted as a fallback backend URL.
    pub const LEGACY_BACKEND_URL_ENV: &str = "GOOGLE_SCRIPT_URL";
    /// Default proxy path served to the rater page.
    pub const DEFAULT_PROXY_URL: &str = "http://localhost:8888/.netlify/functions/submit-annotation";
    /// Error body returned when forwarding a submission fails.
    pub const SUBMIT_FAILED_MSG: &str = "Failed to submit annotation.";
    /// Error body returned when fetching the completed list fails.
    pub const FETCH_FAILED_MSG: &str = "Failed to fetch completed questions.";
    /// Body returned for unsupported methods.
    pub const METHOD_NOT_ALLOWED_MSG: &str = "Method Not Allowed";
}

/// Table identifiers used in logs and load errors.
pub mod tables {
    /// Evaluations table id.
    pub const EVALUATIONS: &str = "evaluations";
    /// Questions table id.
    pub const QUESTIONS: &str = "questions";
    /// Default evaluations table location.
    pub const DEFAULT_EVALUATIONS_URL: &str = "https://raw.githubusercontent.com/laysearaujo/cross-lingual-prompt-analysis/main/data/judged/sample_master_annotator_pool.csv";
    /// Default questions table location.
    pub const DEFAULT_QUESTIONS_URL: &str =
        "https://raw.githubusercontent.com/laysearaujo/cross-lingual-prompt-analysis/main/data/raw/prompts.csv";
}
