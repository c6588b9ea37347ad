/// Unique item identifier, taken verbatim from the evaluation row.
/// Example: `q17_minimum_gpt4`
pub type ItemId = String;
/// Grouping key shared by every prompt variant of one underlying question.
/// Example: `q17`
pub type BaseId = String;
/// Join key shared by evaluation and question rows.
/// Example: `q17`
pub type QuestionId = String;
/// Opaque, durable rater identifier.
/// Example: `user-1739900000000-k3j9x0a1b`
pub type HumanId = String;
/// Domain category label as written in the evaluations table.
/// Examples: `Technical`, `General Knowledge`, `Creative`
pub type DomainLabel = String;
/// Language tag, possibly region-qualified.
/// Examples: `en`, `pt-BR`
pub type LanguageTag = String;
/// Header name in a delimited table.
/// Examples: `question_id`, `prompt_minimum_en`
pub type ColumnName = String;
/// Identifier of a table source used in logs and load errors.
/// Examples: `evaluations`, `questions`
pub type TableId = String;
