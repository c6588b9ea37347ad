//! Table sources and delimited-text parsing.
//!
//! Ownership model:
//! - `TableSource` is the loader-facing interface that yields parsed rows.
//! - `parse_table` owns header handling so every source parses identically.
//! - `table_source` picks the transport from a URL or path reference.

use std::path::PathBuf;

use crate::data::Row;
use crate::errors::AnnotateError;
use crate::transport::fs::strip_bom;
use crate::transport::http::is_remote;
use crate::types::TableId;

/// Source implementation modules.
pub mod sources;

pub use sources::file_table::FileTable;
pub use sources::http_table::HttpTable;

/// Loader-facing tabular source.
pub trait TableSource: Send + Sync {
    /// Stable table identifier used in logs and load errors.
    fn id(&self) -> &str;
    /// Fetch and parse every data row.
    fn load_table(&self) -> Result<Vec<Row>, AnnotateError>;
}

/// Parse delimited text with a header row into header-keyed rows.
///
/// Rows may be shorter or longer than the header; missing cells are absent
/// from the row map and extra cells are ignored. Blank lines are skipped.
pub fn parse_table(table: &str, text: &str) -> Result<Vec<Row>, AnnotateError> {
    let load_err = |reason: String| AnnotateError::Load {
        table: table.to_string(),
        reason,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(strip_bom(text).as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| load_err(format!("malformed header row: {err}")))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Err(load_err("table has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|err| load_err(format!("malformed row {}: {err}", line + 1)))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), cell.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Build a source for `reference`: HTTP(S) URLs are fetched, anything else is read from disk.
pub fn table_source(id: impl Into<TableId>, reference: &str) -> Box<dyn TableSource> {
    if is_remote(reference) {
        Box::new(HttpTable::new(id, reference))
    } else {
        Box::new(FileTable::new(id, PathBuf::from(reference)))
    }
}

/// In-memory table for tests and preloaded data.
pub struct InMemoryTable {
    id: TableId,
    rows: Vec<Row>,
}

impl InMemoryTable {
    /// Create a table from prebuilt rows.
    pub fn new(id: impl Into<TableId>, rows: Vec<Row>) -> Self {
        Self {
            id: id.into(),
            rows,
        }
    }

    /// Create a table by parsing delimited text.
    pub fn from_text(id: impl Into<TableId>, text: &str) -> Result<Self, AnnotateError> {
        let id = id.into();
        let rows = parse_table(&id, text)?;
        Ok(Self { id, rows })
    }
}

impl TableSource for InMemoryTable {
    fn id(&self) -> &str {
        &self.id
    }

    fn load_table(&self) -> Result<Vec<Row>, AnnotateError> {
        Ok(self.rows.clone())
    }
}

/// Table whose loads always fail; stands in for an unreachable resource.
pub struct FailingTable {
    id: TableId,
    reason: String,
}

impl FailingTable {
    /// Create a table whose loads fail with `reason`.
    pub fn new(id: impl Into<TableId>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl TableSource for FailingTable {
    fn id(&self) -> &str {
        &self.id
    }

    fn load_table(&self) -> Result<Vec<Row>, AnnotateError> {
        Err(AnnotateError::Load {
            table: self.id.clone(),
            reason: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_cells_keep_commas_and_newlines() {
        let text =
            "question_id,evaluation_id,response_A\nq1,q1_minimum_1,\"line one,\nline two\"\n";
        let rows = parse_table("evaluations", text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["response_A"], "line one,\nline two");
        assert_eq!(rows[0]["evaluation_id"], "q1_minimum_1");
    }

    #[test]
    fn blank_lines_and_short_rows_are_tolerated() {
        let text = "\u{feff}question_id, prompt_minimum_en ,prompt_minimum_pt\nq1,Hi\n\n , , \nq2,Hey,Oi\n";
        let rows = parse_table("questions", text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].get("prompt_minimum_en").map(String::as_str),
            Some("Hi")
        );
        assert!(rows[0].get("prompt_minimum_pt").is_none());
        assert_eq!(rows[1]["prompt_minimum_pt"], "Oi");
    }

    #[test]
    fn empty_text_is_a_load_error() {
        let err = parse_table("questions", "").unwrap_err();
        assert!(matches!(err, AnnotateError::Load { ref reason, .. } if reason.contains("header")));
    }

    #[test]
    fn failing_table_reports_its_id() {
        let failing = FailingTable::new("questions", "boom");
        assert!(matches!(
            failing.load_table(),
            Err(AnnotateError::Load { ref table, .. }) if table == "questions"
        ));
    }

    #[test]
    fn table_source_picks_transport_by_reference() {
        assert_eq!(
            table_source("evaluations", "https://host/e.csv").id(),
            "evaluations"
        );
        assert_eq!(table_source("questions", "data/q.csv").id(), "questions");
    }
}
