use std::path::PathBuf;

use tracing::debug;

use crate::data::Row;
use crate::errors::AnnotateError;
use crate::source::{TableSource, parse_table};
use crate::transport::fs::read_table_text;
use crate::types::TableId;

/// Table read from a delimited-text file on disk.
pub struct FileTable {
    id: TableId,
    path: PathBuf,
}

impl FileTable {
    /// Create a file-backed table.
    pub fn new(id: impl Into<TableId>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

impl TableSource for FileTable {
    fn id(&self) -> &str {
        &self.id
    }

    fn load_table(&self) -> Result<Vec<Row>, AnnotateError> {
        let text = read_table_text(&self.id, &self.path)?;
        let rows = parse_table(&self.id, &text)?;
        debug!(
            table = %self.id,
            path = %self.path.display(),
            rows = rows.len(),
            "[annotator:source] file table loaded"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_rows_from_disk() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("prompts.csv");
        std::fs::write(&path, "question_id,prompt_minimum_en\nq1,Hello?\nq2,Why?\n").unwrap();

        let rows = FileTable::new("questions", &path).load_table().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["prompt_minimum_en"], "Why?");
    }
}
