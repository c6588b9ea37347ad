use tracing::{debug, warn};

use crate::data::Row;
use crate::errors::AnnotateError;
use crate::source::{TableSource, parse_table};
use crate::transport::http::fetch_text;
use crate::types::TableId;

/// Table fetched over HTTP(S).
pub struct HttpTable {
    id: TableId,
    url: String,
}

impl HttpTable {
    /// Create a remote table fetched from `url`.
    pub fn new(id: impl Into<TableId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

impl TableSource for HttpTable {
    fn id(&self) -> &str {
        &self.id
    }

    fn load_table(&self) -> Result<Vec<Row>, AnnotateError> {
        let text = fetch_text(&self.url).map_err(|err| {
            warn!(table = %self.id, url = %self.url, error = %err, "[annotator:source] fetch failed");
            AnnotateError::Load {
                table: self.id.clone(),
                reason: format!("failed fetching {}: {err}", self.url),
            }
        })?;
        let rows = parse_table(&self.id, &text)?;
        debug!(
            table = %self.id,
            rows = rows.len(),
            "[annotator:source] remote table loaded"
        );
        Ok(rows)
    }
}
