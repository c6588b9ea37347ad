use std::fs;
use std::path::Path;

use crate::errors::AnnotateError;

const UTF8_BOM: char = '\u{feff}';

/// Read a local table file as UTF-8 text with any leading byte-order mark removed.
pub fn read_table_text(table: &str, path: &Path) -> Result<String, AnnotateError> {
    let raw = fs::read_to_string(path).map_err(|err| AnnotateError::Load {
        table: table.to_string(),
        reason: format!("failed reading {}: {err}", path.display()),
    })?;
    Ok(strip_bom(&raw).to_string())
}

/// Drop a leading UTF-8 byte-order mark.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}
