/// Local file-backed table source.
pub mod file_table;
/// HTTP-backed table source.
pub mod http_table;
