/// Local filesystem reads.
pub mod fs;
/// Blocking HTTP helpers over `ureq`.
pub mod http;
