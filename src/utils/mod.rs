//! Shared utilities.

mod text;

pub use text::{collapse_whitespace, html_to_text};
