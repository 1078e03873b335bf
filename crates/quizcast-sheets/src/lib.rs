//! # Quizcast Sheets
//! Reads problems and the map catalog from a Google spreadsheet and writes
//! the broadcast flag back.
//!
//! Rows are mapped to domain types through a column binding table keyed by
//! the header text, so column order in the sheet does not matter.

pub mod auth;
pub mod binding;
pub mod source;

pub use auth::{ServiceAccount, TokenProvider};
pub use source::SheetsSource;
