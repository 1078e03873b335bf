//! Reference catalog entries (orienteering maps).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub year: i32,
    /// Event / regulation tag used for filtering.
    pub event: String,
    pub url: String,
}

impl CatalogEntry {
    /// Empty tag matches everything.
    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        tag.is_empty() || self.event.contains(tag)
    }

    /// Three-line text rendering used in chat replies.
    pub fn to_reply_text(&self) -> String {
        [
            self.name.clone(),
            format!("{}年度 {}", self.year, self.event),
            self.url.clone(),
        ]
        .join("\n")
    }
}
