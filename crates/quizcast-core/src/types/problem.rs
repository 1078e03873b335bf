//! Problem: one quiz question with its options, media and editorial.

use serde::{Deserialize, Serialize};

/// A quiz problem as read from the source sheet and broadcast to groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// Assigned by the durable store at broadcast time; empty before that.
    #[serde(default)]
    pub id: String,
    /// Stable row index in the source sheet.
    pub index: i64,
    pub text: String,
    /// Primary image. Required for eligibility.
    pub original_image_url: String,
    pub problem_image_url: String,
    pub editorial_image_url: String,
    pub setter: String,
    pub difficulty: i64,
    /// Canonical option order; answers refer to positions in this list.
    pub options: Vec<String>,
    pub editorial: String,
    pub note: String,
    /// Already broadcast once, persisted back to the source.
    #[serde(skip)]
    pub has_broadcast: bool,
}

impl Problem {
    /// Eligible for automatic selection: has a primary image and was never broadcast.
    pub fn is_eligible(&self) -> bool {
        !self.original_image_url.is_empty() && !self.has_broadcast
    }

    /// Image shown with the question; falls back to the primary image.
    pub fn display_image_url(&self) -> &str {
        if self.problem_image_url.is_empty() {
            &self.original_image_url
        } else {
            &self.problem_image_url
        }
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}
