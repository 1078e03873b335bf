//! Argument payloads for the two broadcast templates.
//!
//! The lifecycle builds these and hands them to the deliverer as JSON, so a
//! transport only has to agree on this shape, not on the controller's types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemCard {
    pub problem_id: String,
    pub image_url: String,
    /// "width:height", e.g. "4:3".
    pub image_aspect_ratio: String,
    pub text: String,
    pub setter: String,
    pub difficulty: i64,
    pub options: Vec<String>,
    /// Answer page link; no button when empty.
    pub liff_url: String,
}

/// One option's line in the editorial summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionResult {
    pub option: String,
    pub count: usize,
    /// Whole percent, rounded down.
    pub rate: usize,
    pub is_majority: bool,
    /// Rendered "who answered" line.
    pub respondents: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentLine {
    pub user_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorialCard {
    pub problem_id: String,
    pub image_url: String,
    pub image_aspect_ratio: String,
    pub text: String,
    pub editorial: String,
    pub total: usize,
    pub results: Vec<OptionResult>,
    pub comments: Vec<CommentLine>,
}
