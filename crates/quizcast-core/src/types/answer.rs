//! Answer: one user's choice for one problem.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Assigned by the durable store when the cycle is tabulated.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "problemID")]
    pub problem_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "userGroupID")]
    pub user_group_id: String,
    /// Index into the problem's option list.
    pub option: usize,
    #[serde(default)]
    pub comment: String,
}

impl Answer {
    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }
}
