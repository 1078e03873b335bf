//! User profile: created lazily on first submission.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub group_id: String,
    /// Hide this user's name in aggregate results.
    pub is_hidden: bool,
}

/// Mutable profile fields written on submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFields {
    pub name: String,
    pub group_id: String,
}
