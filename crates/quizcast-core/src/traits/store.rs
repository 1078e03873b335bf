//! Durable store for problems, answers and users. Append/lookup only.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Answer, Problem, User, UserFields};

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Persist a broadcast problem and return its assigned ID.
    async fn create_problem_record(&self, problem: &Problem) -> Result<String>;

    /// Persist one answer and return its assigned ID.
    async fn create_answer_record(&self, answer: &Answer) -> Result<String>;

    /// Create the user if absent. With `merge_only` an existing record only
    /// receives the given profile fields; the privacy flag is never touched.
    async fn upsert_user(&self, id: &str, fields: &UserFields, merge_only: bool) -> Result<()>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Set the "hide my name" flag, creating a bare profile if needed.
    async fn set_user_hidden(&self, id: &str, hidden: bool) -> Result<()>;
}
