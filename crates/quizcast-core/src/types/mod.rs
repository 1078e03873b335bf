//! Core domain types.

pub mod answer;
pub mod card;
pub mod catalog;
pub mod event;
pub mod problem;
pub mod user;

pub use answer::Answer;
pub use card::{CommentLine, EditorialCard, OptionResult, ProblemCard};
pub use catalog::CatalogEntry;
pub use event::{EventSource, WebhookEvent, WebhookMessage};
pub use problem::Problem;
pub use user::{User, UserFields};
