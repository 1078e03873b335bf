//! # Quizcast Core
//! Domain types, collaborator traits, configuration and errors shared by
//! every other Quizcast crate.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::QuizConfig;
pub use error::{QuizError, Result};
