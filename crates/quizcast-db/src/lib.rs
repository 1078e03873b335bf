//! # Quizcast DB
//! SQLite persistence for broadcast problems, tabulated answers and user
//! profiles.

pub mod store;

pub use store::QuizDb;
