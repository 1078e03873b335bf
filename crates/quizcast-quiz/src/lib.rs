//! # Quizcast Quiz
//!
//! The daily quiz cycle:
//!
//! ```text
//! Idle ──select──▶ Broadcasting ──▶ CollectingAnswers ──tabulate──▶ Tabulated
//!   ▲                                                                  │
//!   └──────────────────────────── next select ─────────────────────────┘
//! ```
//!
//! [`QuizController`] owns the state behind one async mutex; webhook and
//! submission handlers share it with the cron worker.

pub mod fanout;
pub mod jobs;
pub mod lifecycle;
pub mod probe;
pub mod state;
pub mod tabulate;

pub use fanout::{DeliveryOutcome, DeliveryReport};
pub use lifecycle::{Collaborators, CycleReport, QuizController};
pub use probe::HttpImageProbe;
pub use state::{CycleSnapshot, Phase, QuizState};
