//! # Quizcast Channels
//! LINE Messaging API: push delivery of flex cards, text replies, and
//! signed webhook parsing.

pub mod flex;
pub mod line;
pub mod webhook;

pub use line::LineClient;
