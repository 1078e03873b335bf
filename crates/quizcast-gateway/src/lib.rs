//! # Quizcast Gateway
//!
//! Axum router in front of the quiz controller:
//!
//! - `POST /webhook/{bot_name}`: LINE events, text commands
//! - `GET  /liff/problem`, `GET /liff/problems/{id}`: answer page data
//! - `POST /liff`: answer submission
//! - `GET  /health`

pub mod commands;
pub mod routes;
pub mod server;

pub use commands::Command;
pub use server::{AppState, build_router, start};
