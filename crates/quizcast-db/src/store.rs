//! Quizcast SQLite database.
//!
//! Problems are written once when broadcast, answers once when their cycle is
//! tabulated. Users are created on first submission and only ever merged.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use quizcast_core::error::{QuizError, Result};
use quizcast_core::traits::QuizStore;
use quizcast_core::types::{Answer, Problem, User, UserFields};
use rusqlite::{Connection, OptionalExtension, params};

pub struct QuizDb {
    conn: Mutex<Connection>,
}

impl QuizDb {
    /// Open or create the database. Use ":memory:" for a throwaway store.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && path != Path::new(":memory:") {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| QuizError::Store(format!("open error: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        tracing::info!("🗄️ Quiz store ready at {}", path.display());
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| QuizError::Store(format!("Lock: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS problems (
                id TEXT PRIMARY KEY,
                source_index INTEGER NOT NULL,
                text TEXT DEFAULT '',
                original_image_url TEXT DEFAULT '',
                problem_image_url TEXT DEFAULT '',
                editorial_image_url TEXT DEFAULT '',
                setter TEXT DEFAULT '',
                difficulty INTEGER DEFAULT 0,
                options_json TEXT DEFAULT '[]',
                editorial TEXT DEFAULT '',
                note TEXT DEFAULT '',
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                problem_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                user_name TEXT DEFAULT '',
                user_group_id TEXT DEFAULT '',
                option_index INTEGER NOT NULL,
                comment TEXT DEFAULT '',
                created_at TEXT DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_answers_problem ON answers(problem_id);

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT DEFAULT '',
                group_id TEXT DEFAULT '',
                is_hidden INTEGER DEFAULT 0,
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now'))
            );
            ",
        )
        .map_err(|e| QuizError::Store(format!("Migration error: {e}")))?;
        Ok(())
    }

    pub fn insert_problem(&self, problem: &Problem) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let options = serde_json::to_string(&problem.options)?;
        self.conn()?
            .execute(
                "INSERT INTO problems (id, source_index, text, original_image_url, problem_image_url,
                    editorial_image_url, setter, difficulty, options_json, editorial, note)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id,
                    problem.index,
                    problem.text,
                    problem.original_image_url,
                    problem.problem_image_url,
                    problem.editorial_image_url,
                    problem.setter,
                    problem.difficulty,
                    options,
                    problem.editorial,
                    problem.note
                ],
            )
            .map_err(|e| QuizError::Store(format!("insert problem {}: {e}", problem.index)))?;
        Ok(id)
    }

    pub fn insert_answer(&self, answer: &Answer) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn()?
            .execute(
                "INSERT INTO answers (id, problem_id, user_id, user_name, user_group_id, option_index, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    answer.problem_id,
                    answer.user_id,
                    answer.user_name,
                    answer.user_group_id,
                    answer.option as i64,
                    answer.comment
                ],
            )
            .map_err(|e| QuizError::Store(format!("insert answer for {}: {e}", answer.user_id)))?;
        Ok(id)
    }

    pub fn upsert_user_sync(&self, id: &str, fields: &UserFields, merge_only: bool) -> Result<()> {
        let conn = self.conn()?;
        let sql = if merge_only {
            "INSERT INTO users (id, name, group_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, group_id = excluded.group_id,
                updated_at = datetime('now')"
        } else {
            "INSERT INTO users (id, name, group_id, is_hidden) VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, group_id = excluded.group_id,
                is_hidden = 0, updated_at = datetime('now')"
        };
        conn.execute(sql, params![id, fields.name, fields.group_id])
            .map_err(|e| QuizError::Store(format!("upsert user {id}: {e}")))?;
        Ok(())
    }

    pub fn get_user_sync(&self, id: &str) -> Result<Option<User>> {
        self.conn()?
            .query_row(
                "SELECT id, name, group_id, is_hidden FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        group_id: row.get(2)?,
                        is_hidden: row.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .optional()
            .map_err(|e| QuizError::Store(format!("get user {id}: {e}")))
    }

    pub fn set_user_hidden_sync(&self, id: &str, hidden: bool) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO users (id, is_hidden) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET is_hidden = excluded.is_hidden, updated_at = datetime('now')",
                params![id, hidden as i64],
            )
            .map_err(|e| QuizError::Store(format!("set hidden for {id}: {e}")))?;
        Ok(())
    }
}

/// A stored problem row, read back in tests.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemRecord {
    pub id: String,
    pub source_index: i64,
    pub text: String,
    pub options: Vec<String>,
    pub created_at: String,
}

#[cfg(test)]
impl QuizDb {
    pub fn get_problem(&self, id: &str) -> Result<Option<ProblemRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, source_index, text, options_json, created_at FROM problems WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| QuizError::Store(format!("get problem {id}: {e}")))?;

        Ok(row.map(|(id, source_index, text, options_json, created_at)| ProblemRecord {
            id,
            source_index,
            text,
            options: serde_json::from_str(&options_json).unwrap_or_default(),
            created_at,
        }))
    }

    /// Stored answers for one problem, oldest first.
    pub fn list_answers(&self, problem_id: &str) -> Result<Vec<Answer>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, problem_id, user_id, user_name, user_group_id, option_index, comment
                 FROM answers WHERE problem_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(|e| QuizError::Store(format!("list answers: {e}")))?;
        let answers = stmt
            .query_map(params![problem_id], |row| {
                Ok(Answer {
                    id: row.get(0)?,
                    problem_id: row.get(1)?,
                    user_id: row.get(2)?,
                    user_name: row.get(3)?,
                    user_group_id: row.get(4)?,
                    option: row.get::<_, i64>(5)?.max(0) as usize,
                    comment: row.get(6)?,
                })
            })
            .map_err(|e| QuizError::Store(format!("list answers: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(answers)
    }
}

#[async_trait]
impl QuizStore for QuizDb {
    async fn create_problem_record(&self, problem: &Problem) -> Result<String> {
        self.insert_problem(problem)
    }

    async fn create_answer_record(&self, answer: &Answer) -> Result<String> {
        self.insert_answer(answer)
    }

    async fn upsert_user(&self, id: &str, fields: &UserFields, merge_only: bool) -> Result<()> {
        self.upsert_user_sync(id, fields, merge_only)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.get_user_sync(id)
    }

    async fn set_user_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        self.set_user_hidden_sync(id, hidden)
    }
}
