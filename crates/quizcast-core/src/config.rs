//! Quizcast configuration system.
//!
//! Loaded from TOML, then overlaid with environment variables so credentials
//! never have to live in the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QuizError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub recipients: Vec<RecipientConfig>,
}

impl QuizConfig {
    /// Load config from the default path (~/.quizcast/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::warn!("📄 No config at {}, using defaults and environment", path.display());
            Ok(Self::default().with_env())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QuizError::Config(format!("Failed to read config {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse config from a TOML string and apply environment overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| QuizError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config.with_env())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Quizcast home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quizcast")
    }

    /// Overlay environment variables on top of file values.
    pub fn with_env(mut self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok());
        self
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("QUIZCAST_SHEET_ID").filter(|v| !v.is_empty()) {
            self.sheets.sheet_id = v;
        }
        if let Some(v) = lookup("QUIZCAST_GOOGLE_CREDENTIAL_PATH").filter(|v| !v.is_empty()) {
            self.sheets.credential_path = v;
        }
        if let Some(v) = lookup("QUIZCAST_DB_PATH").filter(|v| !v.is_empty()) {
            self.store.path = v;
        }
        for recipient in self.recipients.iter_mut() {
            recipient.apply_env_from(&lookup);
        }
    }

    /// Fail fast on settings the process cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.sheets.sheet_id.is_empty() {
            return Err(QuizError::config("sheets.sheet_id is not set (or QUIZCAST_SHEET_ID)"));
        }
        if self.sheets.credential_path.is_empty() {
            return Err(QuizError::config(
                "sheets.credential_path is not set (or QUIZCAST_GOOGLE_CREDENTIAL_PATH)",
            ));
        }
        self.schedule.validate()?;
        if self.http.delivery_concurrency == 0 {
            return Err(QuizError::config("http.delivery_concurrency must be at least 1"));
        }
        let mut seen = std::collections::HashSet::new();
        for recipient in &self.recipients {
            if recipient.name.is_empty() {
                return Err(QuizError::config("recipient with empty name"));
            }
            if !seen.insert(recipient.name.to_lowercase()) {
                return Err(QuizError::Config(format!("duplicate recipient '{}'", recipient.name)));
            }
        }
        Ok(())
    }

    /// Find a recipient by its webhook path name (case-insensitive).
    pub fn recipient(&self, name: &str) -> Option<&RecipientConfig> {
        self.recipients
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Answer page the problem card links to. No button when empty.
    #[serde(default)]
    pub liff_url: String,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8080 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            liff_url: String::new(),
        }
    }
}

/// When the three recurring jobs fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Offset from UTC the trigger hours are expressed in.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Deadline for a single job execution.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    #[serde(default)]
    pub refresh_catalog_at: u32,
    #[serde(default = "default_push_problem_at")]
    pub push_problem_at: u32,
    #[serde(default = "default_push_editorial_at")]
    pub push_editorial_at: u32,
    #[serde(default = "bool_true")]
    pub weekdays_only: bool,
}

fn bool_true() -> bool { true }
fn default_utc_offset() -> i32 { 9 }
fn default_workers() -> usize { 1 }
fn default_job_timeout() -> u64 { 300 }
fn default_push_problem_at() -> u32 { 9 }
fn default_push_editorial_at() -> u32 { 19 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
            workers: default_workers(),
            job_timeout_secs: default_job_timeout(),
            refresh_catalog_at: 0,
            push_problem_at: default_push_problem_at(),
            push_editorial_at: default_push_editorial_at(),
            weekdays_only: true,
        }
    }
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        for (name, hour) in [
            ("refresh_catalog_at", self.refresh_catalog_at),
            ("push_problem_at", self.push_problem_at),
            ("push_editorial_at", self.push_editorial_at),
        ] {
            if hour > 23 {
                return Err(QuizError::Config(format!("schedule.{name} must be in 0..=23, got {hour}")));
            }
        }
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(QuizError::Config(format!(
                "schedule.utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        if self.workers == 0 {
            return Err(QuizError::config("schedule.workers must be at least 1"));
        }
        Ok(())
    }
}

/// Google Sheets data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub sheet_id: String,
    /// Path to the service-account JSON key.
    #[serde(default)]
    pub credential_path: String,
    #[serde(default = "default_problem_range")]
    pub problem_range: String,
    #[serde(default = "default_catalog_range")]
    pub catalog_range: String,
    #[serde(default = "default_sheets_api")]
    pub api_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_problem_range() -> String { "問題!A1:N500".into() }
fn default_catalog_range() -> String { "地図!A1:D500".into() }
fn default_sheets_api() -> String { "https://sheets.googleapis.com/v4".into() }
fn default_token_url() -> String { "https://oauth2.googleapis.com/token".into() }

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            credential_path: String::new(),
            problem_range: default_problem_range(),
            catalog_range: default_catalog_range(),
            api_base: default_sheets_api(),
            token_url: default_token_url(),
        }
    }
}

/// SQLite durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.quizcast/quizcast.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Outbound HTTP limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Upper bound on bytes read while probing image dimensions.
    #[serde(default = "default_probe_bytes")]
    pub image_probe_max_bytes: usize,
    /// Parallel deliveries during a broadcast fan-out.
    #[serde(default = "default_delivery_concurrency")]
    pub delivery_concurrency: usize,
}

fn default_request_timeout() -> u64 { 10 }
fn default_probe_bytes() -> usize { 1024 * 1024 }
fn default_delivery_concurrency() -> usize { 4 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            image_probe_max_bytes: default_probe_bytes(),
            delivery_concurrency: default_delivery_concurrency(),
        }
    }
}

/// Locale strings used when rendering results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_separator")]
    pub name_separator: String,
    /// `{n}` is replaced with the number of respondents not shown. A space
    /// separates it from the names when any are listed.
    #[serde(default = "default_more_suffix")]
    pub more_suffix: String,
    #[serde(default = "default_no_respondents")]
    pub no_respondents: String,
    /// Name shown next to comments from hidden users.
    #[serde(default = "default_anonymous")]
    pub anonymous: String,
    #[serde(default = "default_problem_alt")]
    pub problem_alt_text: String,
    #[serde(default = "default_editorial_alt")]
    pub editorial_alt_text: String,
}

fn default_separator() -> String { "、".into() }
fn default_more_suffix() -> String { "ほか{n}人".into() }
fn default_no_respondents() -> String { "回答者なし".into() }
fn default_anonymous() -> String { "匿名".into() }
fn default_problem_alt() -> String { "今日の1レッグ".into() }
fn default_editorial_alt() -> String { "今日の1レッグ（解説）".into() }

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            name_separator: default_separator(),
            more_suffix: default_more_suffix(),
            no_respondents: default_no_respondents(),
            anonymous: default_anonymous(),
            problem_alt_text: default_problem_alt(),
            editorial_alt_text: default_editorial_alt(),
        }
    }
}

/// Webhook text command switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Allow group members to force a problem/editorial push by text.
    #[serde(default = "bool_true")]
    pub allow_manual_trigger: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self { allow_manual_trigger: true }
    }
}

/// One audience channel: a bot credential plus the group it pushes to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecipientConfig {
    pub name: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default)]
    pub group_id: String,
}

impl RecipientConfig {
    pub fn new(name: &str, access_token: &str, group_id: &str) -> Self {
        Self {
            name: name.to_string(),
            access_token: access_token.to_string(),
            channel_secret: String::new(),
            group_id: group_id.to_string(),
        }
    }

    /// Both a credential and a destination are present.
    pub fn is_deliverable(&self) -> bool {
        !self.access_token.is_empty() && !self.group_id.is_empty()
    }

    fn env_prefix(&self) -> String {
        self.name.to_uppercase().replace('-', "_")
    }

    fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        let prefix = self.env_prefix();
        if let Some(v) = lookup(&format!("{prefix}_ACCESS_TOKEN")).filter(|v| !v.is_empty()) {
            self.access_token = v;
        }
        if let Some(v) = lookup(&format!("{prefix}_SECRET")).filter(|v| !v.is_empty()) {
            self.channel_secret = v;
        }
        if let Some(v) = lookup(&format!("{prefix}_GROUP_ID")).filter(|v| !v.is_empty()) {
            self.group_id = v;
        }
    }
}
