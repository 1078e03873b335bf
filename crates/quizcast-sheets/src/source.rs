//! Spreadsheet-backed `ProblemSource`.

use std::time::Duration;

use async_trait::async_trait;
use quizcast_core::config::{HttpConfig, SheetsConfig};
use quizcast_core::error::{QuizError, Result};
use quizcast_core::traits::ProblemSource;
use quizcast_core::types::{CatalogEntry, Problem};
use reqwest::Url;
use serde::Deserialize;

use crate::auth::{ServiceAccount, TokenProvider};
use crate::binding::{
    Binding, CATALOG_COLUMNS, PROBLEM_COLUMNS, ProblemField, column_letter,
};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Where an A1 range starts: "問題!B3:N500" → ("問題", column 1, row 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOrigin {
    pub sheet: String,
    pub column: usize,
    pub row: usize,
}

impl RangeOrigin {
    pub fn parse(range: &str) -> Result<Self> {
        let (sheet, cells) = range
            .split_once('!')
            .ok_or_else(|| QuizError::Config(format!("range '{range}' has no sheet name")))?;
        let start = cells.split(':').next().unwrap_or("");
        let letters: String = start.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let digits = &start[letters.len()..];
        if letters.is_empty() {
            return Err(QuizError::Config(format!("range '{range}' has no start column")));
        }

        let column = letters
            .to_ascii_uppercase()
            .bytes()
            .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
            - 1;
        let row = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| QuizError::Config(format!("range '{range}' has a bad start row")))?
        };
        Ok(Self {
            sheet: sheet.to_string(),
            column,
            row,
        })
    }

    /// A1 address of a cell given offsets from the origin.
    pub fn cell(&self, row_offset: usize, column_offset: usize) -> String {
        format!(
            "{}!{}{}",
            self.sheet,
            column_letter(self.column + column_offset),
            self.row + row_offset
        )
    }
}

pub struct SheetsSource {
    client: reqwest::Client,
    tokens: TokenProvider,
    api_base: String,
    sheet_id: String,
    problem_range: String,
    catalog_range: String,
}

impl SheetsSource {
    /// Build from config, reading the service-account key file.
    pub fn new(config: &SheetsConfig, http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .build()
            .map_err(|e| QuizError::Source(format!("sheets client: {e}")))?;
        let path = shellexpand::tilde(&config.credential_path).to_string();
        let account = ServiceAccount::from_file(std::path::Path::new(&path))?;
        let tokens = TokenProvider::new(client.clone(), &account, &config.token_url)?;
        Ok(Self::from_parts(client, tokens, config))
    }

    pub fn from_parts(client: reqwest::Client, tokens: TokenProvider, config: &SheetsConfig) -> Self {
        Self {
            client,
            tokens,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            sheet_id: config.sheet_id.clone(),
            problem_range: config.problem_range.clone(),
            catalog_range: config.catalog_range.clone(),
        }
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| QuizError::Config(format!("bad sheets api base '{}': {e}", self.api_base)))?;
        url.path_segments_mut()
            .map_err(|_| QuizError::Config(format!("bad sheets api base '{}'", self.api_base)))?
            .extend(["spreadsheets", self.sheet_id.as_str(), "values", range]);
        Ok(url)
    }

    /// Fetch a range as rows of cell text.
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.tokens.token().await?;
        let resp = self
            .client
            .get(self.values_url(range)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| QuizError::Source(format!("values.get {range}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QuizError::Source(format!("values.get {range} returned {status}: {text}")));
        }
        let body: ValueRange = resp
            .json()
            .await
            .map_err(|e| QuizError::Source(format!("values.get {range}: {e}")))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect())
    }

    async fn update_cell(&self, cell: &str, value: &str) -> Result<()> {
        let token = self.tokens.token().await?;
        let mut url = self.values_url(cell)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = serde_json::json!({
            "range": cell,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        let resp = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| QuizError::Source(format!("values.update {cell}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QuizError::Source(format!("values.update {cell} returned {status}: {text}")));
        }
        Ok(())
    }

    /// Every problem row with a primary image, broadcast or not.
    pub async fn read_problems(&self) -> Result<Vec<Problem>> {
        let rows = self.get_values(&self.problem_range).await?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        let binding = Binding::resolve(PROBLEM_COLUMNS, header);
        Ok(data.iter().filter_map(|row| binding.problem(row)).collect())
    }

    /// Check both sheets' headers against the binding tables.
    pub async fn validate_header(&self) -> Result<()> {
        for (range, is_problem) in [(&self.problem_range, true), (&self.catalog_range, false)] {
            let rows = self.get_values(range).await?;
            let header = rows.first().cloned().unwrap_or_default();
            let origin = RangeOrigin::parse(range)?;
            let missing = if is_problem {
                let binding = Binding::resolve(PROBLEM_COLUMNS, &header);
                binding.ensure_required(&origin.sheet)?;
                binding.missing_headers()
            } else {
                let binding = Binding::resolve(CATALOG_COLUMNS, &header);
                binding.ensure_required(&origin.sheet)?;
                binding.missing_headers()
            };
            if !missing.is_empty() {
                tracing::warn!(
                    "⚠️ Sheet '{}' lacks optional columns (read as empty): {}",
                    origin.sheet,
                    missing.join(", ")
                );
            }
        }
        tracing::info!("✅ Sheet headers match the column bindings");
        Ok(())
    }
}

#[async_trait]
impl ProblemSource for SheetsSource {
    async fn read_eligible_problems(&self) -> Result<Vec<Problem>> {
        let problems: Vec<Problem> = self
            .read_problems()
            .await?
            .into_iter()
            .filter(Problem::is_eligible)
            .collect();
        tracing::debug!("📋 {} eligible problems in sheet", problems.len());
        Ok(problems)
    }

    async fn mark_broadcast(&self, source_index: i64) -> Result<()> {
        let rows = self.get_values(&self.problem_range).await?;
        let Some((header, data)) = rows.split_first() else {
            return Err(QuizError::Source("problem sheet is empty".into()));
        };
        let binding = Binding::resolve(PROBLEM_COLUMNS, header);
        let flag_col = binding
            .position(ProblemField::Broadcast)
            .ok_or_else(|| QuizError::Source("problem sheet has no 出題済 column".into()))?;
        let row_offset = data
            .iter()
            .position(|row| {
                binding.cell(row, ProblemField::Index).parse::<i64>().ok() == Some(source_index)
            })
            .ok_or_else(|| QuizError::Source(format!("no problem row with 番号 {source_index}")))?;

        let origin = RangeOrigin::parse(&self.problem_range)?;
        // +1 skips the header row.
        let cell = origin.cell(row_offset + 1, flag_col);
        self.update_cell(&cell, "1").await?;
        tracing::info!("📝 Problem {source_index} marked broadcast at {cell}");
        Ok(())
    }

    async fn read_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let rows = self.get_values(&self.catalog_range).await?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        let binding = Binding::resolve(CATALOG_COLUMNS, header);
        Ok(data.iter().filter_map(|row| binding.entry(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::{test_account, test_key};
    use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source(server: &MockServer) -> SheetsSource {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(server)
            .await;

        let config = SheetsConfig {
            sheet_id: "sheet-1".into(),
            api_base: server.uri(),
            ..SheetsConfig::default()
        };
        let client = reqwest::Client::new();
        let tokens =
            TokenProvider::new(client.clone(), &test_account(&test_key()), &format!("{}/token", server.uri()))
                .unwrap();
        SheetsSource::from_parts(client, tokens, &config)
    }

    fn problem_values() -> serde_json::Value {
        serde_json::json!({
            "range": "問題!A1:N500",
            "majorDimension": "ROWS",
            "values": [
                ["番号", "元画像ID", "出題文", "選択肢1", "選択肢2", "出題済"],
                ["1", "img1", "first", "A", "B", "1"],
                ["2", "img2", "second", "A", "B"],
                ["3", "", "no image", "A", "B", "0"],
                ["4", "img4", "fourth", "A", "B", "0"]
            ]
        })
    }

    async fn mount_values(server: &MockServer, sheet_path: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path_regex(sheet_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_range_origin() {
        let origin = RangeOrigin::parse("問題!A1:N500").unwrap();
        assert_eq!(origin, RangeOrigin { sheet: "問題".into(), column: 0, row: 1 });
        assert_eq!(origin.cell(3, 5), "問題!F4");

        let shifted = RangeOrigin::parse("地図!B3:D9").unwrap();
        assert_eq!(shifted.cell(0, 0), "地図!B3");
        assert!(RangeOrigin::parse("A1:B2").is_err());
    }

    #[tokio::test]
    async fn test_read_eligible_problems() {
        let server = MockServer::start().await;
        mount_values(&server, "^/spreadsheets/sheet-1/values/", problem_values()).await;
        let source = source(&server).await;

        let problems = source.read_eligible_problems().await.unwrap();
        let indexes: Vec<i64> = problems.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![2, 4]);
        assert_eq!(problems[0].options, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_mark_broadcast_writes_flag_cell() {
        let server = MockServer::start().await;
        mount_values(&server, "^/spreadsheets/sheet-1/values/", problem_values()).await;
        Mock::given(method("PUT"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_partial_json(serde_json::json!({
                "range": "問題!F5",
                "values": [["1"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let source = source(&server).await;
        source.mark_broadcast(4).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_broadcast_unknown_index() {
        let server = MockServer::start().await;
        mount_values(&server, "^/spreadsheets/sheet-1/values/", problem_values()).await;
        let source = source(&server).await;
        assert!(matches!(source.mark_broadcast(99).await, Err(QuizError::Source(_))));
    }

    #[tokio::test]
    async fn test_read_catalog_and_errors() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "^/spreadsheets/sheet-1/values/",
            serde_json::json!({"values": [
                ["テレイン名", "年度", "イベント名", "URL"],
                ["Forest", 2019, "リレー", "https://map/1"],
                ["", "2020", "x", "y"]
            ]}),
        )
        .await;
        let source = source(&server).await;
        let catalog = source.read_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].year, 2019);

        let failing = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&failing)
            .await;
        let source = self::source(&failing).await;
        assert!(matches!(source.read_catalog().await, Err(QuizError::Source(_))));
    }

    #[tokio::test]
    async fn test_validate_header() {
        let server = MockServer::start().await;
        mount_values(&server, "^/spreadsheets/sheet-1/values/", serde_json::json!({"values": [["番号", "出題文"]]}))
            .await;
        let source = source(&server).await;
        let err = source.validate_header().await.unwrap_err();
        assert!(matches!(err, QuizError::Config(ref m) if m.contains("元画像ID")));
    }
}
