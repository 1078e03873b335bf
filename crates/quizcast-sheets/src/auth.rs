//! Google service-account authentication.
//!
//! Signs an RS256 JWT assertion with the account's private key and trades it
//! for an OAuth access token at the token endpoint. Tokens are cached until a
//! minute before they expire.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use quizcast_core::error::{QuizError, Result};
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::Mutex;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Seconds of validity kept in reserve before a cached token is refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file that matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| QuizError::Config(format!("invalid service account credential: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuizError::Config(format!("cannot read credential {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Hands out bearer tokens for the Sheets API.
pub struct TokenProvider {
    client: reqwest::Client,
    email: String,
    signer: SigningKey<Sha256>,
    token_url: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client, account: &ServiceAccount, token_url: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(&account.private_key)
            .map_err(|e| QuizError::Config(format!("invalid service account private key: {e}")))?;
        // The key file's own token_uri wins over the configured default.
        let token_url = if account.token_uri.is_empty() {
            token_url.to_string()
        } else {
            account.token_uri.clone()
        };
        Ok(Self {
            client,
            email: account.client_email.clone(),
            signer: SigningKey::<Sha256>::new(key),
            token_url,
            scope: SHEETS_SCOPE.into(),
            cached: Mutex::new(None),
        })
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    /// Signed `header.claims.signature` assertion issued at `now`.
    pub fn assertion(&self, now: i64) -> Result<String> {
        let header = serde_json::json!({"alg": "RS256", "typ": "JWT"});
        let claims = serde_json::json!({
            "iss": self.email,
            "scope": self.scope,
            "aud": self.token_url,
            "iat": now,
            "exp": now + ASSERTION_LIFETIME_SECS,
        });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.signer.sign(signing_input.as_bytes()).to_bytes();
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// A valid access token, from cache when possible.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.assertion(now)?;
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QuizError::AuthFailed(format!("token request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QuizError::AuthFailed(format!("token endpoint returned {status}: {text}")));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| QuizError::AuthFailed(format!("token response: {e}")))?;

        tracing::debug!("🔑 Google access token refreshed, valid {}s", body.expires_in);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: now + body.expires_in,
        });
        Ok(body.access_token)
    }
}
