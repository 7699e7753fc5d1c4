use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Supplies bearer tokens for Sheets API calls
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for pre-issued credentials and tests
pub struct StaticToken(pub String);

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// The fields of a service account key file we need
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 JWT-bearer flow for a service account
pub struct ServiceAccountAuth {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    current_token: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Parse the key JSON (the `GOOGLE_SERVICE_ACCOUNT_JSON` value)
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).context("invalid service account JSON")?;
        Self::new(key)
    }

    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("invalid service account private key")?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            key,
            encoding_key,
            current_token: Mutex::new(None),
        })
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .context("failed to sign token request")
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Token request failed with status {}: {}", status, error_text));
        }

        let token: TokenResponse = response.json().await?;
        info!("🔑 Obtained Sheets access token for {}", self.key.client_email);

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait::async_trait]
impl TokenSource for ServiceAccountAuth {
    /// Cached token, refreshed when it is within a minute of expiry
    async fn access_token(&self) -> Result<String> {
        let mut current = self.current_token.lock().await;
        if let Some(token) = current.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
            debug!("Sheets access token expiring, refreshing");
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *current = Some(token);
        Ok(access_token)
    }
}
