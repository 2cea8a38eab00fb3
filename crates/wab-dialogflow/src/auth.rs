//! OAuth2 access tokens for the Dialogflow API
//!
//! A service account key is exchanged for a bearer token with the JWT
//! bearer grant (RFC 7523). The token is cached and refreshed shortly
//! before it expires.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DialogflowError, Result};

/// Scopes requested for the detectIntent call
pub const DIALOGFLOW_SCOPES: &str =
    "https://www.googleapis.com/auth/cloud-platform https://www.googleapis.com/auth/dialogflow";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Source of bearer tokens for outgoing API calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid access token
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for externally minted tokens and tests
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Google service account key file (the JSON downloaded from the console)
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Read a key file from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DialogflowError::Credentials(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse the JSON contents of a key file
    pub fn from_json(content: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(content)
            .map_err(|e| DialogflowError::Credentials(format!("Malformed key file: {}", e)))?;

        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(DialogflowError::Credentials(
                "client_email and private_key are required".to_string(),
            ));
        }
        Ok(key)
    }
}

/// JWT claims for the token request
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
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
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Mints access tokens from a service account key
pub struct ServiceAccountTokenProvider {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Create a provider for the given key
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DialogflowError::Credentials(format!("Invalid private key: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        info!("Using service account {}", key.client_email);

        Ok(Self {
            client,
            key,
            encoding_key,
            scopes: DIALOGFLOW_SCOPES.to_string(),
            cache: Mutex::new(None),
        })
    }

    /// Load the key file and create a provider
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(ServiceAccountKey::from_file(path)?)
    }

    /// Override the requested scopes
    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scopes.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| DialogflowError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        debug!("Requesting access token from {}", self.key.token_uri);

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Token endpoint error: {} - {}", status, body);
            return Err(DialogflowError::Auth(format!("{}: {}", status, body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| DialogflowError::Auth(format!("Failed to parse token response: {}", e)))?;

        let expires_at = chrono::Duration::try_seconds(parsed.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                DialogflowError::Auth(format!("Invalid expires_in: {}", parsed.expires_in))
            })?;

        Ok(CachedToken {
            token: parsed.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        debug!("Access token refreshed, expires at {}", fresh.expires_at);
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY_JSON: &str = include_str!("../testdata/service-account.json");
    const PUBLIC_KEY: &str = include_str!("../testdata/service-account.pub.pem");

    fn key_for(server: &MockServer) -> ServiceAccountKey {
        let mut key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        key.token_uri = format!("{}/token", server.uri());
        key
    }

    fn form_value<'a>(body: &'a str, name: &str) -> Option<&'a str> {
        body.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == name).then_some(v)
        })
    }

    #[test]
    fn test_parse_key_file() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        assert_eq!(key.client_email, "bridge@test-agent.iam.gserviceaccount.com");
        assert_eq!(key.private_key_id.as_deref(), Some("test-key-id"));
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert!(!format!("{:?}", key).contains("BEGIN PRIVATE KEY"));
    }

    #[test]
    fn test_token_uri_defaults() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "a@b.iam.gserviceaccount.com", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_malformed_key_file() {
        let err = ServiceAccountKey::from_json("{not json").unwrap_err();
        assert!(matches!(err, DialogflowError::Credentials(_)));

        let err = ServiceAccountKey::from_json(r#"{"client_email": "", "private_key": ""}"#)
            .unwrap_err();
        assert!(matches!(err, DialogflowError::Credentials(_)));
    }

    #[test]
    fn test_missing_key_file() {
        let err = ServiceAccountKey::from_file("/nonexistent/key.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_invalid_private_key() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "a@b.iam.gserviceaccount.com", "private_key": "not a pem"}"#,
        )
        .unwrap();
        let err = ServiceAccountTokenProvider::new(key).err().unwrap();
        assert!(matches!(err, DialogflowError::Credentials(_)));
    }

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider::new("ya29.static");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn test_token_exchange_and_cache() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ServiceAccountTokenProvider::new(key_for(&server)).unwrap();

        assert_eq!(provider.access_token().await.unwrap(), "ya29.fresh");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.fresh");

        // The assertion must be an RS256 JWT for this service account
        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let assertion = form_value(&body, "assertion").unwrap();

        let token_uri = format!("{}/token", server.uri());
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_uri.as_str()]);
        let decoded = decode::<AssertionClaims>(
            assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.header.kid.as_deref(), Some("test-key-id"));
        assert_eq!(decoded.claims.iss, "bridge@test-agent.iam.gserviceaccount.com");
        assert_eq!(decoded.claims.scope, DIALOGFLOW_SCOPES);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refetched() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.short",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = ServiceAccountTokenProvider::new(key_for(&server)).unwrap();
        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_expires_in() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.forever",
                "expires_in": i64::MAX
            })))
            .mount(&server)
            .await;

        let provider = ServiceAccountTokenProvider::new(key_for(&server)).unwrap();
        let err = provider.access_token().await.unwrap_err();

        assert!(matches!(err, DialogflowError::Auth(_)));
        assert!(err.to_string().contains("expires_in"));
    }

    #[tokio::test]
    async fn test_token_endpoint_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        let provider = ServiceAccountTokenProvider::new(key_for(&server)).unwrap();
        let err = provider.access_token().await.unwrap_err();

        assert!(matches!(err, DialogflowError::Auth(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }
}
