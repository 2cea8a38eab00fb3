//! Dialogflow ES detectIntent client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use wab_core::DialogflowConfig;

use crate::auth::{ServiceAccountTokenProvider, TokenProvider};
use crate::error::{DialogflowError, Result};
use crate::session::SessionPath;
use crate::types::{DetectIntentRequest, DetectIntentResponse, QueryResult};

/// Something that can resolve user text into an intent's fulfillment
#[async_trait]
pub trait IntentDetector: Send + Sync {
    /// Run a text query in the given session
    async fn detect_intent(
        &self,
        session: &SessionPath,
        text: &str,
        language_code: &str,
    ) -> Result<QueryResult>;
}

/// Dialogflow v2 REST client
#[derive(Clone)]
pub struct DialogflowClient {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl DialogflowClient {
    /// Create a client authenticated with the configured service account key
    pub fn new(config: &DialogflowConfig) -> Result<Self> {
        let tokens = ServiceAccountTokenProvider::from_file(&config.credentials_path)?;

        if let Some(key_project) = tokens.key().project_id.as_deref() {
            if key_project != config.project_id {
                warn!(
                    "Service account belongs to project {}, agent project is {}",
                    key_project, config.project_id
                );
            }
        }

        Self::with_token_provider(
            &config.api_base_url,
            Duration::from_secs(config.timeout_secs),
            Arc::new(tokens),
        )
    }

    /// Create a client with a custom endpoint and token source
    pub fn with_token_provider(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DialogflowError::Endpoint(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DialogflowError::Endpoint(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    /// `{base}/v2/projects/{project}/agent/sessions/{session}:detectIntent`
    fn detect_intent_url(&self, session: &SessionPath) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                DialogflowError::Endpoint(format!("{} cannot be used as a base URL", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["v2", "projects", session.project_id(), "agent", "sessions"])
                .push(&format!("{}:detectIntent", session.session_id()));
        }
        Ok(url)
    }
}

#[async_trait]
impl IntentDetector for DialogflowClient {
    async fn detect_intent(
        &self,
        session: &SessionPath,
        text: &str,
        language_code: &str,
    ) -> Result<QueryResult> {
        let url = self.detect_intent_url(session)?;
        let token = self.tokens.access_token().await?;

        debug!("Sending detectIntent request for {}", session);

        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&DetectIntentRequest::text(text, language_code))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Dialogflow API error: {} - {}", status, body);
            return Err(DialogflowError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectIntentResponse = serde_json::from_str(&body).map_err(|e| {
            DialogflowError::InvalidResponse(format!("Failed to parse response: {} - {}", e, body))
        })?;

        let result = parsed
            .query_result
            .ok_or_else(|| DialogflowError::InvalidResponse("missing queryResult".to_string()))?;

        info!(
            "Dialogflow intent={} confidence={:.2} messages={}",
            result
                .intent
                .as_ref()
                .and_then(|i| i.display_name.as_deref())
                .unwrap_or("<none>"),
            result.intent_detection_confidence.unwrap_or(0.0),
            result.fulfillment_messages.len()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use crate::types::FulfillmentMessage;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION_PATH: &str =
        "/v2/projects/test-agent/agent/sessions/whatsapp:+15551234567:detectIntent";

    fn client_for(server: &MockServer) -> DialogflowClient {
        DialogflowClient::with_token_provider(
            &server.uri(),
            Duration::from_secs(5),
            Arc::new(StaticTokenProvider::new("ya29.test")),
        )
        .unwrap()
    }

    fn session() -> SessionPath {
        SessionPath::new("test-agent", "whatsapp:+15551234567")
    }

    #[test]
    fn test_detect_intent_url() {
        let client = DialogflowClient::with_token_provider(
            "https://europe-west1-dialogflow.googleapis.com",
            Duration::from_secs(5),
            Arc::new(StaticTokenProvider::new("t")),
        )
        .unwrap();

        let url = client.detect_intent_url(&session()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://europe-west1-dialogflow.googleapis.com/v2/projects/test-agent/agent/sessions/whatsapp:+15551234567:detectIntent"
        );
    }

    #[test]
    fn test_session_segment_is_escaped() {
        let client = DialogflowClient::with_token_provider(
            "https://dialogflow.googleapis.com/",
            Duration::from_secs(5),
            Arc::new(StaticTokenProvider::new("t")),
        )
        .unwrap();

        let url = client
            .detect_intent_url(&SessionPath::new("p", "a/b c"))
            .unwrap();
        assert_eq!(
            url.path(),
            "/v2/projects/p/agent/sessions/a%2Fb%20c:detectIntent"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = DialogflowClient::with_token_provider(
            "not a url",
            Duration::from_secs(5),
            Arc::new(StaticTokenProvider::new("t")),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DialogflowError::Endpoint(_)));
    }

    #[tokio::test]
    async fn test_detect_intent_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .and(header("authorization", "Bearer ya29.test"))
            .and(body_json(json!({
                "queryInput": {"text": {"text": "send me a picture", "languageCode": "en-US"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseId": "r-1",
                "queryResult": {
                    "queryText": "send me a picture",
                    "fulfillmentMessages": [
                        {"text": {"text": ["Here it is"]}},
                        {"payload": {"mediaUrl": "https://example.com/a.png"}}
                    ],
                    "intent": {"displayName": "picture"},
                    "intentDetectionConfidence": 0.9
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .detect_intent(&session(), "send me a picture", "en-US")
            .await
            .unwrap();

        assert_eq!(result.fulfillment_messages.len(), 2);
        assert_eq!(
            result.fulfillment_messages[0],
            FulfillmentMessage::text("Here it is")
        );
        assert_eq!(
            result.fulfillment_messages[1],
            FulfillmentMessage::payload(json!({"mediaUrl": "https://example.com/a.png"}))
        );
    }

    #[tokio::test]
    async fn test_detect_intent_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .detect_intent(&session(), "hello", "en-US")
            .await
            .unwrap_err();

        match err {
            DialogflowError::Api { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "PERMISSION_DENIED");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_detect_intent_missing_query_result() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responseId": "r-2"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .detect_intent(&session(), "hello", "en-US")
            .await
            .unwrap_err();

        assert!(matches!(err, DialogflowError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_detect_intent_unparseable_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .detect_intent(&session(), "hello", "en-US")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to parse response"));
    }

    #[tokio::test]
    async fn test_detect_intent_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"queryResult": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = DialogflowClient::with_token_provider(
            &server.uri(),
            Duration::from_millis(50),
            Arc::new(StaticTokenProvider::new("ya29.test")),
        )
        .unwrap();

        let err = client
            .detect_intent(&session(), "hello", "en-US")
            .await
            .unwrap_err();

        assert!(matches!(err, DialogflowError::Http(_)));
    }

    #[test]
    fn test_new_with_missing_credentials() {
        let config = DialogflowConfig {
            project_id: "test-agent".to_string(),
            credentials_path: "/nonexistent/key.json".to_string(),
            ..Default::default()
        };

        let err = DialogflowClient::new(&config).err().unwrap();
        assert!(matches!(err, DialogflowError::Credentials(_)));
    }

    #[test]
    fn test_new_with_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.json");
        std::fs::write(&key_path, include_str!("../testdata/service-account.json")).unwrap();

        let config = DialogflowConfig {
            project_id: "test-agent".to_string(),
            credentials_path: key_path.to_string_lossy().into_owned(),
            ..Default::default()
        };

        assert!(DialogflowClient::new(&config).is_ok());
    }
}
