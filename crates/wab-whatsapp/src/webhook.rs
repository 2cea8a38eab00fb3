//! Webhook server for receiving WhatsApp messages from Twilio

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use wab_core::TwilioConfig;
use wab_dialogflow::{IntentDetector, SessionPath};

use crate::error::{Result, WhatsAppError};
use crate::translate::translate_fulfillment;
use crate::twilio::{verify_signature, IncomingMessage, SIGNATURE_HEADER};
use crate::twiml::{MessagingResponse, APOLOGY_TEXT};

const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub detector: Arc<dyn IntentDetector>,
    pub project_id: String,
    pub language_code: String,
    pub twilio: TwilioConfig,
}

impl WebhookState {
    /// Validate `X-Twilio-Signature` when signature checking is configured
    fn check_signature(&self, headers: &HeaderMap, params: &[(String, String)]) -> Result<()> {
        let (Some(auth_token), Some(webhook_url)) =
            (self.twilio.auth_token.as_deref(), self.twilio.webhook_url.as_deref())
        else {
            return Ok(());
        };

        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(WhatsAppError::SignatureVerificationFailed)?;

        if verify_signature(auth_token, webhook_url, params, signature) {
            Ok(())
        } else {
            Err(WhatsAppError::SignatureVerificationFailed)
        }
    }
}

/// Webhook server
pub struct WebhookServer {
    addr: String,
    webhook_path: String,
    state: WebhookState,
}

impl WebhookServer {
    /// Create a new webhook server
    pub fn new(
        addr: impl Into<String>,
        webhook_path: impl Into<String>,
        state: WebhookState,
    ) -> Self {
        Self {
            addr: addr.into(),
            webhook_path: webhook_path.into(),
            state,
        }
    }

    /// Build the router (health check + webhook)
    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.webhook_path)
    }

    /// Start the webhook server
    pub async fn start(self) -> Result<()> {
        info!(
            "Starting WhatsApp webhook server on {}{}",
            self.addr, self.webhook_path
        );
        if self.state.twilio.signature_validation_enabled() {
            info!("Twilio signature validation enabled");
        } else {
            warn!("Twilio signature validation disabled (TWILIO_AUTH_TOKEN / TWILIO_WEBHOOK_URL not set)");
        }

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| WhatsAppError::Config(format!("Failed to bind {}: {}", self.addr, e)))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| WhatsAppError::Http(e.to_string()))?;

        Ok(())
    }
}

fn router(state: WebhookState, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(webhook_path, post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Handle incoming WhatsApp webhook
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    if let Err(e) = state.check_signature(&headers, &params) {
        warn!("Rejected webhook request: {}", e);
        return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
    }

    let msg = IncomingMessage::from_params(&params);

    match respond(&state, &msg).await {
        Ok(xml) => twiml(StatusCode::OK, xml),
        Err(e) => {
            error!("Dialogflow WhatsApp integration error: {}", e);
            match MessagingResponse::apology().to_xml() {
                Ok(xml) => twiml(StatusCode::INTERNAL_SERVER_ERROR, xml),
                Err(render_err) => {
                    error!("Failed to render apology: {}", render_err);
                    (StatusCode::INTERNAL_SERVER_ERROR, APOLOGY_TEXT).into_response()
                }
            }
        }
    }
}

async fn respond(state: &WebhookState, msg: &IncomingMessage) -> Result<String> {
    process_message(state, msg).await?.to_xml()
}

fn twiml(status: StatusCode, xml: String) -> Response {
    (status, [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)], xml).into_response()
}

/// Resolve one inbound message into the TwiML reply
pub async fn process_message(
    state: &WebhookState,
    msg: &IncomingMessage,
) -> Result<MessagingResponse> {
    // Whitespace-only bodies count as missing; Dialogflow gets the trimmed text
    let body = msg
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or(WhatsAppError::MissingBody)?;

    let from = msg
        .from
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or(WhatsAppError::MissingSender)?;

    info!("Received WhatsApp message from {}: {}", from, body);
    if msg.num_media > 0 {
        debug!("Ignoring {} media attachment(s) from {}", msg.num_media, from);
    }

    let session = SessionPath::new(&state.project_id, from);
    let result = state
        .detector
        .detect_intent(&session, body, &state.language_code)
        .await?;

    let parts = translate_fulfillment(&result.fulfillment_messages)?;
    debug!("Replying to {} with {} message(s)", from, parts.len());

    Ok(parts.into_iter().collect())
}
