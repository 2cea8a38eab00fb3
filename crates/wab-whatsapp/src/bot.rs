//! WhatsApp bot wrapper

use std::sync::Arc;

use wab_core::Config;
use wab_dialogflow::{DialogflowClient, IntentDetector};

use crate::error::Result;
use crate::webhook::{WebhookServer, WebhookState};

/// WhatsApp bot wrapper
pub struct WhatsAppBot {
    config: Config,
    detector: Arc<dyn IntentDetector>,
}

impl WhatsAppBot {
    /// Create a bot backed by the configured Dialogflow agent
    pub fn new(config: Config) -> Result<Self> {
        let client = DialogflowClient::new(&config.dialogflow)?;
        Ok(Self::with_detector(config, Arc::new(client)))
    }

    /// Create a bot with a custom intent detector
    pub fn with_detector(config: Config, detector: Arc<dyn IntentDetector>) -> Self {
        Self { config, detector }
    }

    /// Listen address, `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }

    /// Build the webhook server without starting it
    pub fn server(&self) -> WebhookServer {
        let state = WebhookState {
            detector: Arc::clone(&self.detector),
            project_id: self.config.dialogflow.project_id.clone(),
            language_code: self.config.dialogflow.language_code.clone(),
            twilio: self.config.twilio.clone(),
        };

        WebhookServer::new(self.addr(), self.config.server.webhook_path.clone(), state)
    }

    /// Start the bot (webhook server)
    pub async fn start(self) -> Result<()> {
        self.server().start().await
    }
}
