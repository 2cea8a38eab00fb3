//! wab-whatsapp: WhatsApp channel for wa-bridge via Twilio
//!
//! Receives Twilio Messaging webhooks, asks Dialogflow for the reply and
//! answers with TwiML built from the intent's fulfillment messages.

pub mod bot;
pub mod error;
pub mod translate;
pub mod twilio;
pub mod twiml;
pub mod webhook;

pub use bot::WhatsAppBot;
pub use error::{Result, TranslateError, WhatsAppError};
pub use translate::{translate_fulfillment, PayloadFields};
pub use twilio::IncomingMessage;
pub use twiml::{MessagingResponse, OutboundPart, APOLOGY_TEXT};
pub use webhook::{process_message, WebhookServer, WebhookState};
