//! wab-dialogflow: Dialogflow ES client for wa-bridge
//!
//! Sends user text to a Dialogflow agent through the v2 REST API and
//! returns the fulfillment messages of the detected intent. Requests are
//! authorized with OAuth2 tokens minted from a service account key.

pub mod auth;
pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use auth::{ServiceAccountKey, ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::{DialogflowClient, IntentDetector};
pub use error::{DialogflowError, Result};
pub use session::SessionPath;
pub use types::{FulfillmentMessage, QueryResult, TextMessage};
