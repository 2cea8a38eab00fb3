//! Dialogflow ES v2 REST types
//!
//! Only the parts of `detectIntent` the bridge reads are modelled;
//! unknown fields are ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Body of `POST .../sessions/{session}:detectIntent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentRequest<'a> {
    pub query_input: QueryInput<'a>,
}

impl<'a> DetectIntentRequest<'a> {
    /// Text query in the given language
    pub fn text(text: &'a str, language_code: &'a str) -> Self {
        Self {
            query_input: QueryInput {
                text: TextInput {
                    text,
                    language_code,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryInput<'a> {
    pub text: TextInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInput<'a> {
    pub text: &'a str,
    pub language_code: &'a str,
}

/// Response of `detectIntent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub query_result: Option<QueryResult>,
}

/// Result of conversational query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub fulfillment_text: Option<String>,
    #[serde(default)]
    pub fulfillment_messages: Vec<FulfillmentMessage>,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub intent_detection_confidence: Option<f32>,
}

/// Matched intent (only identification fields)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A single rich response message
///
/// The `text` and `payload` shapes are independent: an entry may carry
/// either, both or neither of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMessage>,

    /// Custom payload as sent by the agent, left uninterpreted here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl FulfillmentMessage {
    /// Text response with a single variant
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(TextMessage {
                text: vec![text.into()],
            }),
            ..Default::default()
        }
    }

    /// Custom payload response
    pub fn payload(payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..Default::default()
        }
    }
}

/// Text response; Dialogflow returns one or more variants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    #[serde(default)]
    pub text: Vec<String>,
}
