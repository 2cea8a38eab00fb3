//! Fulfillment → outbound message translation
//!
//! Every fulfillment entry is checked for the `text` shape and then for the
//! `payload` shape. The two checks are independent, so one entry yields zero,
//! one or two parts. Output order follows input order.

use serde_json::{Map, Value};

use wab_dialogflow::FulfillmentMessage;

use crate::error::TranslateError;
use crate::twiml::OutboundPart;

const MEDIA_URL_KEY: &str = "mediaUrl";
const TEXT_KEY: &str = "text";

/// The custom payload keys understood by the bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFields {
    pub media_url: Option<String>,
    pub text: Option<String>,
}

impl PayloadFields {
    /// Read `mediaUrl` / `text` from a custom payload.
    ///
    /// Accepts the protobuf `Struct` encoding
    /// (`{"fields": {"mediaUrl": {"stringValue": ".."}}}`) as well as the
    /// plain JSON object the REST API returns.
    pub fn from_payload(payload: &Value) -> std::result::Result<Self, String> {
        let object = payload
            .as_object()
            .ok_or_else(|| "payload is not an object".to_string())?;

        match object.get("fields") {
            Some(Value::Object(fields)) => Ok(Self {
                media_url: struct_string(fields, MEDIA_URL_KEY)?,
                text: struct_string(fields, TEXT_KEY)?,
            }),
            Some(_) => Err("`fields` is not an object".to_string()),
            None => Ok(Self {
                media_url: plain_string(object, MEDIA_URL_KEY)?,
                text: plain_string(object, TEXT_KEY)?,
            }),
        }
    }
}

impl From<PayloadFields> for OutboundPart {
    fn from(fields: PayloadFields) -> Self {
        OutboundPart {
            body: fields.text,
            media_url: fields.media_url,
        }
    }
}

fn struct_string(
    fields: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<String>, String> {
    match fields.get(key) {
        None => Ok(None),
        Some(value) => value
            .get("stringValue")
            .and_then(Value::as_str)
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| format!("`{}` has no stringValue", key)),
    }
}

fn plain_string(
    object: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<String>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("`{}` is not a string", key)),
    }
}

/// Map fulfillment messages to outbound parts.
///
/// Fails on the first entry that cannot be translated; no partial list is
/// returned.
pub fn translate_fulfillment(
    messages: &[FulfillmentMessage],
) -> std::result::Result<Vec<OutboundPart>, TranslateError> {
    let mut parts = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        if let Some(text) = &message.text {
            let body = text
                .text
                .first()
                .ok_or(TranslateError::EmptyText { index })?;
            parts.push(OutboundPart::text(body.clone()));
        }

        if let Some(payload) = &message.payload {
            let fields = PayloadFields::from_payload(payload)
                .map_err(|reason| TranslateError::MalformedPayload { index, reason })?;
            parts.push(fields.into());
        }
    }

    Ok(parts)
}
