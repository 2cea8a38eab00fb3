//! Twilio webhook parameters and request signatures

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying Twilio's request signature
pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// Incoming WhatsApp message from a Twilio webhook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    pub body: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub message_sid: Option<String>,
    pub account_sid: Option<String>,
    pub profile_name: Option<String>,
    pub num_media: usize,
}

impl IncomingMessage {
    /// Pick the known fields out of the form parameters
    pub fn from_params(params: &[(String, String)]) -> Self {
        let mut message = Self::default();

        for (key, value) in params {
            match key.as_str() {
                "Body" => message.body = Some(value.clone()),
                "From" => message.from = Some(value.clone()),
                "To" => message.to = Some(value.clone()),
                "MessageSid" => message.message_sid = Some(value.clone()),
                "AccountSid" => message.account_sid = Some(value.clone()),
                "ProfileName" => message.profile_name = Some(value.clone()),
                "NumMedia" => message.num_media = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        message
    }
}

/// Compute the signature Twilio sends for a form POST.
///
/// base64(HMAC-SHA1(auth_token, url + key1 + value1 + key2 + value2 ...))
/// with parameters sorted by key.
pub fn compute_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Option<String> {
    let mac = signing_mac(auth_token, url, params)?;
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check a request signature in constant time
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };

    match signing_mac(auth_token, url, params) {
        Some(mac) => mac.verify_slice(&expected).is_ok(),
        None => false,
    }
}

fn signing_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> Option<HmacSha1> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).ok()?;

    mac.update(url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Some(mac)
}
