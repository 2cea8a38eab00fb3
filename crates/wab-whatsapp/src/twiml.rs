//! TwiML messaging responses
//!
//! Each [`OutboundPart`] becomes one `<Message>` verb. Parts keep the order
//! they were added in.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Result, WhatsAppError};

/// Reply sent when a webhook request could not be handled
pub const APOLOGY_TEXT: &str = "Sorry, there was an error processing your request.";

/// One outbound WhatsApp message: text, media, both or neither
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundPart {
    pub body: Option<String>,
    pub media_url: Option<String>,
}

impl OutboundPart {
    /// Text-only message
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            media_url: None,
        }
    }

    /// Media message with an optional caption
    pub fn media(media_url: impl Into<String>, body: Option<String>) -> Self {
        Self {
            body,
            media_url: Some(media_url.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.media_url.is_none()
    }
}

/// `<Response>` document made of message parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagingResponse {
    parts: Vec<OutboundPart>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response carrying only the generic apology
    pub fn apology() -> Self {
        let mut response = Self::new();
        response.message(APOLOGY_TEXT);
        response
    }

    /// Append a text message
    pub fn message(&mut self, body: impl Into<String>) -> &mut Self {
        self.parts.push(OutboundPart::text(body));
        self
    }

    /// Append an arbitrary part
    pub fn push(&mut self, part: OutboundPart) -> &mut Self {
        self.parts.push(part);
        self
    }

    pub fn parts(&self) -> &[OutboundPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Render as a TwiML document
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());

        write(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        write(&mut writer, Event::Start(BytesStart::new("Response")))?;

        for part in &self.parts {
            match (&part.body, &part.media_url) {
                (None, None) => write(&mut writer, Event::Empty(BytesStart::new("Message")))?,
                (Some(body), None) => text_element(&mut writer, "Message", body)?,
                (body, Some(media_url)) => {
                    write(&mut writer, Event::Start(BytesStart::new("Message")))?;
                    text_element(&mut writer, "Media", media_url)?;
                    if let Some(body) = body {
                        text_element(&mut writer, "Body", body)?;
                    }
                    write(&mut writer, Event::End(BytesEnd::new("Message")))?;
                }
            }
        }

        write(&mut writer, Event::End(BytesEnd::new("Response")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| WhatsAppError::Render(e.to_string()))
    }
}

impl FromIterator<OutboundPart> for MessagingResponse {
    fn from_iter<I: IntoIterator<Item = OutboundPart>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| WhatsAppError::Render(e.to_string()))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

    #[test]
    fn test_empty_response() {
        let xml = MessagingResponse::new().to_xml().unwrap();
        assert_eq!(xml, format!("{DECL}<Response></Response>"));
    }

    #[test]
    fn test_text_message() {
        let mut response = MessagingResponse::new();
        response.message("Hello");
        assert_eq!(
            response.to_xml().unwrap(),
            format!("{DECL}<Response><Message>Hello</Message></Response>")
        );
    }

    #[test]
    fn test_media_with_caption() {
        let mut response = MessagingResponse::new();
        response.push(OutboundPart::media(
            "http://x/img.png",
            Some("caption".to_string()),
        ));
        assert_eq!(
            response.to_xml().unwrap(),
            format!(
                "{DECL}<Response><Message><Media>http://x/img.png</Media><Body>caption</Body></Message></Response>"
            )
        );
    }

    #[test]
    fn test_media_only_and_empty_part() {
        let response: MessagingResponse = vec![
            OutboundPart::media("http://x/a.png", None),
            OutboundPart::default(),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            response.to_xml().unwrap(),
            format!(
                "{DECL}<Response><Message><Media>http://x/a.png</Media></Message><Message/></Response>"
            )
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let mut response = MessagingResponse::new();
        response.message("1 < 2 & 3 > 2");
        let xml = response.to_xml().unwrap();
        assert!(xml.contains("<Message>1 &lt; 2 &amp; 3 &gt; 2</Message>"));
    }

    #[test]
    fn test_apology() {
        let response = MessagingResponse::apology();
        assert_eq!(response.parts(), &[OutboundPart::text(APOLOGY_TEXT)]);
        assert!(response.to_xml().unwrap().contains(APOLOGY_TEXT));
    }

    #[test]
    fn test_order_is_preserved() {
        let mut response = MessagingResponse::new();
        response.message("first").message("second").message("third");
        let xml = response.to_xml().unwrap();

        let first = xml.find("first").unwrap();
        let second = xml.find("second").unwrap();
        let third = xml.find("third").unwrap();
        assert!(first < second && second < third);
        assert_eq!(response.len(), 3);
    }
}
