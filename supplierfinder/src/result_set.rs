//! Decoding of search backend responses into result URLs.
//!
//! The backend answers with a JSON envelope whose `rawData` field holds a
//! base64-encoded XML document. Each `<group>` in that document is one result;
//! the URL is the first `<url>` of the group's first `<doc>`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, warn};

/// JSON envelope returned by the search backend
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "rawData", default)]
    pub raw_data: Option<String>,
}

impl ResultEnvelope {
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Result URLs in document order. A missing `rawData`, bad base64 or bad
    /// XML all yield an empty list.
    pub fn urls(&self) -> Vec<String> {
        let Some(raw) = self.raw_data.as_deref() else {
            warn!("Search response has no rawData field");
            return Vec::new();
        };

        let bytes = match STANDARD.decode(raw.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Search response rawData is not valid base64: {}", e);
                return Vec::new();
            }
        };

        match String::from_utf8(bytes) {
            Ok(xml) => decode_xml_document(&xml),
            Err(e) => {
                warn!("Search response XML is not valid UTF-8: {}", e);
                Vec::new()
            }
        }
    }
}

/// Decode a full response payload. Never fails; malformed input is logged and
/// yields no URLs.
pub fn decode_result_set(raw_payload: &[u8]) -> Vec<String> {
    match ResultEnvelope::from_slice(raw_payload) {
        Ok(envelope) => envelope.urls(),
        Err(e) => {
            warn!("Search response is not a valid JSON envelope: {}", e);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
    /// Inside a group, first doc not reached yet
    AwaitingDoc,
    /// Inside the group's first doc, opened at this depth
    InDoc(usize),
    /// URL taken or first doc closed; ignore the rest of the group
    Done,
}

/// Walk the XML stage on its own
pub fn decode_xml_document(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut depth = 0usize;
    let mut group: Option<DocState> = None;
    let mut url_text: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"group" => group = Some(DocState::AwaitingDoc),
                    b"doc" if group == Some(DocState::AwaitingDoc) => {
                        group = Some(DocState::InDoc(depth));
                    }
                    b"url" if matches!(group, Some(DocState::InDoc(_))) && url_text.is_none() => {
                        url_text = Some(String::new());
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                // <doc/> is still the group's first doc
                b"doc" if group == Some(DocState::AwaitingDoc) => {
                    debug!("Skipping result group whose first doc is empty");
                    group = Some(DocState::Done);
                }
                // <url/> carries nothing but still counts as the doc's first url
                b"url" if matches!(group, Some(DocState::InDoc(_))) => {
                    group = Some(DocState::Done);
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(buf) = url_text.as_mut() {
                    match t.unescape() {
                        Ok(text) => buf.push_str(&text),
                        Err(e) => {
                            warn!("Malformed result XML: {}", e);
                            return Vec::new();
                        }
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(buf) = url_text.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"url" => {
                        if let Some(text) = url_text.take() {
                            let url = text.trim();
                            if url.is_empty() {
                                debug!("Skipping result group with empty url");
                            } else {
                                urls.push(url.to_string());
                            }
                            group = Some(DocState::Done);
                        }
                    }
                    b"doc" => {
                        if group == Some(DocState::InDoc(depth)) {
                            group = Some(DocState::Done);
                        }
                    }
                    b"group" => group = None,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => {
                if depth != 0 {
                    warn!("Result XML ended with {} unclosed element(s)", depth);
                    return Vec::new();
                }
                break;
            }
            Err(e) => {
                warn!(
                    "Malformed result XML at position {}: {}",
                    reader.buffer_position(),
                    e
                );
                return Vec::new();
            }
            _ => {}
        }
    }

    debug!("Decoded {} result URLs", urls.len());
    urls
}
