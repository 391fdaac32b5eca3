use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use tracing::debug;

use crate::session::{GenerationRequest, StreamError};

/// Text deltas of one structured-generation response
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Opens the streaming call for one request
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn open(&self, request: &GenerationRequest) -> Result<TextStream, StreamError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to the `/api/structured` endpoint of the extraction service
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationTransport for HttpTransport {
    async fn open(&self, request: &GenerationRequest) -> Result<TextStream, StreamError> {
        let url = format!("{}/api/structured", self.base_url);
        debug!(url = %url, schema_type = %request.schema_type, "Opening generation stream");

        let response = self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| StreamError::Opaque(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &body));
        }

        let mut decoder = Utf8Decoder::default();
        let stream = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => Ok(decoder.push(&bytes)),
                Err(e) => Err(StreamError::Opaque(e.to_string())),
            })
            .filter(|item| {
                let keep = !matches!(item, Ok(text) if text.is_empty());
                async move { keep }
            });

        Ok(Box::pin(stream))
    }
}

fn error_from_body(status: u16, body: &str) -> StreamError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => StreamError::HasMessage(parsed.error),
        Err(_) if !body.trim().is_empty() => StreamError::Opaque(body.trim().to_string()),
        Err(_) => StreamError::Opaque(format!("Request failed with status {}", status)),
    }
}

/// Decodes UTF-8 across chunk boundaries, holding back an incomplete
/// trailing sequence until the rest of it arrives.
#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let out = text.to_string();
                self.pending.clear();
                out
            }
            // Truncated sequence at the end: emit what is complete
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let out = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                out
            }
            Err(_) => {
                let out = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_decoder_split_codepoint() {
        let mut decoder = Utf8Decoder::default();
        let bytes = "\"Beyoncé\"".as_bytes();
        let cut = bytes.len() - 2; // between the two bytes of 'é'
        assert_eq!(decoder.push(&bytes[..cut]), "\"Beyonc");
        assert_eq!(decoder.push(&bytes[cut..]), "é\"");
    }

    #[test]
    fn test_utf8_decoder_plain_chunks() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(b"{\"a\":"), "{\"a\":");
        assert_eq!(decoder.push(b""), "");
        assert_eq!(decoder.push(b"1}"), "1}");
    }

    #[test]
    fn test_error_body_with_message() {
        assert_eq!(
            error_from_body(400, r#"{"error":"Invalid or missing schemaType"}"#),
            StreamError::HasMessage("Invalid or missing schemaType".to_string())
        );
    }

    #[test]
    fn test_error_body_without_message() {
        assert_eq!(
            error_from_body(502, "  "),
            StreamError::Opaque("Request failed with status 502".to_string())
        );
    }

    #[test]
    fn test_plain_text_error_body_is_kept() {
        let error = error_from_body(429, "Quota exceeded for metric: x/free_tier_requests, limit: 20\n");
        assert_eq!(
            error,
            StreamError::Opaque("Quota exceeded for metric: x/free_tier_requests, limit: 20".to_string())
        );
        assert!(crate::error_parser::is_quota_error(&crate::session::display_message(&error)));
    }
}
