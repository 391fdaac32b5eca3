use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

use crate::schema::Schema;

/// Incremental text deltas from the provider
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing provider API key")]
    MissingApiKey,

    /// Non-success answer from the provider; `message` keeps its text verbatim
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation exceeded the maximum duration of {0} seconds")]
    Timeout(u64),
}

/// Anything that can stream a JSON object constrained by a schema
#[async_trait]
pub trait ObjectProvider: Send + Sync {
    async fn stream_object(&self, schema: &Schema, prompt: &str) -> Result<TextStream, ProviderError>;

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str, // "application/json" for structured output
    response_schema: Value,
}

#[derive(Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiErrorBody>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    code: Option<u16>,
    message: String,
    status: Option<String>,
}

impl GeminiErrorBody {
    fn into_error(self, fallback_status: u16) -> ProviderError {
        let message = match self.status {
            Some(status) => format!("{}: {}", status, self.message),
            None => self.message,
        };
        ProviderError::Upstream {
            status: self.code.unwrap_or(fallback_status),
            message,
        }
    }
}

impl GeminiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";

    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            base_url,
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(api_key: String) -> Self {
        Self::new(
            Self::DEFAULT_BASE_URL.to_string(),
            Self::DEFAULT_MODEL.to_string(),
            api_key,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ObjectProvider for GeminiClient {
    async fn stream_object(&self, schema: &Schema, prompt: &str) -> Result<TextStream, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema.to_provider_schema(),
            },
        };

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status.as_u16(), &body));
        }

        let mut decoder = SseDecoder::default();
        let stream = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .map(|data| parse_event(&data))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(ProviderError::Transport(e.to_string()))],
            })
            .flat_map(futures::stream::iter)
            .filter_map(|result| async move {
                match result {
                    Ok(Some(text)) => Some(Ok(text)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(stream))
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

fn upstream_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.into_error(status),
        Err(_) => ProviderError::Upstream {
            status,
            message: if body.trim().is_empty() {
                format!("Provider request failed with status {}", status)
            } else {
                body.trim().to_string()
            },
        },
    }
}

/// Turn one SSE `data:` payload into a text delta
fn parse_event(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: GeminiChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(_) => return Ok(None),
    };
    if let Some(error) = chunk.error {
        return Err(error.into_error(500));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();

    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Splits a byte stream into SSE `data:` payloads. Lines may be cut
/// anywhere by the network, so incomplete lines are buffered.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim_start();
                if !data.is_empty() && data != "[DONE]" {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_decoder_buffers_split_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let payloads = decoder.push(b"1}\r\n\r\ndata: {\"b\":2}\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
        assert!(decoder.push(b": keep-alive\n").is_empty());
    }

    #[test]
    fn test_sse_decoder_multibyte_split() {
        let mut decoder = SseDecoder::default();
        let line = "data: \"Beyoncé\"\n".as_bytes();
        let cut = line.len() - 3; // inside the two-byte 'é'
        assert!(decoder.push(&line[..cut]).is_empty());
        assert_eq!(decoder.push(&line[cut..]), vec!["\"Beyoncé\"".to_string()]);
    }

    #[test]
    fn test_parse_event_text_parts() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"{\"name\":"},{"text":"\"Paella\""}]}}]}"#;
        assert_eq!(parse_event(data).unwrap(), Some("{\"name\":\"Paella\"".to_string()));

        let finish_only = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        assert_eq!(parse_event(finish_only).unwrap(), None);
    }

    #[test]
    fn test_parse_event_error_payload() {
        let data = r#"{"error":{"code":429,"message":"Quota exceeded for metric: x/y, limit: 20","status":"RESOURCE_EXHAUSTED"}}"#;
        match parse_event(data) {
            Err(ProviderError::Upstream { status, message }) => {
                assert_eq!(status, 429);
                assert!(message.starts_with("RESOURCE_EXHAUSTED: Quota exceeded"));
            }
            _ => panic!("expected upstream error"),
        }
    }

    #[test]
    fn test_upstream_error_without_envelope() {
        match upstream_error(503, "  ") {
            ProviderError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Provider request failed with status 503");
            }
            _ => panic!("expected upstream error"),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::with_api_key(String::new());
        assert!(!client.is_configured());
        let schema = crate::schema::get_schema(crate::Category::Recipe);
        assert!(matches!(
            client.stream_object(schema, "text").await,
            Err(ProviderError::MissingApiKey)
        ));
    }
}
