pub mod category;
pub mod examples;
pub mod llm;
pub mod models;
pub mod partial;
pub mod prompt;
pub mod schema;

pub use category::{Category, CategoryError};
pub use llm::{GeminiClient, ObjectProvider, ProviderError, TextStream};
pub use models::Extracted;
pub use partial::parse_partial;
pub use schema::{Schema, ValidationError, get_schema};

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Upper bound on one generation in the reference deployment
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

pub struct Generator {
    provider: Arc<dyn ObjectProvider>,
    max_duration: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn ObjectProvider>, max_duration: Duration) -> Self {
        Self {
            provider,
            max_duration,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ObjectProvider> {
        &self.provider
    }

    /// Start streaming an object for `text`. Opening the provider stream and
    /// every chunk after it share one deadline; running past it ends the
    /// stream with `ProviderError::Timeout`.
    pub async fn stream(&self, category: Category, text: &str) -> Result<TextStream, ProviderError> {
        let deadline = Instant::now() + self.max_duration;
        let limit_secs = self.max_duration.as_secs();
        let schema = get_schema(category);
        let prompt = prompt::build_extraction_prompt(text);

        let inner = match tokio::time::timeout_at(deadline, self.provider.stream_object(schema, &prompt)).await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(limit_secs)),
        };

        Ok(bounded(inner, deadline, limit_secs, category))
    }
}

struct Bounded {
    inner: TextStream,
    deadline: Instant,
    limit_secs: u64,
    category: Category,
    assembled: String,
    done: bool,
}

fn bounded(inner: TextStream, deadline: Instant, limit_secs: u64, category: Category) -> TextStream {
    let state = Bounded {
        inner,
        deadline,
        limit_secs,
        category,
        assembled: String::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut s| async move {
        if s.done {
            return None;
        }
        match tokio::time::timeout_at(s.deadline, s.inner.next()).await {
            Ok(Some(Ok(text))) => {
                s.assembled.push_str(&text);
                Some((Ok(text), s))
            }
            Ok(Some(Err(e))) => {
                warn!(category = %s.category, error = %e, "Generation stream failed");
                s.done = true;
                Some((Err(e), s))
            }
            Ok(None) => {
                log_outcome(s.category, &s.assembled);
                None
            }
            Err(_) => {
                warn!(
                    category = %s.category,
                    limit_secs = s.limit_secs,
                    received_bytes = s.assembled.len(),
                    "Generation timed out"
                );
                s.done = true;
                Some((Err(ProviderError::Timeout(s.limit_secs)), s))
            }
        }
    }))
}

fn log_outcome(category: Category, assembled: &str) {
    let value: serde_json::Value = match serde_json::from_str(assembled) {
        Ok(value) => value,
        Err(e) => {
            warn!(category = %category, bytes = assembled.len(), error = %e, "Generated text is not complete JSON");
            return;
        }
    };
    match get_schema(category).validate(&value) {
        Ok(()) => info!(category = %category, bytes = assembled.len(), "Object generated"),
        Err(e) => warn!(category = %category, error = %e, "Generated object failed validation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Replays fixed chunks, optionally pausing before each one
    struct ScriptedProvider {
        chunks: Vec<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl ObjectProvider for ScriptedProvider {
        async fn stream_object(&self, _schema: &Schema, prompt: &str) -> Result<TextStream, ProviderError> {
            assert!(prompt.contains("Extract structured data"));
            let delay = self.delay;
            let chunks: Vec<String> = self.chunks.iter().map(|c| c.to_string()).collect();
            Ok(Box::pin(futures::stream::iter(chunks).then(move |c| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, ProviderError>(c)
            })))
        }
    }

    #[tokio::test]
    async fn test_stream_passes_chunks_through() {
        let provider = ScriptedProvider {
            chunks: vec!["{\"name\":", "\"Gazpacho\"}"],
            delay: Duration::ZERO,
        };
        let generator = Generator::new(Arc::new(provider), DEFAULT_MAX_DURATION);
        let stream = generator.stream(Category::Recipe, "Gazpacho").await.unwrap();
        let chunks: Vec<_> = stream.collect().await;
        let text: String = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(text, "{\"name\":\"Gazpacho\"}");
    }

    #[tokio::test]
    async fn test_stream_times_out() {
        let provider = ScriptedProvider {
            chunks: vec!["{", "}"],
            delay: Duration::from_millis(200),
        };
        let generator = Generator::new(Arc::new(provider), Duration::from_millis(50));
        let mut stream = generator.stream(Category::Album, "4 by Beyoncé").await.unwrap();

        match stream.next().await {
            Some(Err(ProviderError::Timeout(_))) => {}
            _ => panic!("expected timeout"),
        }
        assert!(stream.next().await.is_none());
    }
}
