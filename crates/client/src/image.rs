//! Illustrative image shown next to a finished extraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use extract::Category;

use crate::session::GenerationSession;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("Image request failed with status {0}")]
    Status(u16),

    #[error("Image request failed: {0}")]
    Transport(String),
}

/// Resolves a search query to an image URL
#[async_trait]
pub trait ImageLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<String, ImageError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_url: String,
}

/// Calls the `/api/image` endpoint of the extraction service
#[derive(Clone)]
pub struct HttpImageLookup {
    base_url: String,
    client: reqwest::Client,
}

impl HttpImageLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ImageLookup for HttpImageLookup {
    async fn lookup(&self, query: &str) -> Result<String, ImageError> {
        let url = format!("{}/api/image", self.base_url);
        let response = self.client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| ImageError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ImageError::Status(response.status().as_u16()));
        }

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Transport(e.to_string()))?;
        Ok(body.image_url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageState {
    pub url: Option<String>,
    pub loading: bool,
    pub error: bool,
}

/// One lookup to perform, tied to the object revision it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub revision: u64,
    pub query: String,
}

fn text_field<'a>(object: &'a Value, name: &str) -> &'a str {
    object.get(name).and_then(Value::as_str).unwrap_or("")
}

/// Search query describing an extracted object
pub fn image_query(category: Category, object: &Value) -> String {
    let query = match category {
        Category::RoadBike => {
            format!("{} {} road bike", text_field(object, "brand"), text_field(object, "model"))
        }
        Category::Album => {
            format!("{} {} album cover", text_field(object, "title"), text_field(object, "artist"))
        }
        Category::Recipe => match text_field(object, "name") {
            "" => "food".to_string(),
            name => name.to_string(),
        },
    };
    query.trim().to_string()
}

/// Tracks the image for the session's current object. Any change of the
/// object clears the image; a settled, error-free object triggers exactly
/// one lookup.
#[derive(Debug, Default)]
pub struct ImageCompanion {
    state: ImageState,
    observed: Option<u64>,
    requested: Option<u64>,
}

impl ImageCompanion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ImageState {
        &self.state
    }

    /// Sync with the session. Returns the lookup to run, if one is due.
    pub fn observe(&mut self, session: &GenerationSession) -> Option<ImageRequest> {
        let revision = session.object_revision();
        if self.observed != Some(revision) {
            self.observed = Some(revision);
            self.state = ImageState::default();
        }

        let object = session.usable_object()?;
        if self.requested == Some(revision) {
            return None;
        }
        self.requested = Some(revision);
        self.state.loading = true;
        self.state.error = false;

        Some(ImageRequest {
            revision,
            query: image_query(session.category(), object),
        })
    }

    /// Record a lookup result. Results for an object that has since
    /// changed are dropped.
    pub fn complete(&mut self, request: &ImageRequest, result: Result<String, ImageError>) -> bool {
        if self.observed != Some(request.revision) {
            debug!(revision = request.revision, "Dropped stale image result");
            return false;
        }
        self.state.loading = false;
        match result {
            Ok(url) => {
                self.state.url = Some(url);
                self.state.error = false;
            }
            Err(e) => {
                warn!(query = %request.query, error = %e, "Image lookup failed");
                self.state.url = None;
                self.state.error = true;
            }
        }
        true
    }

    /// The rendered image failed to load
    pub fn set_error(&mut self, error: bool) {
        self.state.error = error;
    }

    /// Observe and, if a lookup is due, run it to completion
    pub async fn refresh(&mut self, session: &GenerationSession, lookup: &dyn ImageLookup) -> bool {
        let Some(request) = self.observe(session) else {
            return false;
        };
        let result = lookup.lookup(&request.query).await;
        self.complete(&request, result)
    }
}
