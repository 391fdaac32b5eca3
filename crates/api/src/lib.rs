pub mod cache;
pub mod config;
pub mod error;
pub mod images;
pub mod metrics;
pub mod routes;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use extract::{GeminiClient, Generator, ObjectProvider};

use cache::ImageCache;
use config::AppConfig;
use images::{ImageResolver, PexelsClient};
use metrics::Metrics;

pub struct AppState {
    pub generator: Generator,
    pub images: ImageResolver,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire up the Gemini provider and Pexels search from configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let provider = GeminiClient::new(
            config.generation.base_url.clone(),
            config.generation.model.clone(),
            config.generation.api_key.clone(),
        );
        Self::with_provider(config, Arc::new(provider))
    }

    pub fn with_provider(config: &AppConfig, provider: Arc<dyn ObjectProvider>) -> Self {
        let generator = Generator::new(
            provider,
            Duration::from_secs(config.generation.max_duration_secs),
        );

        let pexels = PexelsClient::new(
            config.images.pexels_base_url.clone(),
            config.images.pexels_api_key.clone(),
        );
        let cache = config
            .cache
            .enabled
            .then(|| ImageCache::new(config.cache.max_entries));

        Self {
            generator,
            images: ImageResolver::new(pexels, cache),
            metrics: Metrics::new(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/structured", post(routes::structured))
        .route("/api/image", get(routes::image))
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
