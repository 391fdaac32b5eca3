use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use extract::GeminiClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub generation: GenerationConfig,
    pub images: ImageConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_duration_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(skip_serializing)]
    pub pexels_api_key: Option<String>,
    pub pexels_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            generation: GenerationConfig {
                api_key: String::new(),
                model: GeminiClient::DEFAULT_MODEL.to_string(),
                base_url: GeminiClient::DEFAULT_BASE_URL.to_string(),
                max_duration_secs: extract::DEFAULT_MAX_DURATION.as_secs(),
            },
            images: ImageConfig {
                pexels_api_key: None,
                pexels_base_url: crate::images::PEXELS_BASE_URL.to_string(),
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 1000,
            },
        }
    }
}

impl AppConfig {
    /// Defaults overridden by whatever is set in the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(key) = get("GOOGLE_GENERATIVE_AI_API_KEY") {
            config.generation.api_key = key;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            config.generation.model = model;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            config.generation.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = get("MAX_DURATION_SECS") {
            config.generation.max_duration_secs = parse_var("MAX_DURATION_SECS", &secs)?;
        }
        config.images.pexels_api_key = get("PEXELS_API_KEY");
        if let Some(url) = get("PEXELS_BASE_URL") {
            config.images.pexels_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(enabled) = get("IMAGE_CACHE_ENABLED") {
            config.cache.enabled = parse_var("IMAGE_CACHE_ENABLED", &enabled)?;
        }
        if let Some(max) = get("IMAGE_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = parse_var("IMAGE_CACHE_MAX_ENTRIES", &max)?;
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}
