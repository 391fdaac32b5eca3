//! Image lookup for extracted objects: Pexels search with a placeholder
//! image whenever search is unavailable.

use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::ImageCache;

pub const PEXELS_BASE_URL: &str = "https://api.pexels.com";

/// Value shipped in sample env files; treated as "no key"
const PEXELS_KEY_SENTINEL: &str = "YOUR_PEXELS_API_KEY_HERE";

const PLACEHOLDER_BASE: &str = "https://placehold.co/600x600";
const UNCONFIGURED_COLORS: (&str, &str) = ("4facfe", "white");

const PALETTE: [(&str, &str); 6] = [
    ("667eea", "white"),
    ("f093fb", "white"),
    ("4facfe", "white"),
    ("43e97b", "white"),
    ("fa709a", "white"),
    ("a8edea", "black"),
];

const DISPLAY_TEXT_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Pexels,
    Cache,
    Placeholder,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    src: PhotoSources,
}

#[derive(Deserialize)]
struct PhotoSources {
    medium: String,
}

#[derive(Clone)]
pub struct PexelsClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl PexelsClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty() && k != PEXELS_KEY_SENTINEL);
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// URL of the first square photo matching `query`
    pub async fn search(&self, query: &str) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            bail!("Pexels API key not configured");
        };

        let url = format!("{}/v1/search", self.base_url);
        let response = self.client
            .get(&url)
            .header("Authorization", api_key)
            .query(&[("query", query), ("per_page", "1"), ("orientation", "square")])
            .send()
            .await
            .context("Failed to reach Pexels")?;

        if !response.status().is_success() {
            bail!("Pexels API error: {}", response.status());
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse Pexels response")?;

        match body.photos.into_iter().next() {
            Some(photo) => Ok(photo.src.medium),
            None => bail!("No images found"),
        }
    }
}

/// Resolves queries to image URLs, going through the cache first
pub struct ImageResolver {
    pexels: PexelsClient,
    cache: Option<ImageCache>,
}

impl ImageResolver {
    pub fn new(pexels: PexelsClient, cache: Option<ImageCache>) -> Self {
        Self { pexels, cache }
    }

    pub fn is_configured(&self) -> bool {
        self.pexels.is_configured()
    }

    pub fn cache(&self) -> Option<&ImageCache> {
        self.cache.as_ref()
    }

    pub async fn resolve(&self, query: &str) -> (String, ImageSource) {
        if !self.pexels.is_configured() {
            warn!("Pexels API key not configured, using placeholder image");
            return (unconfigured_placeholder(query), ImageSource::Placeholder);
        }

        if let Some(url) = self.cache.as_ref().and_then(|c| c.get(query)) {
            debug!(query = %query, "Image cache hit");
            return (url, ImageSource::Cache);
        }

        match self.pexels.search(query).await {
            Ok(url) => {
                debug!(query = %query, url = %url, "Pexels image fetched");
                if let Some(cache) = &self.cache {
                    cache.set(query, url.clone());
                }
                (url, ImageSource::Pexels)
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Pexels lookup failed, using placeholder");
                (hashed_placeholder(query), ImageSource::Placeholder)
            }
        }
    }
}

/// 32-bit string hash over UTF-16 code units (`h * 31 + c`, wrapping)
pub fn hash_query(query: &str) -> u32 {
    query
        .encode_utf16()
        .fold(0i32, |hash, unit| (hash << 5).wrapping_sub(hash).wrapping_add(unit as i32))
        .unsigned_abs()
}

fn display_prefix(query: &str) -> String {
    query.chars().take(DISPLAY_TEXT_LEN).collect()
}

fn placeholder_url(colors: (&str, &str), text: &str) -> String {
    let base = format!("{}/{}/{}", PLACEHOLDER_BASE, colors.0, colors.1);
    match Url::parse_with_params(&base, &[("text", text)]) {
        Ok(url) => url.to_string(),
        Err(_) => base,
    }
}

/// Placeholder used when no Pexels key is configured
pub fn unconfigured_placeholder(query: &str) -> String {
    let (bg, fg) = UNCONFIGURED_COLORS;
    format!(
        "{}/{}/{}?text={}",
        PLACEHOLDER_BASE,
        bg,
        fg,
        urlencoding::encode(&display_prefix(query))
    )
}

/// Placeholder whose colours are stable for a given query
pub fn hashed_placeholder(query: &str) -> String {
    let colors = PALETTE[hash_query(query) as usize % PALETTE.len()];
    let text = display_prefix(query)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    placeholder_url(colors, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_query() {
        assert_eq!(hash_query(""), 0);
        assert_eq!(hash_query("food"), 3148894);
        assert_eq!(hash_query("Paella"), 1911937555);
        assert_eq!(hash_query("Canyon Ultimate road bike"), 1274811222);
        assert_eq!(hash_query("4 Beyoncé album cover"), 2111603893);
    }

    #[test]
    fn test_hashed_placeholder_is_deterministic() {
        assert_eq!(
            hashed_placeholder("Canyon Ultimate road bike"),
            "https://placehold.co/600x600/667eea/white?text=Canyon+Ultimate+road+bike"
        );
        assert_eq!(
            hashed_placeholder("Paella"),
            "https://placehold.co/600x600/f093fb/white?text=Paella"
        );
        assert_eq!(hashed_placeholder("food"), hashed_placeholder("food"));
    }

    #[test]
    fn test_unconfigured_placeholder_percent_encodes() {
        assert_eq!(
            unconfigured_placeholder("Canyon Ultimate road bike"),
            "https://placehold.co/600x600/4facfe/white?text=Canyon%20Ultimate%20road%20bike"
        );
        assert_eq!(
            unconfigured_placeholder("Fish & chips"),
            "https://placehold.co/600x600/4facfe/white?text=Fish%20%26%20chips"
        );
    }

    #[test]
    fn test_placeholder_text_is_truncated() {
        let query = "Pinarello Dogma F Dura-Ace Di2 road bike";
        let url = hashed_placeholder(query);
        assert!(url.ends_with("?text=Pinarello+Dogma+F+Dura-Ace+Di2"));

        let url = unconfigured_placeholder(query);
        assert!(url.starts_with("https://placehold.co/600x600/4facfe/white?text="));
        assert!(url.ends_with("Di2"));
    }

    #[test]
    fn test_sentinel_key_is_unconfigured() {
        let client = PexelsClient::new(PEXELS_BASE_URL.to_string(), Some(PEXELS_KEY_SENTINEL.to_string()));
        assert!(!client.is_configured());
        assert!(!PexelsClient::new(PEXELS_BASE_URL.to_string(), Some(" ".to_string())).is_configured());
        assert!(PexelsClient::new(PEXELS_BASE_URL.to_string(), Some("key".to_string())).is_configured());
    }

    #[tokio::test]
    async fn test_resolve_without_key_uses_placeholder() {
        let resolver = ImageResolver::new(PexelsClient::new(PEXELS_BASE_URL.to_string(), None), None);
        let (url, source) = resolver.resolve("Paella").await;
        assert_eq!(source, ImageSource::Placeholder);
        assert_eq!(url, "https://placehold.co/600x600/4facfe/white?text=Paella");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_search_error() {
        // Nothing listens on the discard port
        let pexels = PexelsClient::new("http://127.0.0.1:9".to_string(), Some("key".to_string()));
        let resolver = ImageResolver::new(pexels, Some(ImageCache::new(10)));
        let (url, source) = resolver.resolve("Paella").await;
        assert_eq!(source, ImageSource::Placeholder);
        assert_eq!(url, hashed_placeholder("Paella"));
        assert!(resolver.cache().unwrap().get("Paella").is_none());
    }

    #[tokio::test]
    async fn test_resolve_serves_cached_url() {
        let pexels = PexelsClient::new("http://127.0.0.1:9".to_string(), Some("key".to_string()));
        let cache = ImageCache::new(10);
        cache.set("Paella", "https://images.pexels.com/paella.jpg".to_string());
        let resolver = ImageResolver::new(pexels, Some(cache));

        let (url, source) = resolver.resolve("Paella").await;
        assert_eq!(source, ImageSource::Cache);
        assert_eq!(url, "https://images.pexels.com/paella.jpg");
    }
}
