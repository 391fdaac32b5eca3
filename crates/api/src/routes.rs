use axum::{
    Json,
    body::Body,
    extract::{Query, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use extract::{Category, ProviderError};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics::TimedOperation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRequest {
    pub prompt: Option<String>,
    pub schema_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageParams {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: &'static str,
    pub images: &'static str,
}

/// Stream a schema-constrained object as plain text deltas.
///
/// The response status is only committed once the first delta (or the
/// first failure) is known, so errors the provider reports up front get a
/// proper status and JSON body. Later failures abort the body.
pub async fn structured(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StructuredRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = match parse_structured(body) {
        Ok(parsed) => {
            state.metrics.record_request(true);
            parsed
        }
        Err(e) => {
            state.metrics.record_request(false);
            return Err(e);
        }
    };
    let (category, prompt) = request;

    info!(category = %category, prompt_len = prompt.len(), "Structured generation requested");
    state.metrics.record_generation_started();
    let timer = TimedOperation::start();

    let mut stream = state.generator.stream(category, &prompt).await.inspect_err(|e| {
        state.metrics.record_generation_failed(e);
    })?;

    let first = match stream.next().await {
        Some(Ok(text)) => Some(text),
        Some(Err(e)) => {
            state.metrics.record_generation_failed(&e);
            return Err(e.into());
        }
        None => None,
    };

    let failed = state.metrics.clone();
    let completed = state.metrics.clone();
    let finished = futures::stream::once(async move {
        completed.record_generation_completed(timer.elapsed());
        Ok::<_, ProviderError>(String::new())
    })
    .filter(|_| async { false });

    let body = futures::stream::iter(first.map(Ok))
        .chain(stream)
        .inspect(move |item| {
            if let Err(e) = item {
                failed.record_generation_failed(e);
            }
        })
        .chain(finished);

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

fn parse_structured(
    body: Result<Json<StructuredRequest>, JsonRejection>,
) -> Result<(Category, String), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let category = request
        .schema_type
        .as_deref()
        .and_then(|s| s.parse::<Category>().ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid or missing schemaType".to_string()))?;

    let prompt = request
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing prompt".to_string()))?;

    Ok((category, prompt))
}

pub async fn image(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImageParams>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Some(query) = params.query.filter(|q| !q.trim().is_empty()) else {
        state.metrics.record_request(false);
        return Err(ApiError::BadRequest("Query parameter is required".to_string()));
    };
    state.metrics.record_request(true);

    let (image_url, source) = state.images.resolve(&query).await;
    state.metrics.record_image(source);

    Ok(Json(ImageResponse { image_url }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let provider = if state.generator.provider().is_configured() {
        "configured"
    } else {
        "missing_api_key"
    };
    let images = if state.images.is_configured() {
        "pexels"
    } else {
        "placeholder"
    };

    Json(HealthResponse {
        status: "ok",
        provider,
        images,
    })
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "metrics": state.metrics.snapshot(),
        "cache": state.images.cache().map(|c| c.stats()),
    }))
}
