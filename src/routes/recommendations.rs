use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    engine::recommend::RecommendOptions,
    error::AppResult,
    models::{MediaKind, Recommendation},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub seeds: Vec<String>,
    pub kind: MediaKind,
    pub per_seed: Option<usize>,
    pub top_n: Option<usize>,
}

/// Handler for the recommendations endpoint.
///
/// An empty list is a valid response: it means no seed resolved against the
/// library, not a failure.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let defaults = RecommendOptions::default();
    let options = RecommendOptions {
        per_seed: request.per_seed.unwrap_or(defaults.per_seed),
        top_n: request.top_n.unwrap_or(defaults.top_n),
    };

    let recommendations = state
        .recommender
        .recommend_from_seeds(&request.seeds, request.kind, options)
        .await?;
    Ok(Json(recommendations))
}
