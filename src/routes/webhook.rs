//! Tautulli webhook endpoint.
//!
//! Tautulli fires this on playback events. Watched/stopped events turn the
//! user's recent history into seeds, run the engine, and push the result
//! back into Plex. Delivery failure is reported in the response body but
//! never fails the request: the recommendation computation already
//! succeeded.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::MediaKind,
    state::AppState,
};

/// Recent-history titles used as seeds per webhook event
const SEED_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct TautulliEvent {
    pub event: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookOutcome {
    pub status: &'static str,
    pub recommendations: usize,
    pub delivered: bool,
}

impl WebhookOutcome {
    fn skipped(status: &'static str) -> Self {
        Self {
            status,
            recommendations: 0,
            delivered: false,
        }
    }
}

/// Handler for POST /webhooks/tautulli
pub async fn receive(
    State(state): State<AppState>,
    Json(event): Json<TautulliEvent>,
) -> AppResult<Json<WebhookOutcome>> {
    if !matches!(event.event.as_str(), "watched" | "playback_stop") {
        tracing::info!(event = %event.event, "Ignoring webhook event");
        return Ok(Json(WebhookOutcome::skipped("ignored")));
    }

    let kind = match MediaKind::from_history_media_type(&event.media_type) {
        Some(kind) => kind,
        None => {
            tracing::info!(media_type = %event.media_type, "Unsupported media type, ignoring");
            return Ok(Json(WebhookOutcome::skipped("ignored")));
        }
    };

    if event.username.is_empty() {
        return Err(AppError::InvalidInput(
            "webhook payload is missing a username".to_string(),
        ));
    }

    let seeds = state
        .history
        .recently_watched(&event.username, kind, SEED_LIMIT)
        .await?;
    if seeds.is_empty() {
        tracing::info!(user = %event.username, kind = %kind, "No recent history, nothing to do");
        return Ok(Json(WebhookOutcome::skipped("no_history")));
    }

    tracing::info!(user = %event.username, kind = %kind, seeds = seeds.len(), "Processing webhook");
    let recommendations = state
        .recommender
        .recommend_from_seeds(&seeds, kind, Default::default())
        .await?;
    if recommendations.is_empty() {
        return Ok(Json(WebhookOutcome::skipped("no_recommendations")));
    }

    let titles: Vec<String> = recommendations.iter().map(|r| r.title.clone()).collect();
    let delivered = match state
        .delivery
        .deliver(&event.username, kind, &titles)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(user = %event.username, kind = %kind, error = %e, "Delivery failed");
            false
        }
    };

    Ok(Json(WebhookOutcome {
        status: "processed",
        recommendations: recommendations.len(),
        delivered,
    }))
}
