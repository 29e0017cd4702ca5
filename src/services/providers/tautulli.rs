//! Tautulli watch-history provider.
//!
//! Tautulli records Plex playback history; this client turns its history
//! endpoint into seed title lists. Episode rows roll up to their series
//! title so show seeds always name the series, not an episode.

use std::collections::HashMap;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::MediaKind,
    services::providers::WatchHistory,
};

/// History rows fetched per query before grouping/deduplication
const HISTORY_PAGE: usize = 1000;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    response: ResponseBody<T>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody<T> {
    #[serde(default)]
    result: String,
    /// Absent or null on error responses
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryPageData {
    #[serde(default)]
    data: Vec<HistoryRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryRow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    grandparent_title: String,
}

impl HistoryRow {
    /// Seed title for a row: episodes roll up to the series title
    fn seed_title(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Movie => &self.title,
            MediaKind::Show => {
                if self.grandparent_title.is_empty() {
                    &self.title
                } else {
                    &self.grandparent_title
                }
            }
        }
    }
}

fn history_media_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::Show => "episode",
    }
}

/// Newest-first titles, deduplicated by title, capped at `limit`
fn dedupe_recent(rows: &[HistoryRow], kind: MediaKind, limit: usize) -> Vec<String> {
    let mut titles = Vec::new();
    for row in rows {
        let title = row.seed_title(kind);
        if title.is_empty() || titles.iter().any(|t| t == title) {
            continue;
        }
        titles.push(title.to_string());
        if titles.len() == limit {
            break;
        }
    }
    titles
}

/// Titles ranked by play count, descending, capped at `limit`
fn rank_by_plays(rows: &[HistoryRow], kind: MediaKind, limit: usize) -> Vec<String> {
    let mut plays: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for row in rows {
        let title = row.seed_title(kind);
        if title.is_empty() {
            continue;
        }
        let count = plays.entry(title).or_insert(0);
        if *count == 0 {
            first_seen.push(title);
        }
        *count += 1;
    }

    let mut ranked: Vec<&str> = first_seen;
    ranked.sort_by(|a, b| plays[b].cmp(&plays[a]));
    ranked
        .into_iter()
        .take(limit)
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct TautulliClient {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
}

impl TautulliClient {
    pub fn new(http_client: HttpClient, base_url: String, api_key: String) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }

    async fn history(&self, user: &str, kind: MediaKind) -> AppResult<Vec<HistoryRow>> {
        let url = format!("{}/api/v2", self.base_url);
        let length = HISTORY_PAGE.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("cmd", "get_history"),
                ("user", user),
                ("media_type", history_media_type(kind)),
                ("order_column", "date"),
                ("order_dir", "desc"),
                ("length", length.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Tautulli API returned status {}: {}",
                status, body
            )));
        }

        let parsed: ApiResponse<HistoryPageData> = response.json().await?;
        if parsed.response.result != "success" {
            return Err(AppError::ExternalApi(format!(
                "Tautulli API returned result {:?}",
                parsed.response.result
            )));
        }
        Ok(parsed.response.data.map(|page| page.data).unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl WatchHistory for TautulliClient {
    async fn recently_watched(
        &self,
        user: &str,
        kind: MediaKind,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let rows = self.history(user, kind).await?;
        let titles = dedupe_recent(&rows, kind, limit);
        tracing::info!(user = %user, kind = %kind, titles = titles.len(), "Recent history fetched");
        Ok(titles)
    }

    async fn most_watched(
        &self,
        user: &str,
        kind: MediaKind,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let rows = self.history(user, kind).await?;
        Ok(rank_by_plays(&rows, kind, limit))
    }
}
