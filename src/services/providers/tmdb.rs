//! TMDB metadata provider.
//!
//! Thin wrapper over the TMDB v3 REST API. All responses deserialize into
//! the defaulting payload structs in `models::tmdb`, so a sparse TMDB record
//! never surfaces as missing fields downstream.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

use crate::{
    error::{AppError, AppResult},
    models::tmdb::{Credits, EpisodeCredits, FindResults, MovieDetails, TvDetails},
    models::MediaKind,
    services::providers::MetadataApi,
};

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TmdbClient {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", "en-US")])
            .query(extra)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl MetadataApi for TmdbClient {
    async fn movie_details(&self, tmdb_id: u64) -> AppResult<MovieDetails> {
        self.get_json(&format!("/movie/{}", tmdb_id), &[]).await
    }

    async fn movie_credits(&self, tmdb_id: u64) -> AppResult<Credits> {
        self.get_json(&format!("/movie/{}/credits", tmdb_id), &[])
            .await
    }

    async fn tv_details(&self, tmdb_id: u64) -> AppResult<TvDetails> {
        self.get_json(&format!("/tv/{}", tmdb_id), &[]).await
    }

    async fn episode_credits(
        &self,
        tmdb_id: u64,
        season: u32,
        episode: u32,
    ) -> AppResult<EpisodeCredits> {
        self.get_json(
            &format!("/tv/{}/season/{}/episode/{}/credits", tmdb_id, season, episode),
            &[],
        )
        .await
    }

    async fn find_by_imdb(&self, imdb_id: &str, kind: MediaKind) -> AppResult<FindResults> {
        tracing::debug!(imdb_id = %imdb_id, kind = %kind, "Resolving IMDB id via TMDB find");
        self.get_json(
            &format!("/find/{}", imdb_id),
            &[("external_source", "imdb_id")],
        )
        .await
    }
}
