//! External collaborator abstractions.
//!
//! The engine only sees these traits; the Plex, TMDB, and Tautulli clients
//! are thin I/O wrappers behind them. Keeping the seams here lets the
//! orchestrator and enricher run against in-memory fakes in tests.

use crate::{
    error::AppResult,
    models::tmdb::{Credits, EpisodeCredits, FindResults, MovieDetails, TvDetails},
    models::{CatalogItem, MediaKind},
};

pub mod plex;
pub mod tautulli;
pub mod tmdb;

/// Lists the media server's catalog for one kind.
///
/// Every returned item carries a resolved external identifier; items the
/// server cannot identify are dropped (with a log) before they reach the
/// enrichment pipeline.
#[async_trait::async_trait]
pub trait CatalogLister: Send + Sync {
    async fn list(&self, kind: MediaKind) -> AppResult<Vec<CatalogItem>>;
}

/// Metadata enrichment provider (TMDB-shaped).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataApi: Send + Sync {
    async fn movie_details(&self, tmdb_id: u64) -> AppResult<MovieDetails>;

    async fn movie_credits(&self, tmdb_id: u64) -> AppResult<Credits>;

    async fn tv_details(&self, tmdb_id: u64) -> AppResult<TvDetails>;

    async fn episode_credits(
        &self,
        tmdb_id: u64,
        season: u32,
        episode: u32,
    ) -> AppResult<EpisodeCredits>;

    /// Resolve an IMDB id to the provider's native id for `kind`
    async fn find_by_imdb(&self, imdb_id: &str, kind: MediaKind) -> AppResult<FindResults>;
}

/// Watch-history provider (Tautulli-shaped).
#[async_trait::async_trait]
pub trait WatchHistory: Send + Sync {
    /// Titles the user watched most recently, newest first, deduplicated
    async fn recently_watched(
        &self,
        user: &str,
        kind: MediaKind,
        limit: usize,
    ) -> AppResult<Vec<String>>;

    /// Titles ranked by play count, descending
    async fn most_watched(
        &self,
        user: &str,
        kind: MediaKind,
        limit: usize,
    ) -> AppResult<Vec<String>>;
}

/// Pushes a ranked title list back into the media server.
///
/// Fire-and-forget from the engine's perspective: failures here are logged
/// by callers and never feed back into recommendation results.
#[async_trait::async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, user: &str, kind: MediaKind, titles: &[String]) -> AppResult<()>;
}
