use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod tmdb;

/// Media category served by the recommendation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    /// Capitalized label for user-facing playlist/collection names
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Movie => "Movie",
            MediaKind::Show => "Show",
        }
    }

    /// Map a Tautulli media type ("movie", "episode", "show") to a kind
    pub fn from_history_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "movie" => Some(MediaKind::Movie),
            "episode" | "show" => Some(MediaKind::Show),
            _ => None,
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Show => write!(f, "show"),
        }
    }
}

/// Identifier for a library item in an external metadata namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalId {
    /// TMDB numeric ID (e.g. 27205)
    Tmdb(u64),
    /// IMDB ID (e.g. "tt1375666"), used when no TMDB GUID is present
    Imdb(String),
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalId::Tmdb(id) => write!(f, "{}", id),
            ExternalId::Imdb(id) => write!(f, "{}", id),
        }
    }
}

/// Resolve a Plex GUID list to an external identifier.
///
/// Prefers the `tmdb://` namespace (including the legacy `themoviedb://` agent
/// form) and falls back to `imdb://`. Resolution is per-item: nothing carries
/// over from one item's GUIDs to the next.
pub fn resolve_external_id(guids: &[String]) -> Option<ExternalId> {
    let mut imdb = None;
    for guid in guids {
        if let Some(raw) = guid
            .strip_prefix("tmdb://")
            .or_else(|| guid.strip_prefix("com.plexapp.agents.themoviedb://"))
            .or_else(|| guid.strip_prefix("themoviedb://"))
        {
            let raw = raw.split('?').next().unwrap_or(raw);
            if let Ok(id) = raw.parse::<u64>() {
                return Some(ExternalId::Tmdb(id));
            }
        }
        if imdb.is_none() {
            if let Some(raw) = guid.strip_prefix("imdb://") {
                let raw = raw.split('?').next().unwrap_or(raw);
                if !raw.is_empty() {
                    imdb = Some(ExternalId::Imdb(raw.to_string()));
                }
            }
        }
    }
    imdb
}

/// A bare library entry as listed from the media server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    pub id: ExternalId,
}

/// Descriptive attributes fetched for one catalog item.
///
/// Absent source fields normalize to these defaults at the parse boundary, so
/// nothing downstream ever sees a missing value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub overview: String,
    pub genres: Vec<String>,
    pub runtime_minutes: f64,
    pub rating: f64,
    pub release_date: String,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
}

/// One row of the working table: catalog identity joined with enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub title: String,
    pub id: ExternalId,
    pub overview: String,
    pub genres: Vec<String>,
    pub runtime_minutes: f64,
    pub rating: f64,
    pub release_date: String,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
}

impl LibraryEntry {
    pub fn from_parts(item: CatalogItem, meta: EnrichedItem) -> Self {
        Self {
            title: item.title,
            id: item.id,
            overview: meta.overview,
            genres: meta.genres,
            runtime_minutes: meta.runtime_minutes,
            rating: meta.rating,
            release_date: meta.release_date,
            cast: meta.cast,
            directors: meta.directors,
        }
    }
}

/// A single recommendation produced for one request; never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    /// Cosine similarity to the seed, in [-1, 1]
    pub score: f64,
    /// The seed title this recommendation was derived from
    pub seed: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_display() {
        assert_eq!(format!("{}", MediaKind::Movie), "movie");
        assert_eq!(format!("{}", MediaKind::Show), "show");
    }

    #[test]
    fn test_media_kind_from_history_media_type() {
        assert_eq!(
            MediaKind::from_history_media_type("movie"),
            Some(MediaKind::Movie)
        );
        assert_eq!(
            MediaKind::from_history_media_type("episode"),
            Some(MediaKind::Show)
        );
        assert_eq!(
            MediaKind::from_history_media_type("show"),
            Some(MediaKind::Show)
        );
        assert_eq!(MediaKind::from_history_media_type("track"), None);
    }

    #[test]
    fn test_resolve_prefers_tmdb_over_imdb() {
        let guids = vec![
            "imdb://tt1375666".to_string(),
            "tmdb://27205".to_string(),
            "tvdb://83268".to_string(),
        ];
        assert_eq!(resolve_external_id(&guids), Some(ExternalId::Tmdb(27205)));
    }

    #[test]
    fn test_resolve_legacy_agent_guid() {
        let guids = vec!["com.plexapp.agents.themoviedb://27205?lang=en".to_string()];
        assert_eq!(resolve_external_id(&guids), Some(ExternalId::Tmdb(27205)));
    }

    #[test]
    fn test_resolve_falls_back_to_imdb() {
        let guids = vec![
            "imdb://tt1375666".to_string(),
            "tvdb://83268".to_string(),
        ];
        assert_eq!(
            resolve_external_id(&guids),
            Some(ExternalId::Imdb("tt1375666".to_string()))
        );
    }

    #[test]
    fn test_resolve_is_independent_per_item() {
        // A fallback match on one item must not leak into the next item's
        // resolution.
        let first = vec!["imdb://tt1375666".to_string()];
        let second = vec!["tvdb://83268".to_string()];
        assert_eq!(
            resolve_external_id(&first),
            Some(ExternalId::Imdb("tt1375666".to_string()))
        );
        assert_eq!(resolve_external_id(&second), None);
    }

    #[test]
    fn test_resolve_no_guids() {
        assert_eq!(resolve_external_id(&[]), None);
    }

    #[test]
    fn test_enriched_item_defaults() {
        let item = EnrichedItem::default();
        assert_eq!(item.overview, "");
        assert!(item.genres.is_empty());
        assert_eq!(item.runtime_minutes, 0.0);
        assert_eq!(item.rating, 0.0);
        assert_eq!(item.release_date, "");
        assert!(item.cast.is_empty());
        assert!(item.directors.is_empty());
    }

    #[test]
    fn test_library_entry_from_parts() {
        let entry = LibraryEntry::from_parts(
            CatalogItem {
                title: "Inception".to_string(),
                id: ExternalId::Tmdb(27205),
            },
            EnrichedItem {
                overview: "A thief who steals corporate secrets".to_string(),
                genres: vec!["Action".to_string(), "Science Fiction".to_string()],
                runtime_minutes: 148.0,
                rating: 8.4,
                release_date: "2010-07-15".to_string(),
                cast: vec!["Leonardo DiCaprio".to_string()],
                directors: vec!["Christopher Nolan".to_string()],
            },
        );
        assert_eq!(entry.title, "Inception");
        assert_eq!(entry.id, ExternalId::Tmdb(27205));
        assert_eq!(entry.genres.len(), 2);
    }
}
