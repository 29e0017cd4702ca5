//! Metadata enrichment.
//!
//! Produces exactly one `EnrichedItem` per catalog row, in input order.
//! Per-item provider failures degrade that row to defaults instead of
//! aborting the batch: dropping a row would break alignment with the feature
//! matrix built downstream. Calls run sequentially; a rebuild is an offline
//! batch job and the enrichment provider is the bottleneck either way.

use std::sync::Arc;

use crate::error::AppResult;
use crate::models::tmdb::{Credits, EpisodeCredits, MovieDetails, TvDetails};
use crate::models::{CatalogItem, EnrichedItem, ExternalId, MediaKind};
use crate::services::providers::MetadataApi;

/// Billed cast members kept per item
const TOP_CAST: usize = 5;

pub struct Enricher {
    metadata: Arc<dyn MetadataApi>,
}

impl Enricher {
    pub fn new(metadata: Arc<dyn MetadataApi>) -> Self {
        Self { metadata }
    }

    /// Enrich every item, preserving order and row alignment.
    pub async fn enrich(
        &self,
        kind: MediaKind,
        items: &[CatalogItem],
    ) -> AppResult<Vec<EnrichedItem>> {
        let mut enriched = Vec::with_capacity(items.len());
        for item in items {
            let row = match self.enrich_one(kind, item).await {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(
                        title = %item.title,
                        id = %item.id,
                        error = %e,
                        "Enrichment failed, using defaults"
                    );
                    EnrichedItem::default()
                }
            };
            enriched.push(row);
        }

        tracing::info!(kind = %kind, items = enriched.len(), "Enrichment complete");
        Ok(enriched)
    }

    async fn enrich_one(&self, kind: MediaKind, item: &CatalogItem) -> AppResult<EnrichedItem> {
        let tmdb_id = match self.native_id(kind, &item.id).await? {
            Some(id) => id,
            None => {
                tracing::warn!(title = %item.title, id = %item.id, "No TMDB match, using defaults");
                return Ok(EnrichedItem::default());
            }
        };

        match kind {
            MediaKind::Movie => self.enrich_movie(tmdb_id).await,
            MediaKind::Show => self.enrich_show(tmdb_id).await,
        }
    }

    async fn native_id(&self, kind: MediaKind, id: &ExternalId) -> AppResult<Option<u64>> {
        match id {
            ExternalId::Tmdb(tmdb_id) => Ok(Some(*tmdb_id)),
            ExternalId::Imdb(imdb_id) => {
                let results = self.metadata.find_by_imdb(imdb_id, kind).await?;
                let found = match kind {
                    MediaKind::Movie => results.movie_results.first(),
                    MediaKind::Show => results.tv_results.first(),
                };
                Ok(found.map(|r| r.id))
            }
        }
    }

    async fn enrich_movie(&self, tmdb_id: u64) -> AppResult<EnrichedItem> {
        let details: MovieDetails = self.metadata.movie_details(tmdb_id).await?;
        let credits: Credits = self.metadata.movie_credits(tmdb_id).await?;

        let cast = credits
            .cast
            .iter()
            .take(TOP_CAST)
            .filter(|member| !member.name.is_empty())
            .map(|member| member.name.clone())
            .collect();
        let directors = credits
            .crew
            .iter()
            .filter(|member| member.job == "Director")
            .map(|member| member.name.clone())
            .collect();

        Ok(EnrichedItem {
            overview: details.overview.unwrap_or_default(),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            runtime_minutes: details.runtime.unwrap_or(0) as f64,
            rating: details.vote_average.unwrap_or(0.0),
            release_date: details.release_date.unwrap_or_default(),
            cast,
            directors,
        })
    }

    async fn enrich_show(&self, tmdb_id: u64) -> AppResult<EnrichedItem> {
        let details: TvDetails = self.metadata.tv_details(tmdb_id).await?;

        // Season 1 / episode 1 credits stand in for series-level billing.
        // A malformed or missing payload degrades to empty lists.
        let (cast, directors) = match self.metadata.episode_credits(tmdb_id, 1, 1).await {
            Ok(credits) => show_people(credits),
            Err(e) => {
                tracing::debug!(tmdb_id, error = %e, "Episode credits unavailable");
                (Vec::new(), Vec::new())
            }
        };

        Ok(EnrichedItem {
            overview: details.overview.unwrap_or_default(),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            runtime_minutes: details.episode_run_time.first().copied().unwrap_or(0) as f64,
            rating: details.vote_average.unwrap_or(0.0),
            release_date: details.first_air_date.unwrap_or_default(),
            cast,
            directors,
        })
    }
}

fn show_people(credits: EpisodeCredits) -> (Vec<String>, Vec<String>) {
    // Guest stars fill in when the episode has no regular cast list
    let billed = if credits.cast.is_empty() {
        &credits.guest_stars
    } else {
        &credits.cast
    };
    let cast: Vec<String> = billed
        .iter()
        .take(TOP_CAST)
        .filter(|member| !member.name.is_empty())
        .map(|member| member.name.clone())
        .collect();
    let directors: Vec<String> = credits
        .crew
        .iter()
        .filter(|member| member.department == "Directing")
        .map(|member| member.name.clone())
        .collect();
    (cast, directors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::tmdb::{CastMember, CrewMember, FindResult, FindResults, Genre};
    use crate::services::providers::MockMetadataApi;

    fn movie_item(title: &str, tmdb_id: u64) -> CatalogItem {
        CatalogItem {
            title: title.to_string(),
            id: ExternalId::Tmdb(tmdb_id),
        }
    }

    fn sample_details() -> MovieDetails {
        MovieDetails {
            genres: vec![Genre {
                name: "Action".to_string(),
            }],
            overview: Some("A thief who steals corporate secrets".to_string()),
            runtime: Some(148),
            vote_average: Some(8.4),
            release_date: Some("2010-07-15".to_string()),
        }
    }

    fn sample_credits() -> Credits {
        Credits {
            cast: (0..8)
                .map(|i| CastMember {
                    name: format!("Actor {}", i),
                })
                .collect(),
            crew: vec![
                CrewMember {
                    name: "Christopher Nolan".to_string(),
                    job: "Director".to_string(),
                    department: "Directing".to_string(),
                },
                CrewMember {
                    name: "Hans Zimmer".to_string(),
                    job: "Original Music Composer".to_string(),
                    department: "Sound".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_movie_enrichment() {
        let mut api = MockMetadataApi::new();
        api.expect_movie_details()
            .returning(|_| Ok(sample_details()));
        api.expect_movie_credits()
            .returning(|_| Ok(sample_credits()));

        let enricher = Enricher::new(Arc::new(api));
        let rows = enricher
            .enrich(MediaKind::Movie, &[movie_item("Inception", 27205)])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].genres, vec!["Action"]);
        assert_eq!(rows[0].runtime_minutes, 148.0);
        assert_eq!(rows[0].cast.len(), 5);
        assert_eq!(rows[0].directors, vec!["Christopher Nolan"]);
    }

    #[tokio::test]
    async fn test_per_item_failure_keeps_row_alignment() {
        let mut api = MockMetadataApi::new();
        api.expect_movie_details().returning(|id| {
            if id == 2 {
                Err(AppError::ExternalApi("boom".to_string()))
            } else {
                Ok(sample_details())
            }
        });
        api.expect_movie_credits()
            .returning(|_| Ok(sample_credits()));

        let enricher = Enricher::new(Arc::new(api));
        let items = vec![
            movie_item("First", 1),
            movie_item("Second", 2),
            movie_item("Third", 3),
        ];
        let rows = enricher.enrich(MediaKind::Movie, &items).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], EnrichedItem::default());
        assert_eq!(rows[2].runtime_minutes, 148.0);
    }

    #[tokio::test]
    async fn test_imdb_fallback_resolution() {
        let mut api = MockMetadataApi::new();
        api.expect_find_by_imdb().returning(|_, _| {
            Ok(FindResults {
                movie_results: vec![FindResult { id: 27205 }],
                tv_results: vec![],
            })
        });
        api.expect_movie_details()
            .returning(|_| Ok(sample_details()));
        api.expect_movie_credits()
            .returning(|_| Ok(sample_credits()));

        let enricher = Enricher::new(Arc::new(api));
        let items = vec![CatalogItem {
            title: "Inception".to_string(),
            id: ExternalId::Imdb("tt1375666".to_string()),
        }];
        let rows = enricher.enrich(MediaKind::Movie, &items).await.unwrap();
        assert_eq!(rows[0].rating, 8.4);
    }

    #[tokio::test]
    async fn test_unresolvable_imdb_id_defaults() {
        let mut api = MockMetadataApi::new();
        api.expect_find_by_imdb()
            .returning(|_, _| Ok(FindResults::default()));

        let enricher = Enricher::new(Arc::new(api));
        let items = vec![CatalogItem {
            title: "Obscure".to_string(),
            id: ExternalId::Imdb("tt0000001".to_string()),
        }];
        let rows = enricher.enrich(MediaKind::Movie, &items).await.unwrap();
        assert_eq!(rows[0], EnrichedItem::default());
    }

    #[tokio::test]
    async fn test_show_enrichment_with_guest_star_fallback() {
        let mut api = MockMetadataApi::new();
        api.expect_tv_details().returning(|_| {
            Ok(TvDetails {
                genres: vec![Genre {
                    name: "Crime".to_string(),
                }],
                overview: Some("A chemistry teacher turns to crime".to_string()),
                episode_run_time: vec![47, 45],
                vote_average: Some(8.9),
                first_air_date: Some("2008-01-20".to_string()),
            })
        });
        api.expect_episode_credits().returning(|_, _, _| {
            Ok(EpisodeCredits {
                cast: vec![],
                guest_stars: vec![CastMember {
                    name: "Guest Star".to_string(),
                }],
                crew: vec![CrewMember {
                    name: "Vince Gilligan".to_string(),
                    job: "Director".to_string(),
                    department: "Directing".to_string(),
                }],
            })
        });

        let enricher = Enricher::new(Arc::new(api));
        let items = vec![CatalogItem {
            title: "Breaking Bad".to_string(),
            id: ExternalId::Tmdb(1396),
        }];
        let rows = enricher.enrich(MediaKind::Show, &items).await.unwrap();

        assert_eq!(rows[0].runtime_minutes, 47.0);
        assert_eq!(rows[0].cast, vec!["Guest Star"]);
        assert_eq!(rows[0].directors, vec!["Vince Gilligan"]);
    }

    #[tokio::test]
    async fn test_show_missing_episode_credits_degrades() {
        let mut api = MockMetadataApi::new();
        api.expect_tv_details().returning(|_| Ok(TvDetails::default()));
        api.expect_episode_credits()
            .returning(|_, _, _| Err(AppError::ExternalApi("404".to_string())));

        let enricher = Enricher::new(Arc::new(api));
        let items = vec![CatalogItem {
            title: "Short Run".to_string(),
            id: ExternalId::Tmdb(999),
        }];
        let rows = enricher.enrich(MediaKind::Show, &items).await.unwrap();

        assert!(rows[0].cast.is_empty());
        assert!(rows[0].directors.is_empty());
        assert_eq!(rows[0].runtime_minutes, 0.0);
    }
}
