//! Recommendation orchestration.
//!
//! Resolves seed titles against the cached generation for a kind, fans out
//! nearest-neighbor queries, and merges the per-seed results into one ranked,
//! deduplicated list. A seed missing from the cached table (freshly watched
//! but not yet indexed) forces exactly one rebuild-and-retry of the whole
//! batch; seeds still unresolved after that are skipped.

use std::collections::HashSet;
use std::sync::Arc;

use crate::engine::cache::{Generation, RecommendationCache};
use crate::engine::features::FeatureBuilder;
use crate::engine::index::{SimilarityIndex, MIN_ROWS};
use crate::error::{AppError, AppResult};
use crate::models::{LibraryEntry, MediaKind, Recommendation};
use crate::services::enrich::Enricher;
use crate::services::providers::CatalogLister;

/// Neighbors fetched per seed: the self-match plus five candidates
const NEIGHBORS: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct RecommendOptions {
    /// Recommendations kept per resolved seed
    pub per_seed: usize,
    /// Final list size after merge and dedup
    pub top_n: usize,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            per_seed: 5,
            top_n: 25,
        }
    }
}

pub struct Recommender {
    catalog: Arc<dyn CatalogLister>,
    enricher: Enricher,
    builder: FeatureBuilder,
    cache: RecommendationCache,
}

impl Recommender {
    pub fn new(
        catalog: Arc<dyn CatalogLister>,
        enricher: Enricher,
        cache: RecommendationCache,
    ) -> Self {
        Self {
            catalog,
            enricher,
            builder: FeatureBuilder::default(),
            cache,
        }
    }

    /// Current generation for `kind`, rebuilding when the cache is stale or
    /// `force` is set. `None` means the catalog is empty: nothing to do.
    ///
    /// The listing call happens unconditionally; freshness is defined by the
    /// live catalog size matching the stored count marker. The per-kind lock
    /// is held across the whole sequence so concurrent requests cannot race
    /// a rebuild.
    async fn current_generation(
        &self,
        kind: MediaKind,
        force: bool,
    ) -> AppResult<Option<Generation>> {
        let _guard = self.cache.lock(kind).await;

        let items = self.catalog.list(kind).await?;
        if items.is_empty() {
            tracing::info!(kind = %kind, "Catalog is empty, nothing to index");
            return Ok(None);
        }

        if !force {
            if let Some(generation) = self.cache.load_if_fresh(kind, items.len()) {
                return Ok(Some(generation));
            }
        }

        if items.len() < MIN_ROWS {
            return Err(AppError::LibraryTooSmall {
                kind,
                count: items.len(),
            });
        }

        tracing::info!(kind = %kind, items = items.len(), "Rebuilding recommendation index");
        let enriched = self.enricher.enrich(kind, &items).await?;
        let table: Vec<LibraryEntry> = items
            .into_iter()
            .zip(enriched)
            .map(|(item, meta)| LibraryEntry::from_parts(item, meta))
            .collect();
        let matrix = self.builder.build(&table)?;
        let index = SimilarityIndex::fit(&matrix)?;
        let generation = Generation {
            item_count: table.len(),
            table,
            matrix,
            index,
        };
        self.cache.store(kind, &generation)?;
        Ok(Some(generation))
    }

    /// Produce a ranked, deduplicated recommendation list from seed titles.
    ///
    /// An empty result is a normal outcome (empty catalog, no seed resolved),
    /// never an error.
    pub async fn recommend_from_seeds(
        &self,
        seeds: &[String],
        kind: MediaKind,
        options: RecommendOptions,
    ) -> AppResult<Vec<Recommendation>> {
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let mut generation = match self.current_generation(kind, false).await? {
            Some(generation) => generation,
            None => return Ok(Vec::new()),
        };

        let mut rebuilt = false;
        'batch: loop {
            let mut merged: Vec<Recommendation> = Vec::new();

            for seed in seeds {
                let row = match generation.resolve(seed) {
                    Ok(row) => row,
                    Err(AppError::SeedNotFound(_)) if !rebuilt => {
                        // Likely freshly added to watch history but missing
                        // from the cached table: one rebuild, then retry the
                        // entire batch against the new generation.
                        tracing::info!(kind = %kind, seed = %seed, "Seed not indexed, forcing rebuild");
                        rebuilt = true;
                        generation = match self.current_generation(kind, true).await? {
                            Some(generation) => generation,
                            None => return Ok(Vec::new()),
                        };
                        continue 'batch;
                    }
                    Err(AppError::SeedNotFound(title)) => {
                        tracing::debug!(kind = %kind, seed = %title, "Seed unresolved after rebuild, skipping");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let neighbors = generation.index.query(row, NEIGHBORS)?;
                for neighbor in neighbors
                    .into_iter()
                    .filter(|n| n.row != row)
                    .take(options.per_seed)
                {
                    let entry = generation.table.get(neighbor.row).ok_or_else(|| {
                        AppError::Structural(format!(
                            "neighbor row {} missing from table of {} rows",
                            neighbor.row,
                            generation.table.len()
                        ))
                    })?;
                    merged.push(Recommendation {
                        title: entry.title.clone(),
                        score: neighbor.similarity,
                        seed: seed.clone(),
                    });
                }
            }

            // Dedup keeps the first occurrence in seed-then-rank order; the
            // stable sort preserves that order among equal scores.
            let mut seen: HashSet<String> = HashSet::new();
            merged.retain(|rec| seen.insert(rec.title.clone()));
            merged.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            merged.truncate(options.top_n);

            tracing::info!(
                kind = %kind,
                seeds = seeds.len(),
                recommendations = merged.len(),
                "Recommendation batch complete"
            );
            return Ok(merged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::models::tmdb::{
        CastMember, Credits, CrewMember, EpisodeCredits, FindResults, Genre, MovieDetails,
        TvDetails,
    };
    use crate::models::{CatalogItem, ExternalId};
    use crate::services::providers::MetadataApi;

    struct FakeCatalog {
        items: Mutex<Vec<CatalogItem>>,
        list_calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn with_movies(count: usize) -> Self {
            let items = (0..count)
                .map(|i| CatalogItem {
                    title: format!("Movie {}", i),
                    id: ExternalId::Tmdb(i as u64),
                })
                .collect();
            Self {
                items: Mutex::new(items),
                list_calls: AtomicUsize::new(0),
            }
        }

        fn set_items(&self, items: Vec<CatalogItem>) {
            *self.items.lock().unwrap() = items;
        }
    }

    #[async_trait::async_trait]
    impl CatalogLister for FakeCatalog {
        async fn list(&self, _kind: MediaKind) -> AppResult<Vec<CatalogItem>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.lock().unwrap().clone())
        }
    }

    /// Deterministic metadata keyed off the TMDB id so feature vectors differ
    struct FakeMetadata {
        detail_calls: AtomicUsize,
    }

    impl FakeMetadata {
        fn new() -> Self {
            Self {
                detail_calls: AtomicUsize::new(0),
            }
        }
    }

    const WORDS: &[&str] = &[
        "heist", "dream", "space", "murder", "romance", "robot", "desert", "ocean",
    ];

    #[async_trait::async_trait]
    impl MetadataApi for FakeMetadata {
        async fn movie_details(&self, tmdb_id: u64) -> AppResult<MovieDetails> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            let i = tmdb_id as usize;
            Ok(MovieDetails {
                genres: vec![Genre {
                    name: ["Action", "Drama", "Comedy"][i % 3].to_string(),
                }],
                overview: Some(format!(
                    "story about {} and {}",
                    WORDS[i % WORDS.len()],
                    WORDS[(i + 3) % WORDS.len()]
                )),
                runtime: Some(90 + (i as u32 % 60)),
                vote_average: Some((i % 10) as f64),
                release_date: Some(format!("{}-06-01", 1990 + i % 30)),
            })
        }

        async fn movie_credits(&self, tmdb_id: u64) -> AppResult<Credits> {
            let i = tmdb_id as usize;
            Ok(Credits {
                cast: vec![CastMember {
                    name: format!("Actor {}", i % 4),
                }],
                crew: vec![CrewMember {
                    name: format!("Director {}", i % 3),
                    job: "Director".to_string(),
                    department: "Directing".to_string(),
                }],
            })
        }

        async fn tv_details(&self, _tmdb_id: u64) -> AppResult<TvDetails> {
            Ok(TvDetails::default())
        }

        async fn episode_credits(
            &self,
            _tmdb_id: u64,
            _season: u32,
            _episode: u32,
        ) -> AppResult<EpisodeCredits> {
            Ok(EpisodeCredits::default())
        }

        async fn find_by_imdb(&self, _imdb_id: &str, _kind: MediaKind) -> AppResult<FindResults> {
            Ok(FindResults::default())
        }
    }

    struct Fixture {
        recommender: Recommender,
        catalog: Arc<FakeCatalog>,
        metadata: Arc<FakeMetadata>,
        _cache_dir: tempfile::TempDir,
    }

    fn fixture(movie_count: usize) -> Fixture {
        let catalog = Arc::new(FakeCatalog::with_movies(movie_count));
        let metadata = Arc::new(FakeMetadata::new());
        let cache_dir = tempfile::tempdir().unwrap();
        let recommender = Recommender::new(
            catalog.clone(),
            Enricher::new(metadata.clone()),
            RecommendationCache::new(cache_dir.path()),
        );
        Fixture {
            recommender,
            catalog,
            metadata,
            _cache_dir: cache_dir,
        }
    }

    fn seeds(titles: &[&str]) -> Vec<String> {
        titles.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_single_seed() {
        let fix = fixture(20);
        let recs = fix
            .recommender
            .recommend_from_seeds(&seeds(&["Movie 1"]), MediaKind::Movie, Default::default())
            .await
            .unwrap();

        assert!(!recs.is_empty());
        assert!(recs.len() <= 5);
        assert!(recs.iter().all(|r| r.title != "Movie 1"));
        assert!(recs.iter().all(|r| r.seed == "Movie 1"));
        for pair in recs.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_duplicate_seeds_never_duplicate_titles() {
        let fix = fixture(20);
        let recs = fix
            .recommender
            .recommend_from_seeds(
                &seeds(&["Movie 1", "Movie 1", "Movie 4"]),
                MediaKind::Movie,
                Default::default(),
            )
            .await
            .unwrap();

        let mut titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        titles.sort_unstable();
        titles.dedup();
        assert_eq!(titles.len(), recs.len());
    }

    #[tokio::test]
    async fn test_missing_seed_is_skipped_after_one_rebuild() {
        let fix = fixture(20);
        let recs = fix
            .recommender
            .recommend_from_seeds(
                &seeds(&["Movie 1", "Nonexistent Title XYZ"]),
                MediaKind::Movie,
                Default::default(),
            )
            .await
            .unwrap();

        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.seed == "Movie 1"));
        // One initial listing plus exactly one forced rebuild, no unbounded
        // retry loop.
        assert_eq!(fix.catalog.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_enrichment() {
        let fix = fixture(12);
        let options = RecommendOptions::default();
        fix.recommender
            .recommend_from_seeds(&seeds(&["Movie 1"]), MediaKind::Movie, options)
            .await
            .unwrap();
        assert_eq!(fix.metadata.detail_calls.load(Ordering::SeqCst), 12);

        fix.recommender
            .recommend_from_seeds(&seeds(&["Movie 2"]), MediaKind::Movie, options)
            .await
            .unwrap();
        // Second call reused the persisted generation
        assert_eq!(fix.metadata.detail_calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_catalog_growth_triggers_rebuild() {
        let fix = fixture(12);
        let options = RecommendOptions::default();
        fix.recommender
            .recommend_from_seeds(&seeds(&["Movie 1"]), MediaKind::Movie, options)
            .await
            .unwrap();

        let mut items = fix.catalog.items.lock().unwrap().clone();
        items.push(CatalogItem {
            title: "Movie 12".to_string(),
            id: ExternalId::Tmdb(12),
        });
        fix.catalog.set_items(items);

        fix.recommender
            .recommend_from_seeds(&seeds(&["Movie 12"]), MediaKind::Movie, options)
            .await
            .unwrap();
        // 12 enriched on the first build, 13 on the rebuild
        assert_eq!(fix.metadata.detail_calls.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn test_renamed_title_resolves_after_forced_rebuild() {
        let fix = fixture(10);
        let options = RecommendOptions::default();
        fix.recommender
            .recommend_from_seeds(&seeds(&["Movie 1"]), MediaKind::Movie, options)
            .await
            .unwrap();

        // Same catalog size, one title changed: the count-based freshness
        // check passes, so only the in-batch rebuild can pick this up.
        let mut items = fix.catalog.items.lock().unwrap().clone();
        items[9].title = "Renamed Movie".to_string();
        fix.catalog.set_items(items);

        let recs = fix
            .recommender
            .recommend_from_seeds(&seeds(&["Renamed Movie"]), MediaKind::Movie, options)
            .await
            .unwrap();
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.seed == "Renamed Movie"));
    }

    #[tokio::test]
    async fn test_no_seeds_resolved_is_empty_not_error() {
        let fix = fixture(8);
        let recs = fix
            .recommender
            .recommend_from_seeds(
                &seeds(&["Unknown A", "Unknown B"]),
                MediaKind::Movie,
                Default::default(),
            )
            .await
            .unwrap();
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_is_empty_not_error() {
        let fix = fixture(0);
        let recs = fix
            .recommender
            .recommend_from_seeds(&seeds(&["Movie 1"]), MediaKind::Movie, Default::default())
            .await
            .unwrap();
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_tiny_library_is_an_error() {
        let fix = fixture(3);
        let result = fix
            .recommender
            .recommend_from_seeds(&seeds(&["Movie 1"]), MediaKind::Movie, Default::default())
            .await;
        assert!(matches!(result, Err(AppError::LibraryTooSmall { .. })));
    }

    #[tokio::test]
    async fn test_top_n_truncation() {
        let fix = fixture(30);
        let recs = fix
            .recommender
            .recommend_from_seeds(
                &seeds(&["Movie 0", "Movie 1", "Movie 2", "Movie 3", "Movie 4"]),
                MediaKind::Movie,
                RecommendOptions {
                    per_seed: 5,
                    top_n: 8,
                },
            )
            .await
            .unwrap();
        assert!(recs.len() <= 8);
    }
}
