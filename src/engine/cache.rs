//! Persisted cache of recommendation generations.
//!
//! One directory per media kind holds the four artifacts of a generation:
//! the enriched table, the feature matrix, the serialized similarity index,
//! and the item-count marker. The four are only ever replaced together --
//! column layout is vocabulary-dependent, so mixing artifacts across builds
//! would silently corrupt every query. Writes stage into a temp directory
//! and swap in, so a crash mid-rebuild leaves the previous generation intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tokio::sync::{Mutex, MutexGuard};

use crate::engine::index::SimilarityIndex;
use crate::error::{AppError, AppResult};
use crate::models::{LibraryEntry, MediaKind};

const TABLE_FILE: &str = "table.json";
const MATRIX_FILE: &str = "matrix.json";
const INDEX_FILE: &str = "index.json";
const COUNT_FILE: &str = "count.txt";

/// One complete, internally consistent build for a media kind
#[derive(Debug, Clone)]
pub struct Generation {
    pub table: Vec<LibraryEntry>,
    pub matrix: Array2<f64>,
    pub index: SimilarityIndex,
    pub item_count: usize,
}

impl Generation {
    /// Resolve a seed title to its row by exact match.
    pub fn resolve(&self, title: &str) -> AppResult<usize> {
        self.table
            .iter()
            .position(|entry| entry.title == title)
            .ok_or_else(|| AppError::SeedNotFound(title.to_string()))
    }
}

/// File-backed store of one generation per media kind
pub struct RecommendationCache {
    root: PathBuf,
    movie_lock: Mutex<()>,
    show_lock: Mutex<()>,
}

impl RecommendationCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            movie_lock: Mutex::new(()),
            show_lock: Mutex::new(()),
        }
    }

    /// Serializes rebuilds per kind. Callers hold the guard across the
    /// list-validate-rebuild sequence so a reader never observes a
    /// half-written generation.
    pub async fn lock(&self, kind: MediaKind) -> MutexGuard<'_, ()> {
        match kind {
            MediaKind::Movie => self.movie_lock.lock().await,
            MediaKind::Show => self.show_lock.lock().await,
        }
    }

    /// Load the persisted generation for `kind` if it matches the live
    /// catalog size. Missing, unreadable, or internally disagreeing artifacts
    /// all count as a stale cache, never an error.
    pub fn load_if_fresh(&self, kind: MediaKind, live_count: usize) -> Option<Generation> {
        let dir = self.kind_dir(kind);

        let stored_count: usize = fs::read_to_string(dir.join(COUNT_FILE))
            .ok()?
            .trim()
            .parse()
            .ok()?;
        if stored_count != live_count {
            tracing::info!(
                kind = %kind,
                stored = stored_count,
                live = live_count,
                "Catalog size changed, cache invalidated"
            );
            return None;
        }

        let loaded = (|| -> AppResult<Generation> {
            let table: Vec<LibraryEntry> =
                serde_json::from_str(&fs::read_to_string(dir.join(TABLE_FILE))?)?;
            let matrix: Array2<f64> =
                serde_json::from_str(&fs::read_to_string(dir.join(MATRIX_FILE))?)?;
            let index: SimilarityIndex =
                serde_json::from_str(&fs::read_to_string(dir.join(INDEX_FILE))?)?;
            Ok(Generation {
                table,
                matrix,
                index,
                item_count: stored_count,
            })
        })();

        let generation = match loaded {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Unreadable cache generation, rebuilding");
                return None;
            }
        };

        let rows_agree = generation.table.len() == stored_count
            && generation.matrix.nrows() == stored_count
            && generation.index.len() == stored_count;
        if !rows_agree {
            tracing::warn!(
                kind = %kind,
                table = generation.table.len(),
                matrix = generation.matrix.nrows(),
                index = generation.index.len(),
                "Cache artifacts disagree on row count, rebuilding"
            );
            return None;
        }

        tracing::debug!(kind = %kind, items = stored_count, "Cache hit");
        Some(generation)
    }

    /// Persist a generation, replacing all four artifacts together.
    pub fn store(&self, kind: MediaKind, generation: &Generation) -> AppResult<()> {
        fs::create_dir_all(&self.root)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        write_json(&staging.path().join(TABLE_FILE), &generation.table)?;
        write_json(&staging.path().join(MATRIX_FILE), &generation.matrix)?;
        write_json(&staging.path().join(INDEX_FILE), &generation.index)?;
        let mut count = fs::File::create(staging.path().join(COUNT_FILE))?;
        write!(count, "{}", generation.item_count)?;
        count.sync_all()?;

        let target = self.kind_dir(kind);
        let displaced = self.root.join(format!(".stale-{}", kind));
        if displaced.exists() {
            fs::remove_dir_all(&displaced)?;
        }
        if target.exists() {
            fs::rename(&target, &displaced)?;
        }
        fs::rename(staging.into_path(), &target)?;
        if displaced.exists() {
            let _ = fs::remove_dir_all(&displaced);
        }

        tracing::info!(kind = %kind, items = generation.item_count, "Cache generation stored");
        Ok(())
    }

    fn kind_dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(kind.to_string())
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer(&file, value)?;
    file.sync_all()?;
    Ok(())
}
