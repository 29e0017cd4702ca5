//! Feature vectorization.
//!
//! Turns the enriched working table into one dense numeric matrix, one row per
//! item: genre/cast/director membership columns, three min-max-scaled numeric
//! columns, and a fixed-width dense embedding of the overview text.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use ndarray::{concatenate, Array2, Axis};

use crate::engine::svd::TruncatedSvd;
use crate::engine::tfidf::TfidfVectorizer;
use crate::error::{AppError, AppResult};
use crate::models::LibraryEntry;

/// Year substituted when a release date is empty or unparseable
const FALLBACK_YEAR: i32 = 2000;

pub struct FeatureBuilder {
    vocab_cap: usize,
    text_dims: usize,
    svd_seed: u64,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self {
            vocab_cap: 2000,
            text_dims: 100,
            svd_seed: 42,
        }
    }
}

impl FeatureBuilder {
    /// Build the feature matrix for `table`. Rows align 1:1 with the input.
    ///
    /// Column layout is vocabulary-dependent and therefore only meaningful
    /// within a single build; callers must never mix matrices across builds.
    pub fn build(&self, table: &[LibraryEntry]) -> AppResult<Array2<f64>> {
        if table.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot build features for an empty table".to_string(),
            ));
        }

        let genres = binarize(table, |entry| entry.genres.as_slice());
        let cast = binarize(table, |entry| entry.cast.as_slice());
        let directors = binarize(table, |entry| entry.directors.as_slice());
        let numeric = self.numeric_block(table);

        let overviews: Vec<String> = table.iter().map(|entry| entry.overview.clone()).collect();
        let weighted = TfidfVectorizer::new(self.vocab_cap).fit_transform(&overviews);
        let text = TruncatedSvd::new(self.text_dims, self.svd_seed).fit_transform(&weighted);

        concatenate(
            Axis(1),
            &[
                genres.view(),
                cast.view(),
                directors.view(),
                numeric.view(),
                text.view(),
            ],
        )
        .map_err(|e| AppError::Internal(format!("feature block concatenation failed: {}", e)))
    }

    /// Runtime, rating, and release year, each min-max scaled to [0, 1].
    fn numeric_block(&self, table: &[LibraryEntry]) -> Array2<f64> {
        let n = table.len();
        let mut block = Array2::<f64>::zeros((n, 3));
        for (row, entry) in table.iter().enumerate() {
            block[[row, 0]] = entry.runtime_minutes;
            block[[row, 1]] = entry.rating;
            block[[row, 2]] = release_year(&entry.release_date) as f64;
        }
        for mut column in block.columns_mut() {
            let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            if span > 0.0 {
                column.mapv_inplace(|v| (v - min) / span);
            } else {
                // Constant column: no spread to scale, map to 0.0
                column.fill(0.0);
            }
        }
        block
    }
}

/// One membership column per distinct label observed in the table, in
/// alphabetical order. A 1.0 entry means the item carries that label.
fn binarize(table: &[LibraryEntry], labels: fn(&LibraryEntry) -> &[String]) -> Array2<f64> {
    let vocabulary: BTreeSet<&str> = table
        .iter()
        .flat_map(|entry| labels(entry).iter().map(String::as_str))
        .collect();
    let columns: Vec<&str> = vocabulary.into_iter().collect();

    let mut block = Array2::<f64>::zeros((table.len(), columns.len()));
    for (row, entry) in table.iter().enumerate() {
        for label in labels(entry) {
            if let Ok(col) = columns.binary_search(&label.as_str()) {
                block[[row, col]] = 1.0;
            }
        }
    }
    block
}

fn release_year(date: &str) -> i32 {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.year())
        .unwrap_or(FALLBACK_YEAR)
}
