//! Exact cosine k-nearest-neighbor index.
//!
//! Library sizes run from hundreds to low thousands of items, so a brute-force
//! scan over the dense matrix beats any approximate structure. The index is
//! immutable once fitted and is rebuilt wholesale with its generation.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Minimum rows to fit: one self-match plus five usable neighbors
pub const MIN_ROWS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub row: usize,
    pub similarity: f64,
}

/// Read-only nearest-neighbor structure over one feature matrix generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityIndex {
    /// Row-l2-normalized copy of the feature matrix. Zero rows stay zero and
    /// score 0 against everything, including themselves.
    normalized: Array2<f64>,
}

impl SimilarityIndex {
    pub fn fit(matrix: &Array2<f64>) -> AppResult<Self> {
        if matrix.nrows() < MIN_ROWS {
            return Err(AppError::InvalidInput(format!(
                "similarity index needs at least {} rows, got {}",
                MIN_ROWS,
                matrix.nrows()
            )));
        }

        let mut normalized = matrix.clone();
        for mut row in normalized.rows_mut() {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }
        Ok(Self { normalized })
    }

    pub fn len(&self) -> usize {
        self.normalized.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.nrows() == 0
    }

    /// The `k` rows most similar to `row` under cosine similarity, ordered by
    /// decreasing similarity. The query row itself ranks first (similarity
    /// 1.0 for any non-zero vector); ties resolve query-row-first, then by
    /// row order.
    pub fn query(&self, row: usize, k: usize) -> AppResult<Vec<Neighbor>> {
        if row >= self.normalized.nrows() {
            return Err(AppError::Structural(format!(
                "query row {} out of range for index of {} rows",
                row,
                self.normalized.nrows()
            )));
        }

        let seed = self.normalized.row(row);
        let mut neighbors: Vec<Neighbor> = self
            .normalized
            .rows()
            .into_iter()
            .enumerate()
            .map(|(candidate, other)| Neighbor {
                row: candidate,
                similarity: seed.dot(&other),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.row != row).cmp(&(b.row != row)))
                .then_with(|| a.row.cmp(&b.row))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}
