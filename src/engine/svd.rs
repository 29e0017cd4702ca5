//! Seeded randomized truncated SVD.
//!
//! Projects the sparse term-weight matrix down to a fixed-width dense block.
//! The randomized range finder (Halko et al.) keeps the decomposition cheap
//! for library-sized inputs; the ChaCha-seeded sampling makes repeated builds
//! on identical input bit-for-bit reproducible.

use std::cmp::Ordering;

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const OVERSAMPLE: usize = 10;
const POWER_ITERATIONS: usize = 2;

pub struct TruncatedSvd {
    components: usize,
    seed: u64,
}

impl TruncatedSvd {
    pub fn new(components: usize, seed: u64) -> Self {
        Self { components, seed }
    }

    /// Decompose `a` and return the row embedding `U * Sigma`, always
    /// `components` wide. When the effective rank is below `components`, the
    /// trailing columns are zero so the block width stays fixed.
    pub fn fit_transform(&self, a: &Array2<f64>) -> Array2<f64> {
        let (n, m) = a.dim();
        let k = self.components.min(n).min(m);
        let mut out = Array2::<f64>::zeros((n, self.components));
        if k == 0 {
            return out;
        }

        let sketch = (k + OVERSAMPLE).min(n).min(m);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let omega = Array2::from_shape_fn((m, sketch), |_| rng.gen::<f64>() * 2.0 - 1.0);

        // Range finder with power iterations for spectral accuracy
        let mut q = a.dot(&omega);
        for _ in 0..POWER_ITERATIONS {
            orthonormalize_columns(&mut q);
            q = a.dot(&a.t().dot(&q));
        }
        orthonormalize_columns(&mut q);

        // Project, then solve the small symmetric eigenproblem of B * B^T
        let b = q.t().dot(a);
        let gram = b.dot(&b.t());
        let (eigvals, eigvecs) = symmetric_eigen(&gram);

        let qu = q.dot(&eigvecs);
        for j in 0..k {
            let sigma = eigvals[j].max(0.0).sqrt();
            for i in 0..n {
                out[[i, j]] = qu[[i, j]] * sigma;
            }
        }
        out
    }
}

/// Modified Gram-Schmidt over columns. Rank-deficient columns collapse to
/// zero instead of amplifying noise.
fn orthonormalize_columns(m: &mut Array2<f64>) {
    for j in 0..m.ncols() {
        for i in 0..j {
            let proj = m.column(i).dot(&m.column(j));
            let basis = m.column(i).to_owned();
            m.column_mut(j).zip_mut_with(&basis, |x, &b| *x -= proj * b);
        }
        let norm = m.column(j).dot(&m.column(j)).sqrt();
        if norm > 1e-12 {
            m.column_mut(j).mapv_inplace(|v| v / norm);
        } else {
            m.column_mut(j).fill(0.0);
        }
    }
}

/// Cyclic Jacobi eigendecomposition of a small symmetric matrix.
/// Returns eigenvalues in descending order with matching eigenvector columns.
fn symmetric_eigen(c: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = c.nrows();
    let mut a = c.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..100 {
        let mut off_diagonal = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diagonal.sqrt() < 1e-12 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() < 1e-15 {
                    continue;
                }
                let tau = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let cos = 1.0 / (1.0 + t * t).sqrt();
                let sin = t * cos;

                for i in 0..n {
                    let aip = a[[i, p]];
                    let aiq = a[[i, q]];
                    a[[i, p]] = cos * aip - sin * aiq;
                    a[[i, q]] = sin * aip + cos * aiq;
                }
                for i in 0..n {
                    let api = a[[p, i]];
                    let aqi = a[[q, i]];
                    a[[p, i]] = cos * api - sin * aqi;
                    a[[q, i]] = sin * api + cos * aqi;
                }
                for i in 0..n {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = cos * vip - sin * viq;
                    v[[i, q]] = sin * vip + cos * viq;
                }
            }
        }
    }

    let diag: Vec<f64> = (0..n).map(|i| a[[i, i]]).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| diag[j].partial_cmp(&diag[i]).unwrap_or(Ordering::Equal));

    let eigvals: Vec<f64> = order.iter().map(|&i| diag[i]).collect();
    let mut eigvecs = Array2::<f64>::zeros((n, n));
    for (new_col, &old_col) in order.iter().enumerate() {
        for i in 0..n {
            eigvecs[[i, new_col]] = v[[i, old_col]];
        }
    }
    (eigvals, eigvecs)
}
