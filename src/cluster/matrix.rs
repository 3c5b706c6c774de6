//! Dense symmetric distance matrix.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::similarity::Dissimilarity;

/// An `n x n` symmetric, zero-diagonal distance matrix stored row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// All-zero matrix of size `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Build from a full row-major buffer. The buffer must be square,
    /// symmetric, and zero on the diagonal.
    pub fn from_full(n: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != n * n {
            return Err(Error::DimensionMismatch {
                expected: n * n,
                found: data.len(),
            });
        }
        let m = Self { n, data };
        if !m.is_symmetric() {
            return Err(Error::InvalidParameter {
                name: "matrix",
                message: "must be symmetric with a zero diagonal",
            });
        }
        Ok(m)
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Set `(i, j)` and `(j, i)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
        self.data[j * self.n + i] = value;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Sub-matrix restricted to `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> DistanceMatrix {
        let k = indices.len();
        let mut data = Vec::with_capacity(k * k);
        for &i in indices {
            for &j in indices {
                data.push(self.get(i, j));
            }
        }
        DistanceMatrix { n: k, data }
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| {
            self.get(i, i) == 0.0 && ((i + 1)..self.n).all(|j| self.get(i, j) == self.get(j, i))
        })
    }

    /// Mean of each row, diagonal included.
    pub fn row_means(&self) -> Vec<f64> {
        if self.n == 0 {
            return Vec::new();
        }
        (0..self.n)
            .map(|i| self.row(i).iter().sum::<f64>() / self.n as f64)
            .collect()
    }
}

/// Compute the full pairwise distance matrix for a prepared metric.
///
/// Only pairs `i < j` are evaluated; the lower triangle is mirrored and the
/// diagonal stays zero. With the `parallel` feature rows are evaluated on the
/// rayon pool and written back by position, so the result does not depend on
/// evaluation order.
pub fn pairwise_distances<M: Dissimilarity + ?Sized>(metric: &M) -> DistanceMatrix {
    let n = metric.len();
    let start = Instant::now();
    let mut matrix = DistanceMatrix::zeros(n);

    for (i, row) in upper_rows(metric) {
        for (offset, d) in row.into_iter().enumerate() {
            matrix.set(i, i + 1 + offset, d);
        }
    }

    info!(
        n,
        pairs = n * n.saturating_sub(1) / 2,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pairwise distances computed"
    );
    matrix
}

#[cfg(feature = "parallel")]
fn upper_rows<M: Dissimilarity + ?Sized>(metric: &M) -> Vec<(usize, Vec<f64>)> {
    use rayon::prelude::*;

    let n = metric.len();
    (0..n)
        .into_par_iter()
        .map(|i| (i, upper_row(metric, i, n)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn upper_rows<M: Dissimilarity + ?Sized>(metric: &M) -> Vec<(usize, Vec<f64>)> {
    let n = metric.len();
    (0..n).map(|i| (i, upper_row(metric, i, n))).collect()
}

fn upper_row<M: Dissimilarity + ?Sized>(metric: &M, i: usize, n: usize) -> Vec<f64> {
    let row: Vec<f64> = ((i + 1)..n)
        .map(|j| metric.dissimilarity(i, j).clamp(0.0, 1.0))
        .collect();
    debug!(row = i, evaluated = row.len(), "distance row done");
    row
}
