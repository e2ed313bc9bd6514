//! Band storage for the normal matrix, its factor and its inverse.
//!
//! A leveling line only couples consecutive points, so `AᵀPA` has a
//! bandwidth of one and factoring it costs `O(n·w²)` instead of `O(n³)`.
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Lower band of an `n×n` matrix: entries `(i, j)` with `0 ≤ i - j ≤ w`,
/// stored column by column. Read as symmetric for `N` and `Qx`, as lower
/// triangular for a Cholesky factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandMatrix {
    size: usize,
    bandwidth: usize,
    data: Vec<f64>,
}

impl BandMatrix {
    pub fn zeros(size: usize, bandwidth: usize) -> Self {
        Self { size, bandwidth, data: vec![0.0; size * (bandwidth + 1)] }
    }

    pub fn size(&self) -> usize { self.size }
    pub fn bandwidth(&self) -> usize { self.bandwidth }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> Option<usize> {
        (i < self.size && i >= j && i - j <= self.bandwidth).then(|| j * (self.bandwidth + 1) + (i - j))
    }

    /// Lower-triangle entry `(i, j)`, `i ≥ j`; zero outside the band.
    #[inline]
    pub fn lower(&self, i: usize, j: usize) -> f64 {
        self.offset(i, j).map_or(0.0, |o| self.data[o])
    }

    /// Entry of the symmetric matrix whose lower band is stored.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i >= j { self.lower(i, j) } else { self.lower(j, i) }
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize, j: usize, value: f64) {
        if let Some(o) = self.offset(i, j) {
            self.data[o] = value;
        }
    }

    /// Adds `value` to the symmetric pair `(i, j)`/`(j, i)`. Ignored outside the band.
    #[inline]
    pub(crate) fn add_symmetric(&mut self, i: usize, j: usize, value: f64) {
        if let Some(o) = self.offset(i.max(j), i.min(j)) {
            self.data[o] += value;
        }
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.size).map(|j| self.lower(j, j)).collect()
    }

    /// Dense symmetric view, for inspection of small systems.
    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.size, self.size, |i, j| self.get(i, j))
    }

    /// Cholesky factor `L` of the symmetric band, `N = L·Lᵀ`.
    ///
    /// Fails with the index of the first pivot `l_kk²` not above
    /// `tolerance · max(N_jj)`.
    pub fn cholesky(&self, tolerance: f64) -> Result<BandMatrix, usize> {
        let (n, w) = (self.size, self.bandwidth);
        let max_diag = self.diagonal().into_iter().fold(0.0, f64::max);
        let mut l = BandMatrix::zeros(n, w);

        for j in 0..n {
            let pivot = self.lower(j, j) - (j.saturating_sub(w)..j).map(|k| l.lower(j, k).powi(2)).sum::<f64>();
            // Written negated so NaN is rejected too.
            if !(pivot > tolerance * max_diag) {
                return Err(j);
            }
            let d = pivot.sqrt();
            l.set(j, j, d);

            for i in j + 1..(j + w + 1).min(n) {
                let s = self.lower(i, j) - (i.saturating_sub(w)..j).map(|k| l.lower(i, k) * l.lower(j, k)).sum::<f64>();
                l.set(i, j, s / d);
            }
        }
        Ok(l)
    }

    /// Solves `L·y = b` in place, `self` lower triangular.
    pub fn forward_substitute(&self, b: &mut [f64]) {
        let w = self.bandwidth;
        for i in 0..self.size {
            let s: f64 = (i.saturating_sub(w)..i).map(|k| self.lower(i, k) * b[k]).sum();
            b[i] = (b[i] - s) / self.lower(i, i);
        }
    }

    /// Solves `Lᵀ·x = y` in place, `self` lower triangular.
    pub fn back_substitute_transposed(&self, y: &mut [f64]) {
        let n = self.size;
        for i in (0..n).rev() {
            let s: f64 = (i + 1..(i + self.bandwidth + 1).min(n)).map(|k| self.lower(k, i) * y[k]).sum();
            y[i] = (y[i] - s) / self.lower(i, i);
        }
    }

    /// The band of `(L·Lᵀ)⁻¹`, `self` lower triangular.
    ///
    /// Uses `Z·L = L⁻ᵀ` column by column from the last: every entry needed
    /// inside the band is already known, so no entry outside it is formed.
    /// The diagonal of `L` may carry either sign.
    pub fn selected_inverse(&self) -> BandMatrix {
        let (n, w) = (self.size, self.bandwidth);
        let mut z = BandMatrix::zeros(n, w);

        for j in (0..n).rev() {
            let d = self.lower(j, j);
            let hi = (j + w).min(n - 1);
            for i in (j + 1..=hi).rev() {
                let s: f64 = (j + 1..=hi).map(|k| z.get(i, k) * self.lower(k, j)).sum();
                z.set(i, j, -s / d);
            }
            let s: f64 = (j + 1..=hi).map(|k| z.get(j, k) * self.lower(k, j)).sum();
            z.set(j, j, (1.0 / d - s) / d);
        }
        z
    }
}
