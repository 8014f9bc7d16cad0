// src/matrix_access.rs

use ndarray::{ArrayBase, Data, Ix2};
use sprs::{CsMatBase, SpIndex};
use std::ops::Deref;

// --- Trait for Abstracting Input Matrix Access ---

/// Read-only access to the stored elements of a 2-D matrix.
///
/// Dense matrices store every entry. Sparse matrices store only their explicit
/// entries; implicit zeros are never visited.
pub trait StoredElements {
    /// Number of rows (n).
    fn nrows(&self) -> usize;

    /// Number of columns (m).
    fn ncols(&self) -> usize;

    /// Calls `visit` once for every stored value, in storage order.
    fn for_each_stored<F: FnMut(f64)>(&self, visit: F);

    /// Shape as `(nrows, ncols)`.
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
}

impl<S> StoredElements for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn nrows(&self) -> usize {
        self.dim().0
    }

    fn ncols(&self) -> usize {
        self.dim().1
    }

    fn for_each_stored<F: FnMut(f64)>(&self, mut visit: F) {
        self.iter().for_each(|&value| visit(value));
    }
}

impl<I, Iptr, IptrStorage, IndStorage, DataStorage> StoredElements
    for CsMatBase<f64, I, IptrStorage, IndStorage, DataStorage, Iptr>
where
    I: SpIndex,
    Iptr: SpIndex,
    IptrStorage: Deref<Target = [Iptr]>,
    IndStorage: Deref<Target = [I]>,
    DataStorage: Deref<Target = [f64]>,
{
    fn nrows(&self) -> usize {
        self.rows()
    }

    fn ncols(&self) -> usize {
        self.cols()
    }

    // Explicitly stored zeros are still stored elements and are visited.
    fn for_each_stored<F: FnMut(f64)>(&self, mut visit: F) {
        self.data().iter().for_each(|&value| visit(value));
    }
}

// --- Single-pass Statistics ---

/// Running statistics over the stored elements of a matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueSummary {
    /// Sum of all stored values.
    pub sum: f64,
    /// Smallest stored value, or `f64::MAX` when nothing is stored.
    pub min: f64,
    /// Number of stored values visited.
    pub count: usize,
    /// Number of stored values that were NaN or infinite.
    pub non_finite: usize,
}

impl Default for ValueSummary {
    fn default() -> Self {
        Self {
            sum: 0.0,
            min: f64::MAX,
            count: 0,
            non_finite: 0,
        }
    }
}

impl ValueSummary {
    fn push(&mut self, value: f64) {
        self.count += 1;
        if !value.is_finite() {
            self.non_finite += 1;
        }
        self.sum += value;
        if value < self.min {
            self.min = value;
        }
    }

    /// Mean over the full `n * m` shape rather than over `count`.
    ///
    /// For sparse inputs this treats absent entries as zeros in the numerator,
    /// while `min` only ever saw the stored ones.
    pub fn mean_over_shape(&self, nrows: usize, ncols: usize) -> f64 {
        self.sum / (nrows as f64 * ncols as f64)
    }

    /// True when every stored value was finite.
    pub fn all_finite(&self) -> bool {
        self.non_finite == 0
    }
}

/// Visits every stored element of `matrix` exactly once, accumulating sum and minimum.
pub fn summarize<M: StoredElements + ?Sized>(matrix: &M) -> ValueSummary {
    let mut summary = ValueSummary::default();
    matrix.for_each_stored(|value| summary.push(value));
    summary
}

/// Mean over the full `nrows * ncols` shape, dividing each stored value before
/// accumulating.
///
/// Used when the plain sum of finite values overflows `f64`.
pub fn scaled_mean<M: StoredElements + ?Sized>(matrix: &M, nrows: usize, ncols: usize) -> f64 {
    let (rows, cols) = (nrows as f64, ncols as f64);
    let mut mean = 0.0;
    matrix.for_each_stored(|value| mean += value / rows / cols);
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use sprs::{CsMat, TriMat};

    #[test]
    fn dense_summary_visits_every_entry() {
        let v = array![[0.0, 2.0], [4.0, 6.0]];
        let summary = summarize(&v);
        assert_eq!(summary.count, 4);
        assert_abs_diff_eq!(summary.sum, 12.0);
        assert_abs_diff_eq!(summary.min, 0.0);
        assert_abs_diff_eq!(summary.mean_over_shape(2, 2), 3.0);
    }

    #[test]
    fn dense_view_and_owned_agree() {
        let v = Array2::from_shape_fn((3, 5), |(i, j)| (i * 5 + j) as f64 - 4.0);
        let owned = summarize(&v);
        let view = summarize(&v.view());
        assert_eq!(owned, view);
        assert_abs_diff_eq!(owned.min, -4.0);
    }

    #[test]
    fn transposed_view_has_swapped_shape() {
        let v = Array2::<f64>::zeros((2, 7));
        let t = v.t();
        assert_eq!(StoredElements::shape(&t), (7, 2));
    }

    #[test]
    fn sparse_summary_visits_only_stored_entries() {
        let mut tri = TriMat::new((3, 3));
        tri.add_triplet(1, 2, 5.0);
        let csr: CsMat<f64> = tri.to_csr();
        let summary = summarize(&csr);
        assert_eq!(summary.count, 1);
        assert_abs_diff_eq!(summary.sum, 5.0);
        // The implicit zeros are not candidates for the minimum.
        assert_abs_diff_eq!(summary.min, 5.0);
        assert_abs_diff_eq!(summary.mean_over_shape(3, 3), 5.0 / 9.0);
    }

    #[test]
    fn sparse_csc_and_csr_agree() {
        let mut tri = TriMat::new((4, 3));
        tri.add_triplet(0, 0, 1.5);
        tri.add_triplet(3, 1, -2.0);
        tri.add_triplet(2, 2, 7.0);
        let csr: CsMat<f64> = tri.to_csr();
        let csc: CsMat<f64> = tri.to_csc();
        let a = summarize(&csr);
        let b = summarize(&csc);
        assert_eq!(a.count, b.count);
        assert_abs_diff_eq!(a.sum, b.sum);
        assert_abs_diff_eq!(a.min, b.min);
        assert_eq!(StoredElements::shape(&csr), (4, 3));
    }

    #[test]
    fn empty_sparse_keeps_sentinel_minimum() {
        let csr: CsMat<f64> = CsMat::zero((2, 2));
        let summary = summarize(&csr);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.min, f64::MAX);
        assert_abs_diff_eq!(summary.sum, 0.0);
        assert!(summary.all_finite());
    }

    #[test]
    fn non_finite_values_are_counted_per_element() {
        let v = array![[1.0, f64::NAN], [f64::INFINITY, 3.0]];
        let summary = summarize(&v);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.non_finite, 2);
        assert!(!summary.all_finite());
    }

    #[test]
    fn overflowing_sum_of_finite_values_is_still_all_finite() {
        let v = Array2::from_elem((2, 2), 1e308);
        let summary = summarize(&v);
        assert!(summary.sum.is_infinite());
        assert!(summary.all_finite());
        assert_abs_diff_eq!(scaled_mean(&v, 2, 2), 1e308, epsilon = 1e294);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn mean_over_shape_does_not_overflow_the_element_count() {
        let summary = ValueSummary {
            sum: 4.0,
            min: 1.0,
            count: 2,
            non_finite: 0,
        };
        let side = 1usize << 33;
        let expected = 4.0 / (side as f64 * side as f64);
        assert_eq!(summary.mean_over_shape(side, side), expected);
    }
}
