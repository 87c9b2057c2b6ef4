//! Sparse probability-mass-function storage (component B).
//!
//! `SparsePmf` wraps a [`nalgebra_sparse::CsrMatrix`] so that "this is a
//! sparse matrix, not a dense one" is a fact the type system enforces: there
//! is no `to_dense()` anywhere in this crate, and none should ever be added
//! (spec.md §5's memory bound — a dense grid is ~25M cells — makes an
//! accidental dense materialization a correctness bug, not just a
//! performance one).

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::grid::Rect;

/// A sparse, non-negative `Ny x Nx` matrix (rows are latitude indices,
/// columns are longitude indices, matching the axis order of
/// [`Grid`](crate::grid::Grid)). Either the zero matrix, or normalized so its
/// entries sum to 1 — callers track which via the `vacuous` flag on
/// [`Location`](crate::location::Location); `SparsePmf` itself does not care.
#[derive(Clone, Debug)]
pub struct SparsePmf {
    ny: usize,
    nx: usize,
    matrix: CsrMatrix<f64>,
}

impl SparsePmf {
    /// The all-zero `ny x nx` matrix.
    #[must_use]
    pub fn zero(ny: usize, nx: usize) -> Self {
        let coo = CooMatrix::new(ny, nx);
        SparsePmf {
            ny,
            nx,
            matrix: CsrMatrix::from(&coo),
        }
    }

    /// Build from an iterator of `(row, col, value)` triplets. Duplicate
    /// `(row, col)` pairs are summed, matching `CooMatrix`'s convention.
    pub fn from_triplets(
        ny: usize,
        nx: usize,
        entries: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Self {
        let mut coo = CooMatrix::new(ny, nx);
        for (r, c, v) in entries {
            if v != 0.0 {
                coo.push(r, c, v);
            }
        }
        SparsePmf {
            ny,
            nx,
            matrix: CsrMatrix::from(&coo),
        }
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    #[must_use]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.matrix.triplet_iter().map(|(r, c, v)| (r, c, *v))
    }

    /// The 0/1 mask matrix of grid points falling within `rect`.
    #[must_use]
    pub fn mask_matrix(rect: &Rect, grid: &crate::grid::Grid) -> Self {
        let (icols, jrows) = grid.mask_indices(rect);
        let mut entries = Vec::with_capacity(icols.len() * jrows.len());
        for j in jrows.clone() {
            for i in icols.clone() {
                entries.push((j, i, 1.0));
            }
        }
        SparsePmf::from_triplets(grid.ny(), grid.nx(), entries)
    }

    /// Sum of all entries.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.matrix.values().iter().sum()
    }

    /// Normalize in place so entries sum to 1. The zero matrix normalizes to
    /// itself; the caller learns vacuity from the sum this returns (which
    /// will be `0.0` in that case).
    pub fn normalize_in_place(&mut self) -> f64 {
        let s = self.sum();
        if s != 0.0 {
            for v in self.matrix.values_mut() {
                *v /= s;
            }
        }
        s
    }

    /// Element-wise (Hadamard) product. The result has nonzero entries only
    /// where both operands do.
    #[must_use]
    pub fn hadamard(&self, other: &Self) -> Self {
        assert_eq!(self.shape(), other.shape(), "hadamard: shape mismatch");
        // Iterate whichever operand is sparser to keep this close to
        // O(min(nnz_a, nnz_b)).
        let (sparser, denser) = if self.nnz() <= other.nnz() {
            (self, other)
        } else {
            (other, self)
        };
        let mut entries = Vec::new();
        for (r, c, v) in sparser.triplets() {
            if let Some(w) = denser.get(r, c) {
                if v != 0.0 && w != 0.0 {
                    entries.push((r, c, v * w));
                }
            }
        }
        SparsePmf::from_triplets(self.ny, self.nx, entries)
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.matrix.get_entry(row, col).map(|e| e.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn normalize_zero_matrix_stays_zero() {
        let mut m = SparsePmf::zero(3, 3);
        let s = m.normalize_in_place();
        assert_eq!(s, 0.0);
        assert_eq!(m.sum(), 0.0);
    }

    #[test]
    fn normalize_divides_by_sum() {
        let mut m = SparsePmf::from_triplets(2, 2, [(0, 0, 2.0), (1, 1, 6.0)]);
        m.normalize_in_place();
        assert!((m.sum() - 1.0).abs() < 1e-12);
        assert!((m.get(0, 0).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn hadamard_intersects_support() {
        let a = SparsePmf::from_triplets(2, 2, [(0, 0, 1.0), (0, 1, 1.0)]);
        let b = SparsePmf::from_triplets(2, 2, [(0, 1, 2.0), (1, 0, 3.0)]);
        let c = a.hadamard(&b);
        assert_eq!(c.nnz(), 1);
        assert!((c.get(0, 1).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn mask_matrix_matches_rect() {
        let grid = Grid::new(200_000.0, 10_000.0, 0.0, 0.0, 20.0, 20.0);
        let rect = crate::grid::Rect::new(0.0, 0.0, 10.0, 10.0);
        let m = SparsePmf::mask_matrix(&rect, &grid);
        assert!(m.nnz() > 0);
        for (r, c, v) in m.triplets() {
            assert_eq!(v, 1.0);
            assert!(grid.longitudes[c] < 10.0);
            assert!(grid.latitudes[r] < 10.0);
        }
    }
}
