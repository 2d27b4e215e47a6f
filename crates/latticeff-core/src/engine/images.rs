use super::error::EngineError;
use super::search::CellList;
use crate::core::models::cell::Cell;
use crate::core::models::distances::PairDistances;
use crate::core::potentials::kernel::Neighborhood;
use itertools::iproduct;
use nalgebra::Vector3;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Periodic images of a cell and the sparse distances from its points to them.
///
/// Column `s * n + j` is point `j` translated by shift `s`, so `column % n`
/// recovers the particle. The zero shift sits at [`ImageTable::centre`]; its
/// diagonal entries are the self-pairs and are never stored.
#[derive(Debug, Clone)]
pub struct ImageTable {
    x: [usize; 3],
    shifts: Vec<Vector3<i32>>,
    centre: usize,
    cartesian_row: Vec<Vector3<f64>>,
    cartesian_col: Vec<Vector3<f64>>,
    distances: PairDistances,
}

impl ImageTable {
    pub fn new(x: [usize; 3]) -> Result<Self, EngineError> {
        if x.contains(&0) {
            return Err(EngineError::InvalidReplicas(x));
        }
        let span = |n: usize| -(n as i32 - 1)..=(n as i32 - 1);
        let shifts: Vec<Vector3<i32>> = iproduct!(span(x[0]), span(x[1]), span(x[2]))
            .map(|(a, b, c)| Vector3::new(a, b, c))
            .collect();
        let centre = shifts.len() / 2;
        Ok(Self {
            x,
            shifts,
            centre,
            cartesian_row: Vec::new(),
            cartesian_col: Vec::new(),
            distances: PairDistances::default(),
        })
    }

    pub fn x(&self) -> [usize; 3] {
        self.x
    }

    /// Every lattice shift, first axis slowest.
    pub fn shift_vectors(&self) -> &[Vector3<i32>] {
        &self.shifts
    }

    /// Index of the zero shift.
    pub fn centre(&self) -> usize {
        self.centre
    }

    pub fn cartesian_row(&self) -> &[Vector3<f64>] {
        &self.cartesian_row
    }

    pub fn cartesian_col(&self) -> &[Vector3<f64>] {
        &self.cartesian_col
    }

    pub fn distances(&self) -> &PairDistances {
        &self.distances
    }

    pub fn neighborhood(&self) -> Neighborhood<'_> {
        Neighborhood::new(&self.distances, &self.cartesian_row, &self.cartesian_col)
    }

    /// Drops the cached geometry.
    pub fn clear(&mut self) {
        self.cartesian_row.clear();
        self.cartesian_col.clear();
        self.distances = PairDistances::default();
    }

    /// Recomputes images and the distance table of `cell` for `cutoff`.
    ///
    /// A non-positive cutoff yields an empty table.
    pub fn rebuild(&mut self, cell: &Cell, cutoff: f64, parallel: bool) {
        let n = cell.len();
        let basis = cell.vectors.transpose();
        self.cartesian_row = cell.cartesian();
        self.cartesian_col = self
            .shifts
            .iter()
            .flat_map(|s| {
                let t = basis * s.cast::<f64>();
                self.cartesian_row.iter().map(move |r| r + t)
            })
            .collect();
        let n_cols = self.cartesian_col.len();

        if n == 0 || cutoff.is_nan() || cutoff <= 0.0 {
            self.distances = PairDistances::empty(n, n_cols);
            return;
        }

        let list = CellList::build(&self.cartesian_col, cutoff);
        let (rows, cols) = (&self.cartesian_row, &self.cartesian_col);
        let diagonal = self.centre * n;
        let row_entries = |i: usize| {
            let mut entries = Vec::new();
            list.query(cols, &rows[i], cutoff, |c, d| {
                if c != diagonal + i {
                    entries.push((i, c, d));
                }
            });
            entries
        };

        #[cfg(feature = "parallel")]
        let per_row: Vec<Vec<(usize, usize, f64)>> = if parallel {
            (0..n).into_par_iter().map(row_entries).collect()
        } else {
            (0..n).map(row_entries).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let per_row: Vec<Vec<(usize, usize, f64)>> = {
            let _ = parallel;
            (0..n).map(row_entries).collect()
        };

        let entries: Vec<_> = per_row.into_iter().flatten().collect();
        self.distances = PairDistances::from_triplets(n, n_cols, entries);
        debug!(
            rows = n,
            columns = n_cols,
            pairs = self.distances.nnz(),
            "Distance table rebuilt"
        );
    }
}
