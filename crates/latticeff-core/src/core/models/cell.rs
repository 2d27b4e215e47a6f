use super::distances::PairDistances;
use super::species::Species;
use itertools::iproduct;
use nalgebra::{DMatrix, Matrix3, Vector3};
use std::collections::BTreeMap;
use thiserror::Error;

/// Free-form annotation stored in [`Cell::meta`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Number(f64),
    Text(String),
    Vectors(Vec<Vector3<f64>>),
}

impl MetaValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vectors(&self) -> Option<&[Vector3<f64>]> {
        match self {
            MetaValue::Vectors(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CellError {
    #[error("Coordinates and species have different lengths: {coordinates} != {values}")]
    LengthMismatch { coordinates: usize, values: usize },
    #[error("Lattice vectors are linearly dependent")]
    SingularLattice,
    #[error("Repetition counts must be positive, found {0:?}")]
    EmptyRepetition([usize; 3]),
}

/// A periodic box: lattice vectors, fractional point coordinates and per-point species.
///
/// Rows of `vectors` are the lattice vectors. Coordinates are fractional and are not
/// required to lie in `[0, 1)`. All geometric operations return fresh arrays and never
/// alias the source cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Lattice vectors, one per row.
    pub vectors: Matrix3<f64>,
    /// Fractional coordinates of every point.
    pub coordinates: Vec<Vector3<f64>>,
    /// Species label of every point.
    pub values: Vec<Species>,
    /// Annotations. Only the relaxation driver writes here.
    pub meta: BTreeMap<String, MetaValue>,
}

impl Cell {
    /// Creates a cell from lattice vectors, fractional coordinates and species labels.
    ///
    /// # Arguments
    ///
    /// * `vectors` - Lattice vectors, one per row.
    /// * `coordinates` - Fractional coordinates of each point.
    /// * `values` - Species label of each point.
    ///
    /// # Return
    ///
    /// The new cell, or a [`CellError`] if the lengths disagree or the lattice is singular.
    pub fn new(
        vectors: Matrix3<f64>,
        coordinates: Vec<Vector3<f64>>,
        values: Vec<Species>,
    ) -> Result<Self, CellError> {
        if coordinates.len() != values.len() {
            return Err(CellError::LengthMismatch {
                coordinates: coordinates.len(),
                values: values.len(),
            });
        }
        if vectors.try_inverse().is_none() {
            return Err(CellError::SingularLattice);
        }
        Ok(Self {
            vectors,
            coordinates,
            values,
            meta: BTreeMap::new(),
        })
    }

    /// Creates a cell from Cartesian point positions.
    pub fn from_cartesian(
        vectors: Matrix3<f64>,
        cartesian: &[Vector3<f64>],
        values: Vec<Species>,
    ) -> Result<Self, CellError> {
        let mut cell = Self::new(vectors, vec![Vector3::zeros(); cartesian.len()], values)?;
        cell.coordinates = cell.transform_from_cartesian(cartesian)?;
        Ok(cell)
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn volume(&self) -> f64 {
        self.vectors.determinant().abs()
    }

    /// Maps one fractional point to Cartesian space.
    #[inline]
    pub fn to_cartesian(&self, fractional: &Vector3<f64>) -> Vector3<f64> {
        self.vectors.transpose() * fractional
    }

    /// Cartesian coordinates of every point.
    pub fn cartesian(&self) -> Vec<Vector3<f64>> {
        let basis = self.vectors.transpose();
        self.coordinates.iter().map(|f| basis * f).collect()
    }

    /// Converts Cartesian points into this cell's fractional coordinates.
    pub fn transform_from_cartesian(
        &self,
        cartesian: &[Vector3<f64>],
    ) -> Result<Vec<Vector3<f64>>, CellError> {
        let inverse = self
            .vectors
            .transpose()
            .try_inverse()
            .ok_or(CellError::SingularLattice)?;
        Ok(cartesian.iter().map(|c| inverse * c).collect())
    }

    /// Replaces point positions with the given Cartesian coordinates.
    ///
    /// # Arguments
    ///
    /// * `cartesian` - New positions, one per point.
    /// * `normalize` - Wrap the resulting fractional coordinates into `[0, 1)`.
    pub fn set_cartesian(
        &mut self,
        cartesian: &[Vector3<f64>],
        normalize: bool,
    ) -> Result<(), CellError> {
        if cartesian.len() != self.values.len() {
            return Err(CellError::LengthMismatch {
                coordinates: cartesian.len(),
                values: self.values.len(),
            });
        }
        self.coordinates = self.transform_from_cartesian(cartesian)?;
        if normalize {
            self.normalize();
        }
        Ok(())
    }

    /// Wraps fractional coordinates into `[0, 1)` in place.
    pub fn normalize(&mut self) {
        for c in &mut self.coordinates {
            *c = c.map(wrap_unit);
        }
    }

    pub fn normalized(&self) -> Self {
        let mut cell = self.clone();
        cell.normalize();
        cell
    }

    /// Distances between opposite faces of the cell, one per lattice vector.
    pub fn perpendicular_widths(&self) -> Result<Vector3<f64>, CellError> {
        let inverse = self.vectors.try_inverse().ok_or(CellError::SingularLattice)?;
        Ok(Vector3::from_fn(|i, _| 1.0 / inverse.column(i).norm()))
    }

    /// Range covered by the fractional coordinates along each lattice vector.
    ///
    /// Below one on every axis for a normalized cell, zero for an empty one.
    pub fn fractional_spread(&self) -> Vector3<f64> {
        let mut coordinates = self.coordinates.iter();
        let Some(first) = coordinates.next() else {
            return Vector3::zeros();
        };
        let (lo, hi) = coordinates.fold((*first, *first), |(lo, hi), c| (lo.inf(c), hi.sup(c)));
        hi - lo
    }

    /// Dense Cartesian distances between the points of this cell and `other` (or itself).
    ///
    /// No periodic images are considered.
    pub fn distances(&self, other: Option<&Cell>) -> DMatrix<f64> {
        let rows = self.cartesian();
        let cols = other.map_or_else(|| rows.clone(), Cell::cartesian);
        DMatrix::from_fn(rows.len(), cols.len(), |i, j| (rows[i] - cols[j]).norm())
    }

    /// Sparse variant of [`Cell::distances`] keeping only pairs closer than `cutoff`.
    pub fn sparse_distances(&self, cutoff: f64, other: Option<&Cell>) -> PairDistances {
        let rows = self.cartesian();
        let cols = other.map_or_else(|| rows.clone(), Cell::cartesian);
        let entries = iproduct!(0..rows.len(), 0..cols.len())
            .filter_map(|(i, j)| {
                let d = (rows[i] - cols[j]).norm();
                (d < cutoff).then_some((i, j, d))
            })
            .collect();
        PairDistances::from_triplets(rows.len(), cols.len(), entries)
    }

    /// Tiles the cell `n[0] x n[1] x n[2]` times.
    ///
    /// Points of the supercell are ordered by tile first (the last axis changing
    /// fastest) and by the original point order within a tile. Metadata is not
    /// carried over.
    pub fn repeated(&self, n: [usize; 3]) -> Result<Cell, CellError> {
        if n.contains(&0) {
            return Err(CellError::EmptyRepetition(n));
        }
        let scale = Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64);
        let vectors = Matrix3::from_diagonal(&scale) * self.vectors;

        let tiles = n.iter().product::<usize>();
        let mut coordinates = Vec::with_capacity(self.len() * tiles);
        let mut values = Vec::with_capacity(self.len() * tiles);
        for (i, j, k) in iproduct!(0..n[0], 0..n[1], 0..n[2]) {
            let shift = Vector3::new(i as f64, j as f64, k as f64);
            for (c, v) in self.coordinates.iter().zip(&self.values) {
                coordinates.push((c + shift).component_div(&scale));
                values.push(v.clone());
            }
        }
        Cell::new(vectors, coordinates, values)
    }
}

#[inline]
fn wrap_unit(x: f64) -> f64 {
    let wrapped = x - x.floor();
    // floor of a tiny negative number can round the result up to exactly 1.0
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn vectors_approx_equal(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < TOLERANCE
    }

    fn skewed_cell() -> Cell {
        Cell::new(
            Matrix3::new(2.0, 0.0, 0.0, 1.0, 3.0, 0.0, 0.5, 0.5, 4.0),
            vec![Vector3::new(0.1, 0.2, 0.3), Vector3::new(0.9, -0.4, 1.7)],
            vec![Species::from("a"), Species::from("b")],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_mismatched_lengths() {
        let result = Cell::new(
            Matrix3::identity(),
            vec![Vector3::zeros()],
            vec![Species::from("a"), Species::from("b")],
        );
        assert_eq!(
            result,
            Err(CellError::LengthMismatch {
                coordinates: 1,
                values: 2
            })
        );
    }

    #[test]
    fn new_rejects_singular_lattice() {
        let result = Cell::new(Matrix3::zeros(), vec![], vec![]);
        assert_eq!(result, Err(CellError::SingularLattice));
    }

    #[test]
    fn cartesian_is_fractional_times_lattice_rows() {
        let cell = skewed_cell();
        let cartesian = cell.cartesian();
        let f = cell.coordinates[0];
        let expected = cell.vectors.row(0).transpose() * f.x
            + cell.vectors.row(1).transpose() * f.y
            + cell.vectors.row(2).transpose() * f.z;
        assert!(vectors_approx_equal(&cartesian[0], &expected));
    }

    #[test]
    fn transform_from_cartesian_inverts_cartesian() {
        let cell = skewed_cell();
        let back = cell.transform_from_cartesian(&cell.cartesian()).unwrap();
        for (a, b) in back.iter().zip(&cell.coordinates) {
            assert!(vectors_approx_equal(a, b));
        }
    }

    #[test]
    fn set_cartesian_with_normalize_wraps_into_unit_cell() {
        let mut cell = skewed_cell();
        let cartesian = cell.cartesian();
        cell.set_cartesian(&cartesian, true).unwrap();

        for c in &cell.coordinates {
            assert!(c.iter().all(|&x| (0.0..1.0).contains(&x)));
        }
        assert!(vectors_approx_equal(
            &cell.coordinates[1],
            &Vector3::new(0.9, 0.6, 0.7)
        ));
    }

    #[test]
    fn perpendicular_widths_of_orthorhombic_cell_are_edge_lengths() {
        let cell = Cell::new(
            Matrix3::from_diagonal(&Vector3::new(2.0, 3.0, 5.0)),
            vec![],
            vec![],
        )
        .unwrap();
        let widths = cell.perpendicular_widths().unwrap();
        assert!(vectors_approx_equal(&widths, &Vector3::new(2.0, 3.0, 5.0)));
    }

    #[test]
    fn perpendicular_widths_of_skewed_cell_match_volume_over_face_area() {
        let cell = skewed_cell();
        let widths = cell.perpendicular_widths().unwrap();
        let a = cell.vectors.row(0).transpose();
        let b = cell.vectors.row(1).transpose();
        let c = cell.vectors.row(2).transpose();
        assert!(f64_approx_equal(widths.z, cell.volume() / a.cross(&b).norm()));
        assert!(f64_approx_equal(widths.x, cell.volume() / b.cross(&c).norm()));
    }

    #[test]
    fn repeated_scales_lattice_and_tiles_points() {
        let cell = skewed_cell();
        let supercell = cell.repeated([2, 1, 3]).unwrap();

        assert_eq!(supercell.len(), 12);
        assert!(f64_approx_equal(supercell.volume(), 6.0 * cell.volume()));
        assert_eq!(supercell.values[2], Species::from("a"));
        assert_eq!(supercell.values[3], Species::from("b"));

        let original = cell.cartesian();
        let tiled = supercell.cartesian();
        assert!(vectors_approx_equal(&tiled[0], &original[0]));
        let third_axis = cell.vectors.row(2).transpose();
        assert!(vectors_approx_equal(&tiled[3], &(original[1] + third_axis)));
    }

    #[test]
    fn repeated_rejects_zero_counts() {
        assert_eq!(
            skewed_cell().repeated([1, 0, 1]),
            Err(CellError::EmptyRepetition([1, 0, 1]))
        );
    }

    #[test]
    fn sparse_distances_agree_with_dense_below_cutoff() {
        let cell = skewed_cell();
        let dense = cell.distances(None);
        let sparse = cell.sparse_distances(4.0, None);
        for (i, j, d) in sparse.iter() {
            assert!(f64_approx_equal(dense[(i, j)], d));
            assert!(d < 4.0);
        }
        let expected = dense.iter().filter(|&&d| d < 4.0).count();
        assert_eq!(sparse.nnz(), expected);
    }

    #[test]
    fn sparse_distances_to_another_cell_exclude_the_cutoff_itself() {
        let cell = skewed_cell();
        let other = Cell::new(
            cell.vectors,
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.5, 0.5, 0.5),
                Vector3::new(0.2, 0.1, 0.9),
            ],
            vec![Species::from("a"); 3],
        )
        .unwrap();
        let dense = cell.distances(Some(&other));
        let cutoff = dense[(0, 1)];
        let sparse = cell.sparse_distances(cutoff, Some(&other));

        assert_eq!((sparse.n_rows(), sparse.n_cols()), (2, 3));
        let expected: Vec<(usize, usize, f64)> = iproduct!(0..2, 0..3)
            .map(|(i, j)| (i, j, dense[(i, j)]))
            .filter(|&(_, _, d)| d < cutoff)
            .collect();
        let found: Vec<(usize, usize, f64)> = sparse.iter().collect();
        assert_eq!(found, expected);
        assert!(found.iter().all(|&(i, j, _)| (i, j) != (0, 1)));
    }

    #[test]
    fn fractional_spread_measures_unwrapped_extent() {
        let cell = skewed_cell();
        assert!(vectors_approx_equal(
            &cell.fractional_spread(),
            &Vector3::new(0.8, 0.6, 1.4)
        ));
        let normalized = cell.normalized().fractional_spread();
        assert!(normalized.iter().all(|&s| s < 1.0));
        let empty = Cell::new(Matrix3::identity(), vec![], vec![]).unwrap();
        assert_eq!(empty.fractional_spread(), Vector3::zeros());
    }

    #[test]
    fn wrap_unit_never_returns_one() {
        assert_eq!(wrap_unit(-1e-20), 0.0);
        assert!(f64_approx_equal(wrap_unit(-0.25), 0.75));
        assert!(f64_approx_equal(wrap_unit(2.5), 0.5));
    }
}
