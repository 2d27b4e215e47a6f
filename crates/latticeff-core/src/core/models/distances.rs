use nalgebra::Vector3;
use std::ops::Range;

/// Sparse table of distances between row points and column points, in CSR layout.
///
/// `indices[indptr[i]..indptr[i + 1]]` are the column neighbors of row `i`, sorted
/// in ascending order, and `data` holds the matching distances. Only pairs closer
/// than the cutoff used to build the table are stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairDistances {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl PairDistances {
    pub fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Builds a table from `(row, col, distance)` triplets in any order.
    ///
    /// Entries with a row or column outside the logical shape are dropped.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        mut entries: Vec<(usize, usize, f64)>,
    ) -> Self {
        entries.retain(|&(r, c, _)| r < n_rows && c < n_cols);
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let mut table = Self::empty(n_rows, n_cols);
        for (r, c, d) in entries {
            table.indptr[r + 1] += 1;
            table.indices.push(c);
            table.data.push(d);
        }
        for i in 0..n_rows {
            table.indptr[i + 1] += table.indptr[i];
        }
        table
    }

    /// Reassembles a table from raw CSR arrays. Returns `None` if they are inconsistent.
    pub fn from_csr(
        n_rows: usize,
        n_cols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> Option<Self> {
        let consistent = indptr.len() == n_rows + 1
            && indptr.first() == Some(&0)
            && indptr.windows(2).all(|w| w[0] <= w[1])
            && indptr.last() == Some(&indices.len())
            && indices.len() == data.len()
            && indices.iter().all(|&c| c < n_cols);
        consistent.then_some(Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.indptr[row]..self.indptr[row + 1]
    }

    pub fn row(&self, row: usize) -> (&[usize], &[f64]) {
        let range = self.row_range(row);
        (&self.indices[range.clone()], &self.data[range])
    }

    /// A copy sharing this table's sparsity pattern with different distances.
    pub fn with_data(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.indices.len());
        Self {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            data,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n_rows).flat_map(move |row| {
            self.row_range(row)
                .map(move |k| (row, self.indices[k], self.data[k]))
        })
    }
}

/// Recomputes the distances of a sparsity pattern from Cartesian coordinates.
pub fn calc_sparse_distances(
    pattern: &PairDistances,
    cartesian_row: &[Vector3<f64>],
    cartesian_col: &[Vector3<f64>],
) -> Vec<f64> {
    let mut data = Vec::with_capacity(pattern.nnz());
    for (row, col, _) in pattern.iter() {
        data.push((cartesian_row[row] - cartesian_col[col]).norm());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplets_are_sorted_into_csr_rows() {
        let table = PairDistances::from_triplets(
            3,
            4,
            vec![(2, 1, 0.5), (0, 3, 1.5), (0, 1, 1.0), (2, 0, 0.25)],
        );

        assert_eq!(table.indptr(), &[0, 2, 2, 4]);
        assert_eq!(table.indices(), &[1, 3, 0, 1]);
        assert_eq!(table.data(), &[1.0, 1.5, 0.25, 0.5]);
        assert_eq!(table.row(1).0.len(), 0);
    }

    #[test]
    fn from_csr_rejects_inconsistent_arrays() {
        assert!(PairDistances::from_csr(2, 2, vec![0, 1, 2], vec![1, 0], vec![1.0, 1.0]).is_some());
        assert!(PairDistances::from_csr(2, 2, vec![0, 1], vec![1], vec![1.0]).is_none());
        assert!(PairDistances::from_csr(2, 2, vec![0, 1, 2], vec![1, 5], vec![1.0, 1.0]).is_none());
        assert!(PairDistances::from_csr(1, 2, vec![0, 1], vec![1], vec![]).is_none());
    }

    #[test]
    fn sparse_distances_follow_coordinates() {
        let table = PairDistances::from_triplets(1, 2, vec![(0, 0, 0.0), (0, 1, 0.0)]);
        let rows = [Vector3::new(0.0, 0.0, 0.0)];
        let cols = [Vector3::new(3.0, 4.0, 0.0), Vector3::new(0.0, 0.0, 2.0)];

        assert_eq!(calc_sparse_distances(&table, &rows, &cols), vec![5.0, 2.0]);
    }
}
