use super::kernel::{KernelInput, KernelResult, PotentialKernel};
use super::precompute::PrecomputedView;
use super::rows::{self, RowKernel};
use std::fmt::Debug;

/// Geometry of one ordered neighbor pair `(j, k)` around a central particle.
#[derive(Debug, Clone, Copy)]
pub struct TripleGeometry {
    pub r1: f64,
    pub r2: f64,
    /// Cosine of the angle between the two bonds.
    pub cos: f64,
    /// Sparse entries of the two bonds.
    pub k1: usize,
    pub k2: usize,
}

/// Partial derivatives of a three-body function.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TripleDerivatives {
    pub dr1: f64,
    pub dr2: f64,
    pub dcos: f64,
}

/// A three-body function of two bond lengths and the cosine between them.
pub trait TripleFunction: Send + Sync + Debug {
    /// Both bonds must be shorter than the cutoff.
    fn cutoff(&self) -> f64;

    fn value(&self, geometry: &TripleGeometry, pre: &PrecomputedView<'_>) -> f64;

    fn derivatives(
        &self,
        geometry: &TripleGeometry,
        pre: &PrecomputedView<'_>,
    ) -> TripleDerivatives;
}

/// Sums a [`TripleFunction`] over ordered neighbor pairs of every row.
///
/// Both `(j, k)` and `(k, j)` are visited, gated by the species of the central
/// particle and of both neighbors.
#[derive(Debug)]
pub struct TripleKernel<F>(pub F);

impl<F: TripleFunction> TripleKernel<F> {
    fn for_each_triple(
        &self,
        row: usize,
        input: &KernelInput<'_>,
        mut visit: impl FnMut(usize, usize, TripleGeometry),
    ) {
        let cutoff = self.0.cutoff();
        let centre = input.cartesian_row[row];
        let range = input.distances.row_range(row);
        let indices = input.distances.indices();
        let data = input.distances.data();

        for k1 in range.clone() {
            let (c1, r1) = (indices[k1], data[k1]);
            if r1 >= cutoff || !input.column_matches(c1, 1) {
                continue;
            }
            let v1 = input.cartesian_col[c1] - centre;
            for k2 in range.clone() {
                let (c2, r2) = (indices[k2], data[k2]);
                if k1 == k2 || r2 >= cutoff || !input.column_matches(c2, 2) {
                    continue;
                }
                let v2 = input.cartesian_col[c2] - centre;
                let cos = v1.dot(&v2) / (r1 * r2);
                visit(c1, c2, TripleGeometry { r1, r2, cos, k1, k2 });
            }
        }
    }
}

impl<F: TripleFunction> RowKernel for TripleKernel<F> {
    fn value_row(&self, row: usize, input: &KernelInput<'_>) -> f64 {
        let mut total = 0.0;
        self.for_each_triple(row, input, |_, _, geometry| {
            total += self.0.value(&geometry, &input.precomputed);
        });
        total
    }

    fn gradient_row(&self, row: usize, input: &KernelInput<'_>, out_row: &mut [f64]) {
        let n = input.n_rows();
        let centre = input.cartesian_row[row];
        self.for_each_triple(row, input, |c1, c2, g| {
            let d = self.0.derivatives(&g, &input.precomputed);
            let e1 = (input.cartesian_col[c1] - centre) / g.r1;
            let e2 = (input.cartesian_col[c2] - centre) / g.r2;
            // derivatives w.r.t. the two neighbor positions; the centre takes minus their sum
            let g1 = e1 * d.dr1 + (e2 - e1 * g.cos) * (d.dcos / g.r1);
            let g2 = e2 * d.dr2 + (e1 - e2 * g.cos) * (d.dcos / g.r2);
            let (p1, p2) = (c1 % n, c2 % n);
            for axis in 0..3 {
                out_row[row * 3 + axis] -= g1[axis] + g2[axis];
                out_row[p1 * 3 + axis] += g1[axis];
                out_row[p2 * 3 + axis] += g2[axis];
            }
        });
    }
}

impl<F: TripleFunction> PotentialKernel for TripleKernel<F> {
    fn value(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        rows::run_value(self, input, out, false);
        Ok(())
    }

    fn gradient(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        rows::run_gradient(self, input, out, false);
        Ok(())
    }

    fn value_parallel(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        rows::run_value(self, input, out, true);
        Ok(())
    }

    fn gradient_parallel(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        rows::run_gradient(self, input, out, true);
        Ok(())
    }
}
