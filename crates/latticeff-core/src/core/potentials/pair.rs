use super::kernel::{KernelInput, KernelResult, PotentialKernel};
use super::precompute::PrecomputedView;
use super::rows::{self, RowKernel};
use std::fmt::Debug;

/// A radial pair function `f(r)` and its derivative.
///
/// `k` is the sparse entry the distance came from, used to read precomputed
/// r-functions.
pub trait PairFunction: Send + Sync + Debug {
    /// Pairs contribute only for `r < cutoff`.
    fn cutoff(&self) -> f64;

    fn value(&self, r: f64, pre: &PrecomputedView<'_>, k: usize) -> f64;

    fn derivative(&self, r: f64, pre: &PrecomputedView<'_>, k: usize) -> f64;
}

/// Sums a [`PairFunction`] over the species-masked neighbors of every row.
///
/// The gradient applies `+f'(r) u` to the central particle and `-f'(r) u` to the
/// partner, with `u` the unit vector from the partner to the central particle.
#[derive(Debug)]
pub struct PairKernel<F>(pub F);

impl<F: PairFunction> RowKernel for PairKernel<F> {
    fn value_row(&self, row: usize, input: &KernelInput<'_>) -> f64 {
        let cutoff = self.0.cutoff();
        let mut total = 0.0;
        for k in input.distances.row_range(row) {
            let c = input.distances.indices()[k];
            let r = input.distances.data()[k];
            if r < cutoff && input.column_matches(c, 1) {
                total += self.0.value(r, &input.precomputed, k);
            }
        }
        total
    }

    fn gradient_row(&self, row: usize, input: &KernelInput<'_>, out_row: &mut [f64]) {
        let cutoff = self.0.cutoff();
        let n = input.n_rows();
        let centre = input.cartesian_row[row];
        for k in input.distances.row_range(row) {
            let c = input.distances.indices()[k];
            let r = input.distances.data()[k];
            if r >= cutoff || !input.column_matches(c, 1) {
                continue;
            }
            let slope = self.0.derivative(r, &input.precomputed, k);
            let g = (centre - input.cartesian_col[c]) * (slope / r);
            let partner = c % n;
            for axis in 0..3 {
                out_row[row * 3 + axis] += g[axis];
                out_row[partner * 3 + axis] -= g[axis];
            }
        }
    }
}

impl<F: PairFunction> PotentialKernel for PairKernel<F> {
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
