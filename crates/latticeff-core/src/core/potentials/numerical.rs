use super::kernel::{KernelInput, KernelResult, PotentialKernel, PotentialWarning, gradient_index};
use super::precompute::PrecomputedR;
use crate::core::models::distances::{PairDistances, calc_sparse_distances};
use nalgebra::Vector3;
use std::collections::BTreeSet;

const STEP: f64 = 1e-6;

/// Central-difference gradient of a value kernel.
///
/// Every row position and every column position referenced by the table is
/// displaced along each axis in turn. Distances and precomputed r-functions are
/// re-derived under the displaced geometry, and column derivatives are folded
/// back onto their particle through `column % n_rows`.
pub fn numerical_gradient<K>(kernel: &K, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult
where
    K: PotentialKernel + ?Sized,
{
    let n = input.n_rows();
    let probe = Probe::new(input);
    let mut warning = None;

    let mut rows = input.cartesian_row.to_vec();
    for atom in 0..n {
        for axis in 0..3 {
            let origin = rows[atom][axis];
            rows[atom][axis] = origin + STEP;
            let plus = probe.values(kernel, &rows, input.cartesian_col, &mut warning);
            rows[atom][axis] = origin - STEP;
            let minus = probe.values(kernel, &rows, input.cartesian_col, &mut warning);
            rows[atom][axis] = origin;
            accumulate(out, n, atom, axis, &plus, &minus);
        }
    }

    let referenced: BTreeSet<usize> = input.distances.indices().iter().copied().collect();
    let mut cols = input.cartesian_col.to_vec();
    for column in referenced {
        for axis in 0..3 {
            let origin = cols[column][axis];
            cols[column][axis] = origin + STEP;
            let plus = probe.values(kernel, input.cartesian_row, &cols, &mut warning);
            cols[column][axis] = origin - STEP;
            let minus = probe.values(kernel, input.cartesian_row, &cols, &mut warning);
            cols[column][axis] = origin;
            accumulate(out, n, column % n, axis, &plus, &minus);
        }
    }

    warning.map_or(Ok(()), Err)
}

fn accumulate(out: &mut [f64], n: usize, atom: usize, axis: usize, plus: &[f64], minus: &[f64]) {
    for (i, (p, m)) in plus.iter().zip(minus).enumerate() {
        out[gradient_index(n, i, atom, axis)] += (p - m) / (2.0 * STEP);
    }
}

struct Probe<'a> {
    input: &'a KernelInput<'a>,
    handles: Vec<usize>,
}

impl<'a> Probe<'a> {
    fn new(input: &'a KernelInput<'a>) -> Self {
        Self {
            input,
            handles: (0..input.r_functions.len()).collect(),
        }
    }

    fn values<K>(
        &self,
        kernel: &K,
        rows: &[Vector3<f64>],
        cols: &[Vector3<f64>],
        warning: &mut Option<PotentialWarning>,
    ) -> Vec<f64>
    where
        K: PotentialKernel + ?Sized,
    {
        let data = calc_sparse_distances(self.input.distances, rows, cols);
        let precomputed = PrecomputedR::compute(&data, self.input.r_functions);
        let distances: PairDistances = self.input.distances.with_data(data);
        let displaced = KernelInput {
            distances: &distances,
            cartesian_row: rows,
            cartesian_col: cols,
            precomputed: precomputed.view(&self.handles),
            ..*self.input
        };
        let mut out = vec![0.0; rows.len()];
        if let Err(w) = kernel.value(&displaced, &mut out) {
            warning.get_or_insert(w);
        }
        out
    }
}

/// Wraps a kernel so that only its value evaluator is used and gradients fall
/// back to central differences.
#[derive(Debug)]
pub struct ValueOnly<K>(pub K);

impl<K: PotentialKernel> PotentialKernel for ValueOnly<K> {
    fn value(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        self.0.value(input, out)
    }

    fn value_parallel(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        self.0.value_parallel(input, out)
    }
}
