use super::kernel::KernelInput;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A kernel whose contribution to row `i` of the output depends only on row `i`
/// of the sparse table, so rows can be processed independently.
pub trait RowKernel: Send + Sync {
    fn value_row(&self, row: usize, input: &KernelInput<'_>) -> f64;

    /// Accumulates `d(out[row]) / d(positions)` into `out_row`, shape `[n, 3]`.
    fn gradient_row(&self, row: usize, input: &KernelInput<'_>, out_row: &mut [f64]);
}

pub fn run_value<K: RowKernel + ?Sized>(
    kernel: &K,
    input: &KernelInput<'_>,
    out: &mut [f64],
    parallel: bool,
) {
    let body = |(row, slot): (usize, &mut f64)| {
        if input.row_matches(row) {
            *slot += kernel.value_row(row, input);
        }
    };

    #[cfg(feature = "parallel")]
    if parallel {
        out.par_iter_mut().enumerate().for_each(body);
        return;
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    out.iter_mut().enumerate().for_each(body);
}

pub fn run_gradient<K: RowKernel + ?Sized>(
    kernel: &K,
    input: &KernelInput<'_>,
    out: &mut [f64],
    parallel: bool,
) {
    let stride = input.n_rows() * 3;
    if stride == 0 {
        return;
    }
    let body = |(row, out_row): (usize, &mut [f64])| {
        if input.row_matches(row) {
            kernel.gradient_row(row, input, out_row);
        }
    };

    #[cfg(feature = "parallel")]
    if parallel {
        out.par_chunks_mut(stride).enumerate().for_each(body);
        return;
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    out.chunks_mut(stride).enumerate().for_each(body);
}
