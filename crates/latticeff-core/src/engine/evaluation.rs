use crate::core::potentials::kernel::{KernelKind, PotentialWarning};
use nalgebra::Vector3;

/// Stacked kernel output of a batch of potentials.
///
/// `data` holds one block per potential: `[n]` values or `[n, n, 3]` gradients.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub kind: KernelKind,
    pub n_atoms: usize,
    pub n_potentials: usize,
    pub data: Vec<f64>,
    /// Numerical warnings raised during the batch, already logged.
    pub warnings: Vec<PotentialWarning>,
}

impl Evaluation {
    pub(crate) fn zeroed(kind: KernelKind, n_atoms: usize, n_potentials: usize) -> Self {
        Self {
            kind,
            n_atoms,
            n_potentials,
            data: vec![0.0; kind.output_len(n_atoms) * n_potentials],
            warnings: Vec::new(),
        }
    }

    pub fn block_len(&self) -> usize {
        self.kind.output_len(self.n_atoms)
    }

    /// Output of the `index`-th potential.
    pub fn block(&self, index: usize) -> Option<&[f64]> {
        let len = self.block_len();
        self.data.get(index * len..(index + 1) * len)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_potentials).map(|p| self.block(p).unwrap_or(&[]))
    }

    /// Sums out the per-particle axis of every block.
    ///
    /// Values collapse to one number per potential, gradients to `[n, 3]` per potential.
    pub fn summed(&self) -> Vec<f64> {
        let n = self.n_atoms;
        match self.kind {
            KernelKind::Value => self.blocks().map(|b| b.iter().sum()).collect(),
            KernelKind::Gradient => {
                let mut out = vec![0.0; self.n_potentials * n * 3];
                for (block, target) in self.blocks().zip(out.chunks_mut((n * 3).max(1))) {
                    for row in block.chunks((n * 3).max(1)) {
                        for (t, v) in target.iter_mut().zip(row) {
                            *t += v;
                        }
                    }
                }
                out
            }
        }
    }

    /// Sum of every value in the batch.
    pub fn total_energy(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Gradient of the batch total with respect to every particle position.
    pub fn total_gradient(&self) -> Vec<Vector3<f64>> {
        let n = self.n_atoms;
        let mut total = vec![Vector3::zeros(); n];
        if self.kind != KernelKind::Gradient {
            return total;
        }
        for row in self.data.chunks_exact(3 * n.max(1)) {
            for (t, g) in total.iter_mut().zip(row.chunks_exact(3)) {
                *t += Vector3::new(g[0], g[1], g[2]);
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn summed_values_give_one_number_per_potential() {
        let mut evaluation = Evaluation::zeroed(KernelKind::Value, 3, 2);
        evaluation.data = vec![1.0, 2.0, 3.0, -1.0, 0.5, 0.25];

        assert_eq!(evaluation.block(1), Some(&[-1.0, 0.5, 0.25][..]));
        assert_eq!(evaluation.block(2), None);
        assert_eq!(evaluation.summed(), vec![6.0, -0.25]);
        assert!(f64_approx_equal(evaluation.total_energy(), 5.75));
    }

    #[test]
    fn summed_gradients_collapse_the_row_axis() {
        let n = 2;
        let mut evaluation = Evaluation::zeroed(KernelKind::Gradient, n, 1);
        // out[i, j, axis] = i + 10 j + 100 axis
        for i in 0..n {
            for j in 0..n {
                for axis in 0..3 {
                    evaluation.data[(i * n + j) * 3 + axis] = (i + 10 * j + 100 * axis) as f64;
                }
            }
        }

        let summed = evaluation.summed();
        assert_eq!(summed.len(), n * 3);
        // j = 1, axis = 2: (0 + 10 + 200) + (1 + 10 + 200)
        assert!(f64_approx_equal(summed[5], 421.0));

        let total = evaluation.total_gradient();
        assert!(f64_approx_equal(total[1].z, 421.0));
        assert!(f64_approx_equal(total[0].x, 1.0));
    }

    #[test]
    fn value_batches_have_no_gradient() {
        let evaluation = Evaluation::zeroed(KernelKind::Value, 2, 1);
        assert_eq!(evaluation.total_gradient(), vec![Vector3::zeros(); 2]);
    }
}
