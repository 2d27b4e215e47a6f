use super::numerical::numerical_gradient;
use super::precompute::{BoundRFunction, PrecomputedView};
use crate::core::models::distances::PairDistances;
use nalgebra::Vector3;
use std::fmt;
use thiserror::Error;

/// Which quantity a kernel computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// Per-particle values, shape `[n]`.
    Value,
    /// Gradients of every per-particle value w.r.t. every particle position, shape `[n, n, 3]`.
    Gradient,
}

impl KernelKind {
    /// Length of the flat output buffer for `n_atoms` row particles.
    pub fn output_len(self, n_atoms: usize) -> usize {
        match self {
            KernelKind::Value => n_atoms,
            KernelKind::Gradient => n_atoms * n_atoms * 3,
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Value => f.write_str("kernel"),
            KernelKind::Gradient => f.write_str("kernel_gradient"),
        }
    }
}

/// Flat index of `d(out[i]) / d(position[j][axis])` in a gradient buffer.
#[inline]
pub fn gradient_index(n_atoms: usize, i: usize, j: usize, axis: usize) -> usize {
    (i * n_atoms + j) * 3 + axis
}

/// One entry of an encoded species mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeciesMatch {
    /// Untagged potentials apply to every species.
    Any,
    Exactly(usize),
    /// The tagged species is not present in the structure, so nothing matches.
    Absent,
}

impl SpeciesMatch {
    #[inline]
    pub fn matches(self, species: usize) -> bool {
        match self {
            SpeciesMatch::Any => true,
            SpeciesMatch::Exactly(s) => s == species,
            SpeciesMatch::Absent => false,
        }
    }
}

/// A non-fatal numerical warning raised while evaluating a potential.
///
/// The kernel output is still written when a warning is raised.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{potential}: {message}")]
pub struct PotentialWarning {
    pub potential: String,
    pub message: String,
}

impl PotentialWarning {
    pub fn new(potential: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            potential: potential.into(),
            message: message.into(),
        }
    }
}

pub type KernelResult = Result<(), PotentialWarning>;

/// Geometry a batch of potentials is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood<'a> {
    pub distances: &'a PairDistances,
    pub cartesian_row: &'a [Vector3<f64>],
    pub cartesian_col: &'a [Vector3<f64>],
    /// Encoded species of row particles. `None` disables species masking.
    pub species_row: Option<&'a [usize]>,
}

impl<'a> Neighborhood<'a> {
    pub fn new(
        distances: &'a PairDistances,
        cartesian_row: &'a [Vector3<f64>],
        cartesian_col: &'a [Vector3<f64>],
    ) -> Self {
        Self {
            distances,
            cartesian_row,
            cartesian_col,
            species_row: None,
        }
    }

    pub fn with_species(mut self, species_row: &'a [usize]) -> Self {
        self.species_row = Some(species_row);
        self
    }

    pub fn n_atoms(&self) -> usize {
        self.cartesian_row.len()
    }
}

/// Everything a kernel reads.
///
/// Columns map back to row particles through `column % n_rows`. `precomputed`
/// holds the values of `r_functions` at every sparse entry, slot for slot.
#[derive(Debug, Clone, Copy)]
pub struct KernelInput<'a> {
    pub distances: &'a PairDistances,
    pub cartesian_row: &'a [Vector3<f64>],
    pub cartesian_col: &'a [Vector3<f64>],
    pub species_row: &'a [usize],
    pub species_mask: &'a [SpeciesMatch],
    pub precomputed: PrecomputedView<'a>,
    pub r_functions: &'a [BoundRFunction],
}

impl<'a> KernelInput<'a> {
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.cartesian_row.len()
    }

    #[inline]
    pub fn row_matches(&self, row: usize) -> bool {
        self.species_mask[0].matches(self.species_row[row])
    }

    /// Whether the particle behind `column` matches mask entry `slot`.
    #[inline]
    pub fn column_matches(&self, column: usize, slot: usize) -> bool {
        self.species_mask[slot].matches(self.species_row[column % self.n_rows()])
    }
}

/// Value and gradient evaluators of a potential family.
///
/// Kernels accumulate into `out` and never clear it. Output buffers are
/// `[n]` for values and `[n, n, 3]` for gradients, flattened row-major. When the
/// family declares r-functions, `input.precomputed` must carry them.
pub trait PotentialKernel: Send + Sync + fmt::Debug {
    fn value(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult;

    /// Central-difference gradient of [`PotentialKernel::value`] unless overridden.
    fn gradient(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        numerical_gradient(self, input, out)
    }

    fn value_parallel(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        self.value(input, out)
    }

    fn gradient_parallel(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        self.gradient(input, out)
    }

    fn run(
        &self,
        kind: KernelKind,
        parallel: bool,
        input: &KernelInput<'_>,
        out: &mut [f64],
    ) -> KernelResult {
        match (kind, parallel) {
            (KernelKind::Value, false) => self.value(input, out),
            (KernelKind::Value, true) => self.value_parallel(input, out),
            (KernelKind::Gradient, false) => self.gradient(input, out),
            (KernelKind::Gradient, true) => self.gradient_parallel(input, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_len_matches_kernel_shapes() {
        assert_eq!(KernelKind::Value.output_len(4), 4);
        assert_eq!(KernelKind::Gradient.output_len(4), 48);
    }

    #[test]
    fn gradient_index_is_row_major() {
        assert_eq!(gradient_index(3, 0, 0, 2), 2);
        assert_eq!(gradient_index(3, 1, 0, 0), 9);
        assert_eq!(gradient_index(3, 2, 2, 2), 26);
    }

    #[test]
    fn absent_species_never_match() {
        assert!(SpeciesMatch::Any.matches(7));
        assert!(SpeciesMatch::Exactly(1).matches(1));
        assert!(!SpeciesMatch::Exactly(1).matches(0));
        assert!(!SpeciesMatch::Absent.matches(0));
    }
}
