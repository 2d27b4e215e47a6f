use super::kernel::{
    KernelInput, KernelKind, KernelResult, Neighborhood, PotentialKernel, PotentialWarning,
    SpeciesMatch,
};
use super::potential::LocalPotential;
use super::precompute::{BoundRFunction, PrecomputedView, SharedPrecompute};
use crate::core::models::species::{SpeciesCodec, SpeciesError};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Potential cutoff exceeds the computed neighbors: {cutoff} > {available} ({potential})")]
    CutoffExceeded {
        potential: String,
        cutoff: f64,
        available: f64,
    },
    #[error("Output buffer holds {found} values, expected {expected}")]
    BufferSize { expected: usize, found: usize },
    #[error("Species mask of length {found} given to '{potential}' with coordination number {expected}")]
    MaskArity {
        potential: String,
        expected: usize,
        found: usize,
    },
}

/// Calls a kernel on a neighborhood, filling in species defaults.
///
/// Without species data or a mask every particle is treated as one species and
/// the potential applies to all of them.
#[allow(clippy::too_many_arguments)]
pub fn call_screened(
    kernel: &dyn PotentialKernel,
    kind: KernelKind,
    coordination_number: usize,
    neighborhood: &Neighborhood<'_>,
    species_mask: Option<&[SpeciesMatch]>,
    precomputed: PrecomputedView<'_>,
    r_functions: &[BoundRFunction],
    parallel: bool,
    out: &mut [f64],
) -> KernelResult {
    let zeros;
    let any;
    let (species_row, species_mask) = match (neighborhood.species_row, species_mask) {
        (Some(row), Some(mask)) => (row, mask),
        _ => {
            zeros = vec![0; neighborhood.n_atoms()];
            any = vec![SpeciesMatch::Any; coordination_number.max(1)];
            (zeros.as_slice(), any.as_slice())
        }
    };
    let input = KernelInput {
        distances: neighborhood.distances,
        cartesian_row: neighborhood.cartesian_row,
        cartesian_col: neighborhood.cartesian_col,
        species_row,
        species_mask,
        precomputed,
        r_functions,
    };
    kernel.run(kind, parallel, &input, out)
}

/// A potential paired with its tag encoded against a structure's species.
#[derive(Debug, Clone)]
pub struct EncodedPotential<'a> {
    pub potential: &'a LocalPotential,
    pub species_mask: Vec<SpeciesMatch>,
}

/// Encodes the tags of `potentials` with `codec`.
///
/// Untagged potentials match every species. With `ignore_missing_species`, tag
/// species absent from the codec become [`SpeciesMatch::Absent`] instead of an error.
pub fn encode_potentials<'a>(
    potentials: &'a [LocalPotential],
    codec: &SpeciesCodec,
    ignore_missing_species: bool,
) -> Result<Vec<EncodedPotential<'a>>, SpeciesError> {
    potentials
        .iter()
        .map(|potential| {
            let species_mask = match potential.tag() {
                None => vec![SpeciesMatch::Any; potential.coordination_number()],
                Some(tag) => tag
                    .species()
                    .into_iter()
                    .map(|s| match codec.encode(s) {
                        Ok(i) => Ok(SpeciesMatch::Exactly(i)),
                        Err(_) if ignore_missing_species => Ok(SpeciesMatch::Absent),
                        Err(e) => Err(e),
                    })
                    .collect::<Result<_, _>>()?,
            };
            Ok(EncodedPotential {
                potential,
                species_mask,
            })
        })
        .collect()
}

/// Options shared by every potential of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchOptions {
    /// Cutoff the distance table was built with. Potentials reaching further are rejected.
    pub cutoff: Option<f64>,
    pub prefer_parallel: bool,
    /// Compute r-functions once for the whole batch.
    pub share_precompute: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            cutoff: None,
            prefer_parallel: cfg!(feature = "parallel"),
            share_precompute: true,
        }
    }
}

/// Evaluates a batch of potentials into `out`, shape `[n_potentials, ...]`.
///
/// Each potential's block of `out` is zeroed before its kernel accumulates into it.
/// Numerical warnings and non-finite outputs are collected and returned; they
/// never stop the batch.
#[instrument(skip_all, name = "eval_potentials", fields(kind = %kind, potentials = potentials.len()))]
pub fn eval_potentials(
    potentials: &[EncodedPotential<'_>],
    kind: KernelKind,
    neighborhood: &Neighborhood<'_>,
    options: &DispatchOptions,
    out: &mut [f64],
) -> Result<Vec<PotentialWarning>, DispatchError> {
    let block = kind.output_len(neighborhood.n_atoms());
    let expected = block * potentials.len();
    if out.len() != expected {
        return Err(DispatchError::BufferSize {
            expected,
            found: out.len(),
        });
    }

    for p in potentials {
        if let Some(available) = options.cutoff {
            if p.potential.cutoff() > available {
                return Err(DispatchError::CutoffExceeded {
                    potential: p.potential.to_string(),
                    cutoff: p.potential.cutoff(),
                    available,
                });
            }
        }
        if p.species_mask.len() != p.potential.coordination_number() {
            return Err(DispatchError::MaskArity {
                potential: p.potential.to_string(),
                expected: p.potential.coordination_number(),
                found: p.species_mask.len(),
            });
        }
    }

    let shared = options.share_precompute.then(|| {
        SharedPrecompute::for_potentials(
            neighborhood.distances.data(),
            potentials
                .iter()
                .map(|p| p.potential.scale().is_none().then(|| p.potential.r_functions())),
        )
    });
    if let Some(shared) = &shared {
        debug!(columns = shared.columns(), "Shared r-functions precomputed");
    }

    let mut warnings = Vec::new();
    let blocks = out.chunks_mut(block.max(1));
    for (index, (p, slot)) in potentials.iter().zip(blocks).enumerate() {
        slot.fill(0.0);
        let view = shared.as_ref().and_then(|s| s.view(index));
        if let Err(warning) = p.potential.evaluate(
            kind,
            neighborhood,
            Some(p.species_mask.as_slice()),
            view,
            options.prefer_parallel,
            slot,
        ) {
            warnings.push(warning);
        }
        if slot.iter().any(|v| !v.is_finite()) {
            warnings.push(PotentialWarning::new(
                p.potential.to_string(),
                format!("{kind} produced non-finite values"),
            ));
        }
    }
    Ok(warnings)
}
