use super::config::NeighborConfig;
use super::error::EngineError;
use super::evaluation::Evaluation;
use super::images::ImageTable;
use crate::core::models::cell::Cell;
use crate::core::models::distances::PairDistances;
use crate::core::models::species::{Species, SpeciesCodec};
use crate::core::potentials::dispatch::{DispatchOptions, encode_potentials, eval_potentials};
use crate::core::potentials::kernel::{KernelKind, Neighborhood, PotentialWarning};
use crate::core::potentials::potential::LocalPotential;
use itertools::Itertools;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{info, instrument, warn};

/// Unordered species pair, smaller label first.
pub type SpeciesPair = (Species, Species);

/// Periodic neighbor engine for one cell.
///
/// Owns a private copy of the cell, the periodic images for the configured
/// replica counts and the sparse distance table of the last
/// [`compute_distances`](Self::compute_distances) call. Every operation that
/// reads distances fails with [`EngineError::DistancesNotComputed`] until then.
#[derive(Debug, Clone)]
pub struct NeighborWrapper {
    pub(crate) cell: Cell,
    pub(crate) config: NeighborConfig,
    pub(crate) images: ImageTable,
    pub(crate) codec: Option<SpeciesCodec>,
    pub(crate) species_row: Vec<usize>,
    pub(crate) cutoff: Option<f64>,
}

impl NeighborWrapper {
    pub fn new(cell: Cell, config: NeighborConfig) -> Result<Self, EngineError> {
        let images = ImageTable::new(config.x)?;
        let cell = if config.normalize {
            cell.normalized()
        } else {
            cell
        };
        Ok(Self {
            cell,
            config,
            images,
            codec: None,
            species_row: Vec::new(),
            cutoff: None,
        })
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    pub fn x(&self) -> [usize; 3] {
        self.images.x()
    }

    pub fn shift_vectors(&self) -> &[Vector3<i32>] {
        self.images.shift_vectors()
    }

    /// Cutoff of the cached table, `None` before [`compute_distances`](Self::compute_distances).
    pub fn cutoff(&self) -> Option<f64> {
        self.cutoff
    }

    pub fn codec(&self) -> Option<&SpeciesCodec> {
        self.codec.as_ref()
    }

    pub fn species_row(&self) -> &[usize] {
        &self.species_row
    }

    pub fn cartesian_row(&self) -> &[Vector3<f64>] {
        self.images.cartesian_row()
    }

    pub fn cartesian_col(&self) -> &[Vector3<f64>] {
        self.images.cartesian_col()
    }

    /// Changes the replica counts and drops the cached table.
    pub fn set_x(&mut self, x: [usize; 3]) -> Result<(), EngineError> {
        self.images = ImageTable::new(x)?;
        self.config.x = x;
        self.cutoff = None;
        Ok(())
    }

    /// Replaces the cell and drops the cached table and species encoding.
    pub fn set_cell(&mut self, cell: Cell, normalize: bool) {
        self.cell = if normalize { cell.normalized() } else { cell };
        self.codec = None;
        self.species_row.clear();
        self.images.clear();
        self.cutoff = None;
    }

    /// Moves every point to the given Cartesian position.
    ///
    /// The species encoding is kept. If a table was cached it is rebuilt at the
    /// same cutoff, so rows and distances stay consistent with the new positions.
    pub fn set_cell_cartesian(
        &mut self,
        cartesian: &[Vector3<f64>],
        normalize: bool,
    ) -> Result<(), EngineError> {
        self.cell.set_cartesian(cartesian, normalize)?;
        match self.cutoff {
            Some(cutoff) => self
                .images
                .rebuild(&self.cell, cutoff, self.config.prefer_parallel),
            None => self.images.clear(),
        }
        Ok(())
    }

    /// Builds the periodic images and the distance table for `cutoff`, then
    /// re-encodes the species of the cell.
    #[instrument(skip_all, name = "compute_distances", fields(cutoff = cutoff, n_atoms = self.cell.len()))]
    pub fn compute_distances(&mut self, cutoff: f64) -> Result<(), EngineError> {
        if self.config.strict_replicas {
            let required = Self::replicas_for(&self.cell, cutoff)?;
            let x = self.x();
            if x.iter().zip(&required).any(|(have, need)| have < need) {
                return Err(EngineError::InsufficientReplicas {
                    x,
                    cutoff,
                    required,
                });
            }
        }

        self.images
            .rebuild(&self.cell, cutoff, self.config.prefer_parallel);
        let codec = SpeciesCodec::from_labels(&self.cell.values);
        self.species_row = codec.encode_all(&self.cell.values)?;
        self.codec = Some(codec);
        self.cutoff = Some(cutoff);

        info!(
            shifts = self.shift_vectors().len(),
            pairs = self.images.distances().nnz(),
            "Distances computed"
        );
        Ok(())
    }

    /// Smallest replica counts for which no neighbor within `cutoff` can be missed.
    ///
    /// A pair closer than `cutoff` differs by less than `cutoff / w_i` in
    /// fractional coordinate `i`, `w_i` being the distance between the two cell
    /// faces spanned by the other lattice vectors. Two points also sit up to the
    /// fractional spread of the cell apart, so axis `i` needs
    /// `x_i >= ceil(cutoff / w_i) + max(1, ceil(spread_i))`. For a normalized cell
    /// this is `(x_i - 1) w_i >= cutoff`.
    pub fn replicas_for(cell: &Cell, cutoff: f64) -> Result<[usize; 3], EngineError> {
        let widths = cell.perpendicular_widths()?;
        let spread = cell.fractional_spread();
        Ok([0, 1, 2].map(|a| {
            if cutoff > 0.0 {
                (cutoff / widths[a]).ceil() as usize + (spread[a].ceil() as usize).max(1)
            } else {
                1
            }
        }))
    }

    /// Whether the current replica counts capture every neighbor within `cutoff`.
    pub fn covers_cutoff(&self, cutoff: f64) -> Result<bool, EngineError> {
        let required = Self::replicas_for(&self.cell, cutoff)?;
        Ok(self.x().iter().zip(&required).all(|(have, need)| have >= need))
    }

    pub fn distances(&self) -> Result<&PairDistances, EngineError> {
        self.cutoff
            .map(|_| self.images.distances())
            .ok_or(EngineError::DistancesNotComputed)
    }

    pub fn neighborhood(&self) -> Result<Neighborhood<'_>, EngineError> {
        let distances = self.distances()?;
        Ok(Neighborhood::new(
            distances,
            self.images.cartesian_row(),
            self.images.cartesian_col(),
        )
        .with_species(&self.species_row))
    }

    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            cutoff: self.cutoff,
            prefer_parallel: self.config.prefer_parallel,
            share_precompute: true,
        }
    }

    /// Groups distances by unordered species pair and reduces each group with `f`.
    ///
    /// Every pair of species present in the cell is passed to `f`, possibly with
    /// no distances. Both directions of a pair are included, so a distance within
    /// the cell appears twice. Groups for which `f` returns `None` are dropped.
    pub fn pair_reduction_function<T, F>(
        &self,
        mut f: F,
    ) -> Result<BTreeMap<SpeciesPair, T>, EngineError>
    where
        F: FnMut(&[f64]) -> Option<T>,
    {
        let distances = self.distances()?;
        let codec = self.codec.as_ref().ok_or(EngineError::DistancesNotComputed)?;
        let n = self.cell.len();

        let mut groups: BTreeMap<SpeciesPair, Vec<f64>> = codec
            .species()
            .iter()
            .combinations_with_replacement(2)
            .map(|pair| ((pair[0].clone(), pair[1].clone()), Vec::new()))
            .collect();
        for (row, col, d) in distances.iter() {
            let (a, b) = (&self.cell.values[row], &self.cell.values[col % n]);
            let key = if a <= b {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            groups.entry(key).or_default().push(d);
        }

        Ok(groups
            .into_iter()
            .filter_map(|(key, group)| f(&group).map(|value| (key, value)))
            .collect())
    }

    /// Gaussian-smeared radial distribution per species pair, sampled at `r`.
    ///
    /// Each distance contributes a unit-area gaussian of width `sigma` and the sum
    /// is divided by the shell area `4 pi r^2`. `r` should not contain zero.
    pub fn rdf(
        &self,
        r: &[f64],
        sigma: f64,
    ) -> Result<BTreeMap<SpeciesPair, Vec<f64>>, EngineError> {
        let norm = 1.0 / (sigma * (2.0 * PI).sqrt());
        self.pair_reduction_function(|group| {
            Some(
                r.iter()
                    .map(|&ri| {
                        let smeared: f64 = group
                            .iter()
                            .map(|&d| norm * (-(ri - d).powi(2) / (2.0 * sigma * sigma)).exp())
                            .sum();
                        smeared / (4.0 * PI * ri * ri)
                    })
                    .collect(),
            )
        })
    }

    /// Evaluates `potentials` into `out`, one `kind`-shaped block per potential.
    ///
    /// With `ignore_missing_species`, potentials tagged with species the cell
    /// does not contain contribute zeros instead of failing.
    pub fn eval_into(
        &self,
        potentials: &[LocalPotential],
        kind: KernelKind,
        ignore_missing_species: bool,
        out: &mut [f64],
    ) -> Result<Vec<PotentialWarning>, EngineError> {
        let neighborhood = self.neighborhood()?;
        let codec = self.codec.as_ref().ok_or(EngineError::DistancesNotComputed)?;
        let encoded = encode_potentials(potentials, codec, ignore_missing_species)?;
        let warnings = eval_potentials(
            &encoded,
            kind,
            &neighborhood,
            &self.dispatch_options(),
            out,
        )?;
        for w in &warnings {
            warn!(potential = %w.potential, message = %w.message, "Potential raised a numerical warning");
        }
        Ok(warnings)
    }

    pub fn eval(
        &self,
        potentials: &[LocalPotential],
        kind: KernelKind,
        ignore_missing_species: bool,
    ) -> Result<Evaluation, EngineError> {
        let mut evaluation = Evaluation::zeroed(kind, self.cell.len(), potentials.len());
        evaluation.warnings =
            self.eval_into(potentials, kind, ignore_missing_species, &mut evaluation.data)?;
        Ok(evaluation)
    }

    /// Output of a single potential.
    pub fn eval_one(
        &self,
        potential: &LocalPotential,
        kind: KernelKind,
        ignore_missing_species: bool,
    ) -> Result<Vec<f64>, EngineError> {
        Ok(self
            .eval(std::slice::from_ref(potential), kind, ignore_missing_species)?
            .data)
    }

    /// Total energy of the cell under `potentials`.
    ///
    /// Potentials are summed as given: passing both `a-b` and `b-a` counts the
    /// interaction twice.
    pub fn total(&self, potentials: &[LocalPotential]) -> Result<f64, EngineError> {
        Ok(self.eval(potentials, KernelKind::Value, false)?.total_energy())
    }

    /// Gradient of [`total`](Self::total) with respect to every point position.
    pub fn grad(&self, potentials: &[LocalPotential]) -> Result<Vec<Vector3<f64>>, EngineError> {
        Ok(self
            .eval(potentials, KernelKind::Gradient, false)?
            .total_gradient())
    }
}
