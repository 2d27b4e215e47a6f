use super::config::RelaxConfig;
use super::error::EngineError;
use super::evaluation::Evaluation;
use super::images::ImageTable;
use super::minimize::{MinimizeError, Minimizer, Objective};
use super::neighbors::NeighborWrapper;
use super::progress::{Progress, ProgressReporter};
use super::state::{Relaxation, annotate};
use crate::core::models::cell::Cell;
use crate::core::potentials::dispatch::{
    DispatchOptions, EncodedPotential, encode_potentials, eval_potentials,
};
use crate::core::potentials::kernel::KernelKind;
use crate::core::potentials::potential::LocalPotential;
use nalgebra::Vector3;
use tracing::{debug, info, instrument, warn};

/// Recomputation arena driven by the minimizer.
///
/// Holds its own copy of the cell and images, so the live engine is never
/// touched while the minimizer runs.
struct RelaxContext<'a> {
    cell: Cell,
    images: ImageTable,
    cutoff: f64,
    species_row: &'a [usize],
    potentials: &'a [EncodedPotential<'a>],
    options: DispatchOptions,
    config: &'a RelaxConfig,
    reporter: &'a ProgressReporter<'a>,
    history: Vec<Cell>,
}

impl RelaxContext<'_> {
    fn energy_and_gradient(&self) -> Result<(f64, Vec<Vector3<f64>>), EngineError> {
        let neighborhood = self.images.neighborhood().with_species(self.species_row);
        let n = self.cell.len();
        let mut energy = Evaluation::zeroed(KernelKind::Value, n, self.potentials.len());
        let mut gradient = Evaluation::zeroed(KernelKind::Gradient, n, self.potentials.len());

        let mut warnings = eval_potentials(
            self.potentials,
            KernelKind::Value,
            &neighborhood,
            &self.options,
            &mut energy.data,
        )?;
        warnings.extend(eval_potentials(
            self.potentials,
            KernelKind::Gradient,
            &neighborhood,
            &self.options,
            &mut gradient.data,
        )?);

        if let Some(first) = warnings.first() {
            if self.config.raise_on_warning {
                return Err(EngineError::Warning(first.clone()));
            }
            for w in &warnings {
                warn!(potential = %w.potential, message = %w.message, "Potential raised a numerical warning");
            }
        }
        Ok((energy.total_energy(), gradient.total_gradient()))
    }
}

impl Objective for RelaxContext<'_> {
    fn evaluate(&mut self, x: &[f64]) -> Result<(f64, Vec<f64>), EngineError> {
        let n = self.cell.len();
        if x.len() != 3 * n {
            return Err(EngineError::CoordinateLength {
                expected: 3 * n,
                found: x.len(),
            });
        }
        let unit = self.config.coordinate_unit;
        let cartesian: Vec<Vector3<f64>> = x
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]) * unit)
            .collect();
        self.cell.set_cartesian(&cartesian, self.config.normalize)?;
        self.images
            .rebuild(&self.cell, self.cutoff, self.options.prefer_parallel);

        let (energy, gradient) = self.energy_and_gradient()?;

        let mut snapshot = self.cell.clone();
        annotate(&mut snapshot, energy, &gradient);
        self.history.push(snapshot);

        let gradient_norm = gradient.iter().map(|g| g.norm_squared()).sum::<f64>().sqrt();
        debug!(step = self.history.len(), energy, gradient_norm, "Relaxation step");
        self.reporter.report(Progress::Step {
            evaluation: self.history.len(),
            energy,
            gradient_norm,
        });

        let (value, slope) = match &self.config.interstitial {
            Some(transform) => transform(energy),
            None => (energy, 1.0),
        };
        let flat = gradient
            .iter()
            .flat_map(|g| [g.x, g.y, g.z])
            .map(|v| v * slope * unit)
            .collect();
        Ok((value, flat))
    }
}

impl NeighborWrapper {
    /// Minimizes the total energy of `potentials` with respect to point positions.
    ///
    /// Requires [`compute_distances`](Self::compute_distances); every step
    /// rebuilds the table at that cutoff. The engine is only updated when
    /// [`RelaxConfig::inplace`] is set. Non-convergence is logged and reported
    /// through [`Relaxation::converged`]. With `raise_on_warning`, the first
    /// numerical warning aborts with [`EngineError::Relax`] carrying every
    /// snapshot taken so far.
    pub fn relax(
        &mut self,
        potentials: &[LocalPotential],
        config: &RelaxConfig,
        minimizer: &dyn Minimizer,
    ) -> Result<Relaxation, EngineError> {
        self.relax_with_progress(potentials, config, minimizer, &ProgressReporter::new())
    }

    #[instrument(skip_all, name = "relax", fields(n_atoms = self.cell.len(), potentials = potentials.len()))]
    pub fn relax_with_progress(
        &mut self,
        potentials: &[LocalPotential],
        config: &RelaxConfig,
        minimizer: &dyn Minimizer,
        reporter: &ProgressReporter,
    ) -> Result<Relaxation, EngineError> {
        let cutoff = self.cutoff.ok_or(EngineError::DistancesNotComputed)?;
        let codec = self.codec.as_ref().ok_or(EngineError::DistancesNotComputed)?;
        let encoded = encode_potentials(potentials, codec, config.ignore_missing_species)?;

        reporter.report(Progress::PhaseStart { name: "Relaxation" });
        info!(cutoff, "Starting relaxation");

        let x0: Vec<f64> = self
            .cell
            .cartesian()
            .iter()
            .flat_map(|c| [c.x, c.y, c.z])
            .map(|v| v / config.coordinate_unit)
            .collect();

        let mut context = RelaxContext {
            cell: self.cell.clone(),
            images: self.images.clone(),
            cutoff,
            species_row: &self.species_row,
            potentials: &encoded,
            options: DispatchOptions {
                cutoff: Some(cutoff),
                prefer_parallel: self.config.prefer_parallel,
                share_precompute: true,
            },
            config,
            reporter,
            history: Vec::new(),
        };

        let outcome = match minimizer.minimize(&mut context, &x0) {
            Ok(outcome) => outcome,
            Err(MinimizeError::Objective(error)) => {
                return Err(escalate(*error, context.history));
            }
            Err(MinimizeError::Setup(message)) => return Err(EngineError::Minimizer(message)),
        };

        // The minimizer may have stopped away from the last evaluated point.
        if let Err(error) = context.evaluate(&outcome.x) {
            return Err(escalate(error, context.history));
        }

        if outcome.success {
            info!(
                iterations = outcome.iterations,
                evaluations = outcome.evaluations,
                "Relaxation converged"
            );
        } else {
            warn!(
                iterations = outcome.iterations,
                message = %outcome.message,
                "Relaxation did not converge"
            );
        }
        reporter.report(Progress::PhaseFinish);

        let RelaxContext {
            cell,
            images,
            mut history,
            ..
        } = context;
        if config.inplace {
            self.cell = cell;
            self.images = images;
        }
        if !config.keep_history {
            history = history.split_off(history.len().saturating_sub(1));
        }

        Ok(Relaxation {
            snapshots: history,
            converged: outcome.success,
            message: outcome.message,
            iterations: outcome.iterations,
        })
    }
}

fn escalate(error: EngineError, history: Vec<Cell>) -> EngineError {
    match error {
        EngineError::Warning(warning) => EngineError::Relax { warning, history },
        other => other,
    }
}
