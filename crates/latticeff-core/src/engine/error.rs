use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::cell::{Cell, CellError};
use crate::core::models::species::SpeciesError;
use crate::core::potentials::dispatch::DispatchError;
use crate::core::potentials::family::FamilyError;
use crate::core::potentials::kernel::PotentialWarning;
use crate::core::potentials::registry::RegistryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Distances have not been computed; call compute_distances first")]
    DistancesNotComputed,

    #[error("Replica counts must be positive, found {0:?}")]
    InvalidReplicas([usize; 3]),

    #[error("Replica counts {x:?} cannot capture cutoff {cutoff}; at least {required:?} are needed")]
    InsufficientReplicas {
        x: [usize; 3],
        cutoff: f64,
        required: [usize; 3],
    },

    #[error("Coordinate vector holds {found} values, expected {expected}")]
    CoordinateLength { expected: usize, found: usize },

    #[error("Cell error: {source}")]
    Cell {
        #[from]
        source: CellError,
    },

    #[error("Species error: {source}")]
    Species {
        #[from]
        source: SpeciesError,
    },

    #[error("Potential error: {source}")]
    Family {
        #[from]
        source: FamilyError,
    },

    #[error("Registry error: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },

    #[error("Evaluation failed: {source}")]
    Dispatch {
        #[from]
        source: DispatchError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Numerical warning escalated: {0}")]
    Warning(PotentialWarning),

    #[error("Relaxation aborted after {} steps: {warning}", .history.len())]
    Relax {
        warning: PotentialWarning,
        /// Every snapshot recorded before the failing step.
        history: Vec<Cell>,
    },

    #[error("Minimizer failed: {0}")]
    Minimizer(String),
}
