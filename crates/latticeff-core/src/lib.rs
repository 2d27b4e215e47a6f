//! # latticeff
//!
//! Periodic neighbor search, local interatomic potentials and structural relaxation
//! for atomistic models in a periodic cell.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Cell`, `Species`, the sparse
//!   `PairDistances` table) and the potential machinery: parameterized families, kernels,
//!   the batch dispatcher and a registry of built-in families.
//!
//! - **[`engine`]: The Logic Core.** The stateful `NeighborWrapper`, which caches periodic
//!   images and distances for a cell, evaluates potentials over them and relaxes point
//!   positions through a pluggable minimizer.
//!
//! ## Example
//!
//! ```no_run
//! use latticeff::{
//!     Cell, FamilyRegistry, LbfgsMinimizer, NeighborConfig, NeighborWrapper, RelaxConfig,
//!     Species,
//! };
//! use latticeff::core::potentials::catalog::LENNARD_JONES;
//! use latticeff::core::potentials::params::parameter_set;
//! use nalgebra::{Matrix3, Vector3};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cell = Cell::new(
//!     Matrix3::identity() * 4.0,
//!     vec![Vector3::new(0.1, 0.1, 0.1), Vector3::new(0.4, 0.1, 0.1)],
//!     vec![Species::from("Ar"), Species::from("Ar")],
//! )?;
//! let config = NeighborConfig::builder().x([2, 2, 2]).build()?;
//! let mut engine = NeighborWrapper::new(cell, config)?;
//! engine.compute_distances(2.5)?;
//!
//! let lj = FamilyRegistry::with_builtin().instantiate(
//!     LENNARD_JONES,
//!     None,
//!     parameter_set([("epsilon", 1.0), ("sigma", 1.0), ("a", 2.5)]),
//! )?;
//! let energy = engine.total(std::slice::from_ref(&lj))?;
//! let relaxed = engine.relax(&[lj], &RelaxConfig::default(), &LbfgsMinimizer::default())?;
//! println!("{energy} -> {:?}", relaxed.final_energy());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod engine;

pub use crate::core::models::cell::Cell;
pub use crate::core::models::species::Species;
pub use crate::core::potentials::kernel::KernelKind;
pub use crate::core::potentials::potential::LocalPotential;
pub use crate::core::potentials::registry::FamilyRegistry;
pub use crate::engine::config::{NeighborConfig, RelaxConfig};
pub use crate::engine::error::EngineError;
pub use crate::engine::minimize::LbfgsMinimizer;
pub use crate::engine::neighbors::NeighborWrapper;
