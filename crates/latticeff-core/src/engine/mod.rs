//! # Engine Module
//!
//! Stateful layer of the library: the periodic neighbor engine, batch evaluation of
//! local potentials over its distance table, and structural relaxation.
//!
//! ## Overview
//!
//! A [`neighbors::NeighborWrapper`] owns a [`crate::core::models::cell::Cell`] together
//! with the periodic images requested by its [`config::NeighborConfig`]. After
//! [`compute_distances`](neighbors::NeighborWrapper::compute_distances) it can evaluate
//! energies and gradients of any set of potentials, reduce pair distances by species,
//! estimate radial distribution functions and relax point positions with a
//! [`minimize::Minimizer`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Neighbor and relaxation settings, builders and TOML loading
//! - **Periodic Images** ([`images`]) - Lattice shifts, image coordinates and the sparse distance table
//! - **Evaluation Results** ([`evaluation`]) - Stacked per-potential kernel output
//! - **Minimization** ([`minimize`]) - The minimizer seam and its L-BFGS implementation
//! - **Relaxation** ([`relax`]) - Energy minimization driven through the neighbor engine
//! - **State Tracking** ([`state`]) - Relaxation snapshots annotated with energies and forces
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod error;
pub mod evaluation;
pub mod images;
pub mod minimize;
pub mod neighbors;
pub mod progress;
pub mod relax;
pub(crate) mod search;
pub mod state;
