//! # Core Module
//!
//! Stateless building blocks of the library: the periodic cell model and the
//! local potential machinery that evaluates energies and gradients over a sparse
//! neighbor table.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Periodic cells, species labels and
//!   the sparse pair-distance table
//! - **Interaction Terms** ([`potentials`]) - Potential families, kernels, the batch
//!   dispatcher, the built-in catalog and the family registry
//!
//! Nothing in this module owns mutable engine state. The neighbor search and the
//! relaxation driver live in [`crate::engine`].

pub mod models;
pub mod potentials;
