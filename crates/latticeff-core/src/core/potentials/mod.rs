//! # Potentials Module
//!
//! Local interaction terms and the machinery that evaluates them over a sparse
//! neighbor table.
//!
//! ## Overview
//!
//! A [`family::Family`] is plain data: a parameter schema with bounds and defaults,
//! a cutoff rule, optional shared r-functions and a constructor for its kernel.
//! Instantiating a family with concrete parameters and an optional species tag
//! yields a [`potential::LocalPotential`]. Potentials are evaluated in batches by
//! [`dispatch::eval_potentials`], which zeroes each output block, shares precomputed
//! distance functions across the batch and collects numerical warnings.
//!
//! ## Key Components
//!
//! - [`params`] / [`tag`] - Parameter sets with bounds, and typed species tags
//! - [`kernel`] - The kernel capability trait and its calling contract
//! - [`pair`] / [`triple`] - Generic two- and three-body kernels over scalar functions
//! - [`rows`] - Serial and row-parallel drivers
//! - [`numerical`] - Central-difference gradient fallback
//! - [`precompute`] - Shared r-function columns
//! - [`catalog`] - Built-in families
//! - [`registry`] - Tag-keyed family registry and TOML persistence of potential sets
//!
//! ## Output Layout
//!
//! Value kernels fill `[n]` and gradient kernels fill `[n, n, 3]`, where
//! `out[i, j, axis]` is the derivative of the value of row `i` with respect to the
//! position of particle `j`.

pub mod catalog;
pub mod dispatch;
pub mod family;
pub mod kernel;
pub mod numerical;
pub mod pair;
pub mod params;
pub mod potential;
pub mod precompute;
pub mod registry;
pub mod rows;
pub mod tag;
pub mod triple;
