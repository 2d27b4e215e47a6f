//! # Core Models Module
//!
//! Data structures describing a periodic structure and the distances inside it.
//!
//! ## Key Components
//!
//! - [`cell`] - Lattice vectors, fractional coordinates, species labels and metadata
//! - [`species`] - Opaque species labels and their dense integer encoding
//! - [`distances`] - The sparse row-by-column distance table in CSR layout
//!
//! ## Usage
//!
//! ```ignore
//! use latticeff::core::models::cell::Cell;
//! use nalgebra::{Matrix3, Vector3};
//!
//! let cell = Cell::new(
//!     Matrix3::identity() * 4.0,
//!     vec![Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5)],
//!     vec!["a".into(), "b".into()],
//! )?;
//! let positions = cell.cartesian();
//! ```

pub mod cell;
pub mod distances;
pub mod species;
