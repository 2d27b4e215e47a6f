use crate::core::models::cell::{Cell, MetaValue};
use nalgebra::Vector3;

/// Metadata key holding the total energy of a relaxation snapshot.
pub const META_TOTAL_ENERGY: &str = "total-energy";
/// Metadata key holding the per-particle forces (negative gradient) of a snapshot.
pub const META_FORCES: &str = "forces";

/// Outcome of a relaxation run.
#[derive(Debug, Clone)]
pub struct Relaxation {
    /// Visited geometries in evaluation order, or only the final one.
    pub snapshots: Vec<Cell>,
    pub converged: bool,
    pub message: String,
    pub iterations: u64,
}

impl Relaxation {
    /// The relaxed geometry.
    pub fn final_cell(&self) -> Option<&Cell> {
        self.snapshots.last()
    }

    pub fn final_energy(&self) -> Option<f64> {
        self.final_cell().and_then(snapshot_energy)
    }

    /// The snapshot with the lowest recorded energy.
    pub fn lowest(&self) -> Option<&Cell> {
        self.snapshots
            .iter()
            .filter_map(|cell| snapshot_energy(cell).map(|e| (e, cell)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, cell)| cell)
    }
}

pub fn snapshot_energy(cell: &Cell) -> Option<f64> {
    cell.meta.get(META_TOTAL_ENERGY).and_then(MetaValue::as_number)
}

pub fn snapshot_forces(cell: &Cell) -> Option<&[Vector3<f64>]> {
    cell.meta.get(META_FORCES).and_then(MetaValue::as_vectors)
}

/// Stores the energy and forces of a snapshot in its metadata.
pub(crate) fn annotate(cell: &mut Cell, energy: f64, gradient: &[Vector3<f64>]) {
    cell.meta
        .insert(META_TOTAL_ENERGY.to_string(), MetaValue::Number(energy));
    cell.meta.insert(
        META_FORCES.to_string(),
        MetaValue::Vectors(gradient.iter().map(|g| -g).collect()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn snapshot(energy: f64) -> Cell {
        let mut cell = Cell::new(
            Matrix3::identity(),
            vec![Vector3::zeros()],
            vec!["a".into()],
        )
        .unwrap();
        annotate(&mut cell, energy, &[Vector3::new(1.0, 0.0, -2.0)]);
        cell
    }

    #[test]
    fn annotate_stores_energy_and_forces() {
        let cell = snapshot(-3.5);
        assert_eq!(snapshot_energy(&cell), Some(-3.5));
        assert_eq!(
            snapshot_forces(&cell).unwrap(),
            &[Vector3::new(-1.0, 0.0, 2.0)]
        );
    }

    #[test]
    fn lowest_snapshot_is_found_regardless_of_order() {
        let relaxation = Relaxation {
            snapshots: vec![snapshot(1.0), snapshot(-2.0), snapshot(-1.0)],
            converged: true,
            message: String::new(),
            iterations: 3,
        };
        assert_eq!(relaxation.final_energy(), Some(-1.0));
        assert_eq!(relaxation.lowest().and_then(snapshot_energy), Some(-2.0));
    }
}
