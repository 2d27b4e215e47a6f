//! Built-in potential families.
//!
//! Each submodule exposes constructors returning a fresh [`Family`]. Every
//! built-in family has an analytic gradient; the numerical fallback is only
//! used by families that do not override it.

pub mod behler;
pub mod harmonic;
pub mod lennard_jones;
pub mod on_site;
pub mod sigmoid;
pub mod stillinger_weber;

use super::family::{Family, FamilyError};
use super::params::ParameterSet;

pub const ON_SITE: &str = "on-site";
pub const HARMONIC_REPULSION: &str = "harmonic repulsion";
pub const LENNARD_JONES: &str = "Lennard-Jones";
pub const STILLINGER_WEBER_2: &str = "Stillinger-Weber type 2";
pub const STILLINGER_WEBER_3: &str = "Stillinger-Weber type 3";
pub const BEHLER_2: &str = "Behler type 2";
pub const SIGMOID: &str = "Sigmoid";
pub const BEHLER_4: &str = "Behler type 4";
pub const BEHLER_5: &str = "Behler type 5";

pub fn builtin_families() -> Vec<Family> {
    vec![
        on_site::family(),
        harmonic::family(),
        lennard_jones::family(),
        stillinger_weber::sw2_family(),
        stillinger_weber::sw3_family(),
        behler::g2_family(),
        sigmoid::family(),
        behler::g4_family(),
        behler::g5_family(),
    ]
}

pub(crate) fn require(
    family: &str,
    parameters: &ParameterSet,
    name: &str,
) -> Result<f64, FamilyError> {
    parameters
        .get(name)
        .copied()
        .ok_or_else(|| FamilyError::MissingParameter {
            family: family.to_string(),
            parameter: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::distances::PairDistances;
    use crate::core::potentials::kernel::{KernelKind, Neighborhood, SpeciesMatch, gradient_index};
    use crate::core::potentials::numerical::ValueOnly;
    use crate::core::potentials::params::parameter_set;
    use crate::core::potentials::potential::LocalPotential;
    use crate::core::potentials::precompute::BoundRFunction;
    use crate::core::potentials::triple::TripleKernel;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const IMAGE_SHIFT: f64 = 4.0;
    const STEP: f64 = 1e-5;

    /// Particles plus one copy shifted along x, standing in for a periodic image.
    struct Cluster {
        rows: Vec<Vector3<f64>>,
        species: Vec<usize>,
    }

    impl Cluster {
        fn fixed() -> Self {
            let rows = vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.2, 0.1, 0.0),
                Vector3::new(0.3, 1.25, 0.2),
                Vector3::new(1.4, 1.3, 0.4),
                Vector3::new(0.7, 0.6, 1.1),
                Vector3::new(2.2, 0.7, 0.5),
            ];
            let species = (0..rows.len()).map(|i| i % 2).collect();
            Self { rows, species }
        }

        fn random(seed: u64, n: usize) -> Self {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut rows: Vec<Vector3<f64>> = Vec::with_capacity(n);
            while rows.len() < n {
                let p = Vector3::new(
                    rng.gen_range(0.0..3.0),
                    rng.gen_range(0.0..3.0),
                    rng.gen_range(0.0..3.0),
                );
                if rows.iter().all(|q| (p - q).norm() > 1.0) {
                    rows.push(p);
                }
            }
            let species = (0..n).map(|_| rng.gen_range(0..2)).collect();
            Self { rows, species }
        }

        fn columns(rows: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
            let shift = Vector3::new(IMAGE_SHIFT, 0.0, 0.0);
            rows.iter()
                .copied()
                .chain(rows.iter().map(|p| p + shift))
                .collect()
        }

        fn table(rows: &[Vector3<f64>], cols: &[Vector3<f64>]) -> PairDistances {
            let triplets: Vec<(usize, usize, f64)> = (0..rows.len())
                .flat_map(|i| {
                    (0..cols.len())
                        .filter(move |&c| c != i)
                        .map(move |c| (i, c, (rows[i] - cols[c]).norm()))
                })
                .collect();
            PairDistances::from_triplets(rows.len(), cols.len(), triplets)
        }

        fn evaluate(
            &self,
            potential: &LocalPotential,
            mask: Option<&[SpeciesMatch]>,
            kind: KernelKind,
            rows: &[Vector3<f64>],
            parallel: bool,
        ) -> Vec<f64> {
            let cols = Self::columns(rows);
            let table = Self::table(rows, &cols);
            let neighborhood = Neighborhood::new(&table, rows, &cols).with_species(&self.species);
            let mut out = vec![0.0; kind.output_len(rows.len())];
            potential
                .evaluate(kind, &neighborhood, mask, None, parallel, &mut out)
                .unwrap();
            out
        }

        fn gradient(&self, potential: &LocalPotential, mask: Option<&[SpeciesMatch]>) -> Vec<f64> {
            self.evaluate(potential, mask, KernelKind::Gradient, &self.rows, false)
        }

        fn central_difference(
            &self,
            potential: &LocalPotential,
            mask: Option<&[SpeciesMatch]>,
        ) -> Vec<f64> {
            let n = self.rows.len();
            let mut out = vec![0.0; n * n * 3];
            let mut rows = self.rows.clone();
            for atom in 0..n {
                for axis in 0..3 {
                    let origin = rows[atom][axis];
                    rows[atom][axis] = origin + STEP;
                    let plus = self.evaluate(potential, mask, KernelKind::Value, &rows, false);
                    rows[atom][axis] = origin - STEP;
                    let minus = self.evaluate(potential, mask, KernelKind::Value, &rows, false);
                    rows[atom][axis] = origin;
                    for i in 0..n {
                        out[gradient_index(n, i, atom, axis)] = (plus[i] - minus[i]) / (2.0 * STEP);
                    }
                }
            }
            out
        }
    }

    fn assert_gradients_close(analytic: &[f64], reference: &[f64], label: &str) {
        assert_eq!(analytic.len(), reference.len());
        for (k, (a, b)) in analytic.iter().zip(reference).enumerate() {
            assert!(
                (a - b).abs() <= 1e-6 + 1e-5 * b.abs(),
                "{label}: entry {k}: analytic {a} vs central difference {b}"
            );
        }
    }

    fn examples() -> Vec<(Family, ParameterSet)> {
        vec![
            (on_site::family(), parameter_set([("v0", 1.2)])),
            (
                harmonic::family(),
                parameter_set([("a", 1.8), ("epsilon", 1.5)]),
            ),
            (
                lennard_jones::family(),
                parameter_set([("epsilon", 0.7), ("sigma", 1.1), ("a", 2.5)]),
            ),
            (
                stillinger_weber::sw2_family(),
                parameter_set([
                    ("epsilon", 1.3),
                    ("sigma", 1.05),
                    ("a", 1.8),
                    ("p", 4.0),
                    ("q", 0.0),
                ]),
            ),
            (
                stillinger_weber::sw3_family(),
                parameter_set([
                    ("epsilon", 1.3),
                    ("sigma", 1.05),
                    ("l", 21.0),
                    ("gamma", 1.2),
                    ("cos_theta0", -1.0 / 3.0),
                    ("a", 1.8),
                ]),
            ),
            (
                behler::g2_family(),
                parameter_set([("a", 3.0), ("eta", 0.7), ("r_sphere", 1.2)]),
            ),
            (
                sigmoid::family(),
                parameter_set([("a", 3.0), ("dr", 0.3), ("r0", 1.5)]),
            ),
            (
                behler::g4_family(),
                parameter_set([("a", 3.0), ("eta", 0.2), ("l", -1.0), ("zeta", 2.0)]),
            ),
            (
                behler::g5_family(),
                parameter_set([
                    ("a", 3.0),
                    ("eta", 0.2),
                    ("l", 1.0),
                    ("zeta", 4.0),
                    ("epsilon", 0.5),
                ]),
            ),
        ]
    }

    fn tagged(n: usize) -> (&'static str, Vec<SpeciesMatch>) {
        let (a, b) = (SpeciesMatch::Exactly(0), SpeciesMatch::Exactly(1));
        match n {
            1 => ("a", vec![a]),
            2 => ("a-b", vec![a, b]),
            _ => ("b-a-b", vec![b, a, b]),
        }
    }

    #[test]
    fn builtin_family_tags_are_unique() {
        let families = builtin_families();
        let tags: BTreeSet<&str> = families.iter().map(Family::tag).collect();
        assert_eq!(tags.len(), families.len());
    }

    #[test]
    fn analytic_gradients_match_central_differences_for_untagged_potentials() {
        let cluster = Cluster::fixed();
        for (family, parameters) in examples() {
            let label = family.tag().to_string();
            let potential = Arc::new(family).instantiate(None, parameters).unwrap();

            let analytic = cluster.gradient(&potential, None);
            let reference = cluster.central_difference(&potential, None);
            assert_gradients_close(&analytic, &reference, &label);
            if label != ON_SITE {
                assert!(reference.iter().any(|v| v.abs() > 1e-8), "{label}: no contribution");
            }
        }
    }

    #[test]
    fn analytic_gradients_match_central_differences_for_tagged_potentials() {
        let cluster = Cluster::fixed();
        for (family, parameters) in examples() {
            let label = family.tag().to_string();
            let (tag, mask) = tagged(family.coordination_number());
            let potential = Arc::new(family)
                .instantiate(Some(tag.parse().unwrap()), parameters)
                .unwrap();

            let analytic = cluster.gradient(&potential, Some(&mask));
            let reference = cluster.central_difference(&potential, Some(&mask));
            assert_gradients_close(&analytic, &reference, &label);
            if label != ON_SITE {
                assert!(reference.iter().any(|v| v.abs() > 1e-8), "{label}: no contribution");
            }
        }
    }

    #[test]
    fn analytic_gradients_match_central_differences_on_random_clusters() {
        for seed in [3, 17] {
            let cluster = Cluster::random(seed, 7);
            for (family, parameters) in examples() {
                let label = format!("{} (seed {seed})", family.tag());
                let (tag, mask) = tagged(family.coordination_number());
                let potential = Arc::new(family)
                    .instantiate(Some(tag.parse().unwrap()), parameters)
                    .unwrap();
                let analytic = cluster.gradient(&potential, Some(&mask));
                let reference = cluster.central_difference(&potential, Some(&mask));
                assert_gradients_close(&analytic, &reference, &label);
            }
        }
    }

    #[test]
    fn parallel_kernels_match_serial_kernels() {
        let cluster = Cluster::fixed();
        for (family, parameters) in examples() {
            let potential = Arc::new(family).instantiate(None, parameters).unwrap();
            for kind in [KernelKind::Value, KernelKind::Gradient] {
                let serial = cluster.evaluate(&potential, None, kind, &cluster.rows, false);
                let parallel = cluster.evaluate(&potential, None, kind, &cluster.rows, true);
                assert_eq!(serial, parallel);
            }
        }
    }

    #[test]
    fn numerical_fallback_recomputes_shared_r_functions() {
        let cluster = Cluster::fixed();
        let parameters = parameter_set([
            ("a", 3.0),
            ("eta", 0.2),
            ("l", 1.0),
            ("zeta", 2.0),
            ("epsilon", 1.0),
        ]);
        let analytic = Arc::new(behler::g5_family())
            .instantiate(None, parameters.clone())
            .unwrap();
        let shape = behler::BehlerG5 {
            a: 3.0,
            eta: 0.2,
            l: 1.0,
            zeta: 2.0,
            epsilon: 1.0,
        };
        let r_functions = [behler::SINE_CUTOFF, behler::SINE_CUTOFF_SLOPE, behler::GAUSSIAN]
            .into_iter()
            .map(|f| BoundRFunction::bind(f, &parameters).unwrap())
            .collect();
        let fallback = LocalPotential::new(
            3,
            parameters,
            3.0,
            Arc::new(ValueOnly(TripleKernel(shape))),
        )
        .with_r_functions(r_functions);

        let expected = cluster.gradient(&analytic, None);
        let numerical = cluster.gradient(&fallback, None);
        assert_gradients_close(&numerical, &expected, "value-only Behler type 5");
    }
}
