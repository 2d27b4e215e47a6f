use super::{HARMONIC_REPULSION, require};
use crate::core::potentials::family::{CutoffRule, Family, FamilyError};
use crate::core::potentials::kernel::PotentialKernel;
use crate::core::potentials::pair::{PairFunction, PairKernel};
use crate::core::potentials::params::{Bounds, ParameterSet};
use crate::core::potentials::precompute::PrecomputedView;
use std::sync::Arc;

/// Soft repulsion `epsilon (r - a)^2 / (2 a^2)` that vanishes at `r = a`.
#[derive(Debug, Clone, Copy)]
pub struct HarmonicRepulsion {
    pub a: f64,
    pub epsilon: f64,
}

impl PairFunction for HarmonicRepulsion {
    fn cutoff(&self) -> f64 {
        self.a
    }

    #[inline]
    fn value(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        let d = r - self.a;
        self.epsilon * d * d / (self.a * self.a) / 2.0
    }

    #[inline]
    fn derivative(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        self.epsilon * (r - self.a) / (self.a * self.a)
    }
}

fn build(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    Ok(Arc::new(PairKernel(HarmonicRepulsion {
        a: require(HARMONIC_REPULSION, parameters, "a")?,
        epsilon: require(HARMONIC_REPULSION, parameters, "epsilon")?,
    })))
}

pub fn family() -> Family {
    Family::new(HARMONIC_REPULSION, 2, build)
        .parameter("a", Some(Bounds::at_least(0.0)))
        .parameter("epsilon", Some(Bounds::at_least(0.0)))
        .cutoff(CutoffRule::Parameter("a".to_string()))
}
