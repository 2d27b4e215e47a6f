use super::{LENNARD_JONES, require};
use crate::core::potentials::family::{CutoffRule, Family, FamilyError};
use crate::core::potentials::kernel::PotentialKernel;
use crate::core::potentials::pair::{PairFunction, PairKernel};
use crate::core::potentials::params::{Bounds, ParameterSet};
use crate::core::potentials::precompute::PrecomputedView;
use std::sync::Arc;

/// 12-6 Lennard-Jones in reduced units, `4 (r^-12 - r^-6)`.
///
/// The family is scaled, so `epsilon` and `sigma` never reach this function.
#[derive(Debug, Clone, Copy)]
pub struct LennardJones {
    pub a: f64,
}

impl PairFunction for LennardJones {
    fn cutoff(&self) -> f64 {
        self.a
    }

    #[inline]
    fn value(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        let r6 = r.powi(-6);
        4.0 * (r6 * r6 - r6)
    }

    #[inline]
    fn derivative(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        let r6 = r.powi(-6);
        4.0 * (6.0 * r6 - 12.0 * r6 * r6) / r
    }
}

fn build(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    Ok(Arc::new(PairKernel(LennardJones {
        a: require(LENNARD_JONES, parameters, "a")?,
    })))
}

pub fn family() -> Family {
    Family::new(LENNARD_JONES, 2, build)
        .scaled()
        .parameter("a", Some(Bounds::at_least(2f64.powf(1.0 / 6.0))))
        .cutoff(CutoffRule::Parameter("a".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn minimum_lies_at_two_to_the_one_sixth() {
        let lj = LennardJones { a: 2.5 };
        let pre = PrecomputedView::empty();
        let r_min = 2f64.powf(1.0 / 6.0);
        assert!(f64_approx_equal(lj.value(r_min, &pre, 0), -1.0));
        assert!(f64_approx_equal(lj.derivative(r_min, &pre, 0), 0.0));
        assert!(f64_approx_equal(lj.value(1.0, &pre, 0), 0.0));
    }
}
