use super::behler::{sine_cutoff, sine_cutoff_slope};
use super::{SIGMOID, require};
use crate::core::potentials::family::{CutoffRule, Family, FamilyError};
use crate::core::potentials::kernel::PotentialKernel;
use crate::core::potentials::pair::{PairFunction, PairKernel};
use crate::core::potentials::params::{Bounds, ParameterSet};
use crate::core::potentials::precompute::PrecomputedView;
use std::sync::Arc;

/// Radial step `fc(r) / (1 + exp((r - r0) / dr))`.
#[derive(Debug, Clone, Copy)]
pub struct Sigmoid {
    pub a: f64,
    pub dr: f64,
    pub r0: f64,
}

impl Sigmoid {
    #[inline]
    fn step(&self, r: f64) -> f64 {
        1.0 / (1.0 + ((r - self.r0) / self.dr).exp())
    }
}

impl PairFunction for Sigmoid {
    fn cutoff(&self) -> f64 {
        self.a
    }

    #[inline]
    fn value(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        self.step(r) * sine_cutoff(r, &[self.a])
    }

    #[inline]
    fn derivative(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        let s = self.step(r);
        let step_slope = -s * (1.0 - s) / self.dr;
        step_slope * sine_cutoff(r, &[self.a]) + s * sine_cutoff_slope(r, &[self.a])
    }
}

fn build(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    let get = |name| require(SIGMOID, parameters, name);
    Ok(Arc::new(PairKernel(Sigmoid {
        a: get("a")?,
        dr: get("dr")?,
        r0: get("r0")?,
    })))
}

pub fn family() -> Family {
    Family::new(SIGMOID, 2, build)
        .parameter("a", Some(Bounds::at_least(0.0)))
        .parameter("dr", Some(Bounds::at_least(0.0)))
        .parameter("r0", Some(Bounds::at_least(0.0)))
        .cutoff(CutoffRule::Parameter("a".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_one_half_at_r0() {
        let sigmoid = Sigmoid {
            a: 1e9,
            dr: 0.3,
            r0: 2.0,
        };
        let pre = PrecomputedView::empty();
        assert!((sigmoid.value(2.0, &pre, 0) - 0.5).abs() < 1e-12);
        assert!(sigmoid.value(1.0, &pre, 0) > 0.9);
        assert!(sigmoid.value(3.0, &pre, 0) < 0.1);
        assert!((sigmoid.derivative(2.0, &pre, 0) + 0.25 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn far_tail_has_finite_slope() {
        let sigmoid = Sigmoid {
            a: 10.0,
            dr: 1e-3,
            r0: 1.0,
        };
        let pre = PrecomputedView::empty();
        assert_eq!(sigmoid.derivative(5.0, &pre, 0), 0.0);
    }
}
