//! Behler-Parrinello symmetry functions.
//!
//! The cutoff envelope, its slope and the radial gaussian depend on distance
//! only, so the families declare them as shared r-functions. Descriptors with
//! the same `a` (or `eta`) evaluated together read the same precomputed column.

use super::{BEHLER_2, BEHLER_4, BEHLER_5, require};
use crate::core::potentials::family::{CutoffRule, Family, FamilyError};
use crate::core::potentials::kernel::PotentialKernel;
use crate::core::potentials::pair::{PairFunction, PairKernel};
use crate::core::potentials::params::{Bounds, ParameterSet};
use crate::core::potentials::precompute::{PrecomputedView, RFunction};
use crate::core::potentials::triple::{
    TripleDerivatives, TripleFunction, TripleGeometry, TripleKernel,
};
use std::f64::consts::PI;
use std::sync::Arc;

const FC: usize = 0;
const FC_SLOPE: usize = 1;
const GAUSSIAN_SLOT: usize = 2;

/// `(1 + cos(pi r / a)) / 2`
pub fn sine_cutoff(r: f64, p: &[f64]) -> f64 {
    0.5 + (PI * r / p[0]).cos() / 2.0
}

pub fn sine_cutoff_slope(r: f64, p: &[f64]) -> f64 {
    -PI * (PI * r / p[0]).sin() / (2.0 * p[0])
}

/// `exp(-eta r^2)`
pub fn gaussian(r: f64, p: &[f64]) -> f64 {
    (-p[0] * r * r).exp()
}

pub const SINE_CUTOFF: RFunction = RFunction {
    name: "sine cutoff",
    parameters: &["a"],
    eval: sine_cutoff,
};

pub const SINE_CUTOFF_SLOPE: RFunction = RFunction {
    name: "sine cutoff slope",
    parameters: &["a"],
    eval: sine_cutoff_slope,
};

pub const GAUSSIAN: RFunction = RFunction {
    name: "gaussian",
    parameters: &["eta"],
    eval: gaussian,
};

/// Radial descriptor `exp(-eta (r - r_sphere)^2) fc(r)`.
#[derive(Debug, Clone, Copy)]
pub struct BehlerG2 {
    pub a: f64,
    pub eta: f64,
    pub r_sphere: f64,
}

impl PairFunction for BehlerG2 {
    fn cutoff(&self) -> f64 {
        self.a
    }

    #[inline]
    fn value(&self, r: f64, pre: &PrecomputedView<'_>, k: usize) -> f64 {
        let d = r - self.r_sphere;
        (-self.eta * d * d).exp() * pre.get(k, FC)
    }

    #[inline]
    fn derivative(&self, r: f64, pre: &PrecomputedView<'_>, k: usize) -> f64 {
        let d = r - self.r_sphere;
        let g = (-self.eta * d * d).exp();
        -2.0 * self.eta * d * g * pre.get(k, FC) + g * pre.get(k, FC_SLOPE)
    }
}

/// Angular descriptor
/// `epsilon 2^(1 - zeta) (1 + l cos)^zeta exp(-eta (r1^2 + r2^2)) fc(r1) fc(r2)`.
#[derive(Debug, Clone, Copy)]
pub struct BehlerG5 {
    pub a: f64,
    pub eta: f64,
    pub l: f64,
    pub zeta: f64,
    pub epsilon: f64,
}

impl BehlerG5 {
    fn evaluate(&self, g: &TripleGeometry, pre: &PrecomputedView<'_>) -> (f64, TripleDerivatives) {
        let (fc1, fc2) = (pre.get(g.k1, FC), pre.get(g.k2, FC));
        let (e1, e2) = (pre.get(g.k1, GAUSSIAN_SLOT), pre.get(g.k2, GAUSSIAN_SLOT));
        let norm = self.epsilon * 2f64.powf(1.0 - self.zeta);
        let base = 1.0 + self.l * g.cos;
        let angular = base.powf(self.zeta);
        let radial = e1 * e2 * fc1 * fc2;
        let f = norm * angular * radial;

        let angular_slope = if self.zeta == 0.0 {
            0.0
        } else {
            self.zeta * self.l * base.powf(self.zeta - 1.0)
        };
        let derivatives = TripleDerivatives {
            dr1: -2.0 * self.eta * g.r1 * f
                + norm * angular * e1 * e2 * pre.get(g.k1, FC_SLOPE) * fc2,
            dr2: -2.0 * self.eta * g.r2 * f
                + norm * angular * e1 * e2 * fc1 * pre.get(g.k2, FC_SLOPE),
            dcos: norm * angular_slope * radial,
        };
        (f, derivatives)
    }
}

impl TripleFunction for BehlerG5 {
    fn cutoff(&self) -> f64 {
        self.a
    }

    fn value(&self, g: &TripleGeometry, pre: &PrecomputedView<'_>) -> f64 {
        self.evaluate(g, pre).0
    }

    fn derivatives(&self, g: &TripleGeometry, pre: &PrecomputedView<'_>) -> TripleDerivatives {
        self.evaluate(g, pre).1
    }
}

/// [`BehlerG5`] multiplied by `exp(-eta r3^2) fc(r3)` of the third side of the triangle.
#[derive(Debug, Clone, Copy)]
pub struct BehlerG4(pub BehlerG5);

impl BehlerG4 {
    /// Third side length and the closing factor with its slope.
    fn closing(&self, g: &TripleGeometry) -> (f64, f64, f64) {
        let BehlerG5 { a, eta, .. } = self.0;
        let r3 = (g.r1 * g.r1 + g.r2 * g.r2 - 2.0 * g.r1 * g.r2 * g.cos)
            .max(0.0)
            .sqrt();
        if r3 >= a || r3 == 0.0 {
            return (r3, 0.0, 0.0);
        }
        let e3 = gaussian(r3, &[eta]);
        let h = e3 * sine_cutoff(r3, &[a]);
        let slope = -2.0 * eta * r3 * h + e3 * sine_cutoff_slope(r3, &[a]);
        (r3, h, slope)
    }
}

impl TripleFunction for BehlerG4 {
    fn cutoff(&self) -> f64 {
        self.0.a
    }

    fn value(&self, g: &TripleGeometry, pre: &PrecomputedView<'_>) -> f64 {
        let (_, h, _) = self.closing(g);
        if h == 0.0 {
            return 0.0;
        }
        self.0.value(g, pre) * h
    }

    fn derivatives(&self, g: &TripleGeometry, pre: &PrecomputedView<'_>) -> TripleDerivatives {
        let (r3, h, slope) = self.closing(g);
        if h == 0.0 && slope == 0.0 {
            return TripleDerivatives::default();
        }
        let (f5, d5) = self.0.evaluate(g, pre);
        let chain = f5 * slope / r3;
        TripleDerivatives {
            dr1: d5.dr1 * h + chain * (g.r1 - g.r2 * g.cos),
            dr2: d5.dr2 * h + chain * (g.r2 - g.r1 * g.cos),
            dcos: d5.dcos * h - chain * g.r1 * g.r2,
        }
    }
}

fn build_g2(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    let get = |name| require(BEHLER_2, parameters, name);
    Ok(Arc::new(PairKernel(BehlerG2 {
        a: get("a")?,
        eta: get("eta")?,
        r_sphere: get("r_sphere")?,
    })))
}

fn angular(tag: &str, parameters: &ParameterSet) -> Result<BehlerG5, FamilyError> {
    let get = |name| require(tag, parameters, name);
    Ok(BehlerG5 {
        a: get("a")?,
        eta: get("eta")?,
        l: get("l")?,
        zeta: get("zeta")?,
        epsilon: get("epsilon")?,
    })
}

fn build_g4(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    Ok(Arc::new(TripleKernel(BehlerG4(angular(BEHLER_4, parameters)?))))
}

fn build_g5(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    Ok(Arc::new(TripleKernel(angular(BEHLER_5, parameters)?)))
}

pub fn g2_family() -> Family {
    Family::new(BEHLER_2, 2, build_g2)
        .parameter("a", Some(Bounds::at_least(0.0)))
        .parameter("eta", Some(Bounds::at_least(0.0)))
        .parameter("r_sphere", Some(Bounds::at_least(0.0)))
        .cutoff(CutoffRule::Parameter("a".to_string()))
        .pre_compute_r(vec![SINE_CUTOFF, SINE_CUTOFF_SLOPE])
}

fn angular_family(
    tag: &str,
    build: fn(&ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError>,
) -> Family {
    Family::new(tag, 3, build)
        .parameter("a", Some(Bounds::at_least(0.0)))
        .parameter("eta", Some(Bounds::at_least(0.0)))
        .parameter("l", Some(Bounds::new(-1.0, 1.0)))
        .parameter("zeta", Some(Bounds::at_least(0.0)))
        .default_value("epsilon", 1.0)
        .cutoff(CutoffRule::Parameter("a".to_string()))
        .pre_compute_r(vec![SINE_CUTOFF, SINE_CUTOFF_SLOPE, GAUSSIAN])
}

pub fn g4_family() -> Family {
    angular_family(BEHLER_4, build_g4)
}

pub fn g5_family() -> Family {
    angular_family(BEHLER_5, build_g5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn sine_cutoff_goes_from_one_to_zero() {
        assert!(f64_approx_equal(sine_cutoff(0.0, &[3.0]), 1.0));
        assert!(f64_approx_equal(sine_cutoff(1.5, &[3.0]), 0.5));
        assert!(f64_approx_equal(sine_cutoff(3.0, &[3.0]), 0.0));
        assert!(f64_approx_equal(sine_cutoff_slope(0.0, &[3.0]), 0.0));
        assert!(f64_approx_equal(sine_cutoff_slope(3.0, &[3.0]), 0.0));
        assert!(f64_approx_equal(sine_cutoff_slope(1.5, &[3.0]), -PI / 6.0));
    }

    #[test]
    fn g4_closing_factor_vanishes_for_wide_triangles() {
        let g4 = BehlerG4(BehlerG5 {
            a: 3.0,
            eta: 0.1,
            l: 1.0,
            zeta: 1.0,
            epsilon: 1.0,
        });
        // straight line through the centre, r3 = r1 + r2 = 3.2
        let geometry = TripleGeometry {
            r1: 1.6,
            r2: 1.6,
            cos: -1.0,
            k1: 0,
            k2: 1,
        };
        let (r3, h, slope) = g4.closing(&geometry);
        assert!(f64_approx_equal(r3, 3.2));
        assert_eq!((h, slope), (0.0, 0.0));
    }
}
