use super::{STILLINGER_WEBER_2, STILLINGER_WEBER_3, require};
use crate::core::potentials::family::{CutoffRule, Family, FamilyError};
use crate::core::potentials::kernel::PotentialKernel;
use crate::core::potentials::pair::{PairFunction, PairKernel};
use crate::core::potentials::params::{Bounds, ParameterSet};
use crate::core::potentials::precompute::PrecomputedView;
use crate::core::potentials::triple::{
    TripleDerivatives, TripleFunction, TripleGeometry, TripleKernel,
};
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentRoot;
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_MIN_DEPTH: f64 = -1.0;
const GAUGE_B_BRACKET: (f64, f64) = (1e-3, 3.0);
const MIN_TOLERANCE: f64 = 1e-12;
const ROOT_TOLERANCE: f64 = 1e-12;
const MAX_SOLVER_ITERS: u64 = 500;

fn lj_minimum() -> f64 {
    2f64.powf(1.0 / 6.0)
}

/// Two-body Stillinger-Weber term `A (B r^-p - r^-q) exp(1 / (r - a))`.
#[derive(Debug, Clone, Copy)]
pub struct StillingerWeber2 {
    pub gauge_a: f64,
    pub gauge_b: f64,
    pub a: f64,
    pub p: f64,
    pub q: f64,
}

impl StillingerWeber2 {
    /// The pair energy, zero beyond the cutoff.
    pub fn energy(&self, r: f64) -> f64 {
        if r >= self.a {
            return 0.0;
        }
        self.gauge_a
            * (self.gauge_b * r.powf(-self.p) - r.powf(-self.q))
            * (1.0 / (r - self.a)).exp()
    }

    pub fn slope(&self, r: f64) -> f64 {
        if r >= self.a {
            return 0.0;
        }
        let d = r - self.a;
        let envelope = (1.0 / d).exp();
        let polynomial = -self.p * self.gauge_b * r.powf(-self.p - 1.0)
            + self.q * r.powf(-self.q - 1.0);
        self.gauge_a * polynomial * envelope - self.energy(r) / (d * d)
    }
}

impl PairFunction for StillingerWeber2 {
    fn cutoff(&self) -> f64 {
        self.a
    }

    #[inline]
    fn value(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        self.energy(r)
    }

    #[inline]
    fn derivative(&self, r: f64, _pre: &PrecomputedView<'_>, _k: usize) -> f64 {
        self.slope(r)
    }
}

struct PairMinimum {
    shape: StillingerWeber2,
}

impl CostFunction for PairMinimum {
    type Param = f64;
    type Output = f64;

    fn cost(&self, r: &f64) -> Result<f64, Error> {
        Ok(self.shape.energy(*r))
    }
}

/// Position of the pair minimum, or NaN when the search interval is empty.
fn locate_minimum(shape: StillingerWeber2) -> Result<f64, Error> {
    let lower = shape.gauge_b.powf(1.0 / (shape.p - shape.q));
    let upper = shape.a;
    if lower.is_nan() || lower >= upper {
        return Ok(f64::NAN);
    }
    let solver = GoldenSectionSearch::new(lower, upper)?.with_tolerance(MIN_TOLERANCE)?;
    let result = Executor::new(PairMinimum { shape }, solver)
        .configure(|state| state.param(0.5 * (lower + upper)).max_iters(MAX_SOLVER_ITERS))
        .run()?;
    result
        .state()
        .get_best_param()
        .copied()
        .ok_or_else(|| Error::msg("bounded search returned no point"))
}

struct MinimumOffset {
    shape: StillingerWeber2,
    target: f64,
}

impl CostFunction for MinimumOffset {
    type Param = f64;
    type Output = f64;

    fn cost(&self, gauge_b: &f64) -> Result<f64, Error> {
        let shape = StillingerWeber2 {
            gauge_b: *gauge_b,
            ..self.shape
        };
        Ok(locate_minimum(shape)? - self.target)
    }
}

fn solve_gauge_b(shape: StillingerWeber2, target: f64) -> Result<f64, Error> {
    let (lower, upper) = GAUGE_B_BRACKET;
    let solver = BrentRoot::new(lower, upper, ROOT_TOLERANCE);
    let result = Executor::new(MinimumOffset { shape, target }, solver)
        .configure(|state| state.max_iters(MAX_SOLVER_ITERS))
        .run()?;
    result
        .state()
        .get_best_param()
        .copied()
        .ok_or_else(|| Error::msg("root search returned no point"))
}

/// Solves `gauge_a` and `gauge_b` unless both are given.
///
/// The pair minimum is placed at `min_r` with depth `min_depth`, both in reduced
/// units and defaulting to `2^(1/6)` and `-1`. Both are consumed here and never
/// stored on the potential.
fn complete_gauges(
    family: &Family,
    mut parameters: ParameterSet,
) -> Result<ParameterSet, FamilyError> {
    let min_r = parameters.remove("min_r").unwrap_or_else(lj_minimum);
    let min_depth = parameters.remove("min_depth").unwrap_or(DEFAULT_MIN_DEPTH);
    if parameters.contains_key("gauge_a") && parameters.contains_key("gauge_b") {
        return Ok(parameters);
    }
    let out_of_bounds = |parameter: &str, value: f64, lower: f64, upper: f64| {
        FamilyError::OutOfBounds {
            family: family.tag().to_string(),
            parameter: parameter.to_string(),
            value,
            lower,
            upper,
        }
    };
    if !(min_r > 0.0) {
        return Err(out_of_bounds("min_r", min_r, 0.0, f64::INFINITY));
    }
    if !(min_depth < 0.0) {
        return Err(out_of_bounds("min_depth", min_depth, f64::NEG_INFINITY, 0.0));
    }

    let get = |name: &str| {
        parameters
            .get(name)
            .copied()
            .ok_or_else(|| family.missing(name))
    };
    let shape = StillingerWeber2 {
        gauge_a: 1.0,
        gauge_b: 1.0,
        a: get("a")?,
        p: get("p")?,
        q: get("q")?,
    };
    let setup = |e: Error| FamilyError::Setup {
        family: family.tag().to_string(),
        message: e.to_string(),
    };

    let gauge_b = solve_gauge_b(shape, min_r).map_err(setup)?;
    let gauge_a = min_depth / StillingerWeber2 { gauge_b, ..shape }.energy(min_r);
    debug!(gauge_a, gauge_b, min_r, min_depth, "Solved Stillinger-Weber gauges");

    parameters.insert("gauge_a".to_string(), gauge_a);
    parameters.insert("gauge_b".to_string(), gauge_b);
    Ok(parameters)
}

fn build_sw2(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    let get = |name| require(STILLINGER_WEBER_2, parameters, name);
    Ok(Arc::new(PairKernel(StillingerWeber2 {
        gauge_a: get("gauge_a")?,
        gauge_b: get("gauge_b")?,
        a: get("a")?,
        p: get("p")?,
        q: get("q")?,
    })))
}

pub fn sw2_family() -> Family {
    Family::new(STILLINGER_WEBER_2, 2, build_sw2)
        .scaled()
        .parameter("gauge_a", Some(Bounds::at_least(0.0)))
        .parameter("gauge_b", Some(Bounds::at_least(0.0)))
        .parameter("a", Some(Bounds::at_least(1.0)))
        .parameter("p", Some(Bounds::at_least(1.0)))
        .parameter("q", Some(Bounds::unbounded()))
        .cutoff(CutoffRule::Parameter("a".to_string()))
        .completion(complete_gauges)
}

/// Three-body Stillinger-Weber term
/// `l (cos - cos_theta0)^2 exp(gamma / (r1 - a) + gamma / (r2 - a))`.
#[derive(Debug, Clone, Copy)]
pub struct StillingerWeber3 {
    pub l: f64,
    pub gamma: f64,
    pub cos_theta0: f64,
    pub a: f64,
}

impl StillingerWeber3 {
    fn envelope(&self, g: &TripleGeometry) -> f64 {
        (self.gamma / (g.r1 - self.a) + self.gamma / (g.r2 - self.a)).exp()
    }
}

impl TripleFunction for StillingerWeber3 {
    fn cutoff(&self) -> f64 {
        self.a
    }

    fn value(&self, g: &TripleGeometry, _pre: &PrecomputedView<'_>) -> f64 {
        let d = g.cos - self.cos_theta0;
        self.l * d * d * self.envelope(g)
    }

    fn derivatives(&self, g: &TripleGeometry, _pre: &PrecomputedView<'_>) -> TripleDerivatives {
        let envelope = self.envelope(g);
        let d = g.cos - self.cos_theta0;
        let f = self.l * d * d * envelope;
        let d1 = g.r1 - self.a;
        let d2 = g.r2 - self.a;
        TripleDerivatives {
            dr1: -f * self.gamma / (d1 * d1),
            dr2: -f * self.gamma / (d2 * d2),
            dcos: 2.0 * self.l * d * envelope,
        }
    }
}

fn build_sw3(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    let get = |name| require(STILLINGER_WEBER_3, parameters, name);
    Ok(Arc::new(TripleKernel(StillingerWeber3 {
        l: get("l")?,
        gamma: get("gamma")?,
        cos_theta0: get("cos_theta0")?,
        a: get("a")?,
    })))
}

pub fn sw3_family() -> Family {
    Family::new(STILLINGER_WEBER_3, 3, build_sw3)
        .scaled()
        .parameter("l", Some(Bounds::at_least(0.0)))
        .parameter("gamma", Some(Bounds::at_least(0.0)))
        .parameter("cos_theta0", Some(Bounds::new(-1.0, 1.0)))
        .parameter("a", Some(Bounds::at_least(1.0)))
        .cutoff(CutoffRule::Parameter("a".to_string()))
}
