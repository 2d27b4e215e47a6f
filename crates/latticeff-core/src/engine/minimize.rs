use super::config::RelaxConfig;
use super::error::EngineError;
use argmin::core::{CostFunction, Error as SolverError, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::cell::{Cell, RefCell};
use thiserror::Error;
use tracing::debug;

/// A differentiable scalar function of a flat coordinate vector.
pub trait Objective {
    /// Value and gradient at `x`.
    fn evaluate(&mut self, x: &[f64]) -> Result<(f64, Vec<f64>), EngineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeOutcome {
    /// Best point reached.
    pub x: Vec<f64>,
    pub value: f64,
    pub success: bool,
    pub message: String,
    pub iterations: u64,
    pub evaluations: u64,
}

#[derive(Debug, Error)]
pub enum MinimizeError {
    #[error("Objective evaluation failed: {0}")]
    Objective(Box<EngineError>),
    #[error("Solver setup failed: {0}")]
    Setup(String),
}

/// An unconstrained minimizer.
///
/// Failing to converge is not an error: it is reported through
/// [`MinimizeOutcome::success`] together with the best point reached.
pub trait Minimizer {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        x0: &[f64],
    ) -> Result<MinimizeOutcome, MinimizeError>;
}

/// L-BFGS with a More-Thuente line search.
#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsMinimizer {
    pub memory: usize,
    pub max_iterations: u64,
    pub tolerance_grad: f64,
    pub tolerance_cost: f64,
}

impl LbfgsMinimizer {
    pub fn from_config(config: &RelaxConfig) -> Self {
        Self {
            memory: config.lbfgs_memory,
            max_iterations: config.max_iterations,
            tolerance_grad: config.tolerance_grad,
            tolerance_cost: config.tolerance_cost,
        }
    }
}

impl Default for LbfgsMinimizer {
    fn default() -> Self {
        Self::from_config(&RelaxConfig::default())
    }
}

/// Adapts an [`Objective`] to argmin, caching the last evaluation so that the
/// cost and gradient of one point cost a single call.
struct Tracked<'a> {
    objective: RefCell<&'a mut dyn Objective>,
    cache: RefCell<Option<(Vec<f64>, f64, Vec<f64>)>>,
    best: &'a RefCell<Option<(Vec<f64>, f64)>>,
    failure: &'a RefCell<Option<EngineError>>,
    evaluations: &'a Cell<u64>,
}

impl Tracked<'_> {
    fn evaluate(&self, x: &[f64]) -> Result<(f64, Vec<f64>), SolverError> {
        if let Some((cached, f, g)) = self.cache.borrow().as_ref() {
            if cached.as_slice() == x {
                return Ok((*f, g.clone()));
            }
        }
        let result = self.objective.borrow_mut().evaluate(x);
        self.evaluations.set(self.evaluations.get() + 1);
        match result {
            Ok((f, g)) => {
                let mut best = self.best.borrow_mut();
                if best.as_ref().is_none_or(|(_, b)| f < *b) {
                    *best = Some((x.to_vec(), f));
                }
                *self.cache.borrow_mut() = Some((x.to_vec(), f, g.clone()));
                Ok((f, g))
            }
            Err(e) => {
                let message = e.to_string();
                *self.failure.borrow_mut() = Some(e);
                Err(SolverError::msg(message))
            }
        }
    }
}

impl CostFunction for Tracked<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, SolverError> {
        self.evaluate(x).map(|(f, _)| f)
    }
}

impl Gradient for Tracked<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, SolverError> {
        self.evaluate(x).map(|(_, g)| g)
    }
}

impl Minimizer for LbfgsMinimizer {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        x0: &[f64],
    ) -> Result<MinimizeOutcome, MinimizeError> {
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.memory)
            .with_tolerance_grad(self.tolerance_grad)
            .and_then(|s| s.with_tolerance_cost(self.tolerance_cost))
            .map_err(|e| MinimizeError::Setup(e.to_string()))?;

        let best = RefCell::new(None);
        let failure = RefCell::new(None);
        let evaluations = Cell::new(0);
        let problem = Tracked {
            objective: RefCell::new(objective),
            cache: RefCell::new(None),
            best: &best,
            failure: &failure,
            evaluations: &evaluations,
        };

        let run = Executor::new(problem, solver)
            .configure(|state| state.param(x0.to_vec()).max_iters(self.max_iterations))
            .run();

        if let Some(error) = failure.borrow_mut().take() {
            return Err(MinimizeError::Objective(Box::new(error)));
        }
        let fallback = || {
            best.borrow()
                .clone()
                .unwrap_or_else(|| (x0.to_vec(), f64::NAN))
        };

        let outcome = match run {
            Ok(result) => {
                let state = result.state();
                let success = matches!(
                    state.get_termination_reason(),
                    Some(TerminationReason::SolverConverged)
                        | Some(TerminationReason::TargetCostReached)
                );
                let message = match state.get_termination_reason() {
                    Some(reason) => format!("{reason:?}"),
                    None => "not terminated".to_string(),
                };
                let (x, value) = match state.get_best_param() {
                    Some(x) => (x.clone(), state.get_best_cost()),
                    None => fallback(),
                };
                MinimizeOutcome {
                    x,
                    value,
                    success,
                    message,
                    iterations: state.get_iter(),
                    evaluations: evaluations.get(),
                }
            }
            Err(e) => {
                let (x, value) = fallback();
                MinimizeOutcome {
                    x,
                    value,
                    success: false,
                    message: e.to_string(),
                    iterations: 0,
                    evaluations: evaluations.get(),
                }
            }
        };
        debug!(
            success = outcome.success,
            iterations = outcome.iterations,
            evaluations = outcome.evaluations,
            value = outcome.value,
            "L-BFGS finished"
        );
        Ok(outcome)
    }
}
