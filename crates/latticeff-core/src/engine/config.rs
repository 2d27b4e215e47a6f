use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Toml {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

/// Settings of a [`NeighborWrapper`](super::neighbors::NeighborWrapper).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NeighborConfig {
    /// Replica count per lattice axis. Images with shifts in `-(x-1)..=(x-1)` are searched.
    pub x: [usize; 3],
    /// Wrap fractional coordinates into `[0, 1)` whenever a cell is stored.
    pub normalize: bool,
    pub prefer_parallel: bool,
    /// Reject cutoffs the replica counts cannot fully capture.
    pub strict_replicas: bool,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            x: [1, 1, 1],
            normalize: true,
            prefer_parallel: cfg!(feature = "parallel"),
            strict_replicas: false,
        }
    }
}

impl NeighborConfig {
    pub fn builder() -> NeighborConfigBuilder {
        NeighborConfigBuilder::new()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_toml::<Self>(path)?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.x.contains(&0) {
            return Err(invalid("x", format!("replica counts must be positive, found {:?}", self.x)));
        }
        Ok(self)
    }
}

#[derive(Default)]
pub struct NeighborConfigBuilder {
    x: Option<[usize; 3]>,
    normalize: Option<bool>,
    prefer_parallel: Option<bool>,
    strict_replicas: Option<bool>,
}

impl NeighborConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x(mut self, x: [usize; 3]) -> Self {
        self.x = Some(x);
        self
    }
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = Some(normalize);
        self
    }
    pub fn prefer_parallel(mut self, prefer: bool) -> Self {
        self.prefer_parallel = Some(prefer);
        self
    }
    pub fn strict_replicas(mut self, strict: bool) -> Self {
        self.strict_replicas = Some(strict);
        self
    }

    pub fn build(self) -> Result<NeighborConfig, ConfigError> {
        let defaults = NeighborConfig::default();
        NeighborConfig {
            x: self.x.ok_or(ConfigError::MissingParameter("x"))?,
            normalize: self.normalize.unwrap_or(defaults.normalize),
            prefer_parallel: self.prefer_parallel.unwrap_or(defaults.prefer_parallel),
            strict_replicas: self.strict_replicas.unwrap_or(defaults.strict_replicas),
        }
        .validated()
    }
}

/// Transform applied to the total energy before it reaches the minimizer.
///
/// Returns the transformed energy and its derivative with respect to the
/// untransformed energy.
pub type Interstitial = Arc<dyn Fn(f64) -> (f64, f64) + Send + Sync>;

/// Settings of a relaxation run.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaxConfig {
    /// Length of one minimizer coordinate unit in cell units.
    pub coordinate_unit: f64,
    pub normalize: bool,
    /// Abort with the step history on the first numerical warning.
    pub raise_on_warning: bool,
    /// Keep the relaxed geometry in the engine afterwards.
    pub inplace: bool,
    /// Return every step instead of only the final one.
    pub keep_history: bool,
    pub ignore_missing_species: bool,
    pub max_iterations: u64,
    pub tolerance_grad: f64,
    pub tolerance_cost: f64,
    pub lbfgs_memory: usize,
    #[serde(skip)]
    pub interstitial: Option<Interstitial>,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            coordinate_unit: 1.0,
            normalize: true,
            raise_on_warning: false,
            inplace: false,
            keep_history: true,
            ignore_missing_species: false,
            max_iterations: 1000,
            tolerance_grad: 1e-6,
            tolerance_cost: f64::EPSILON,
            lbfgs_memory: 7,
            interstitial: None,
        }
    }
}

impl fmt::Debug for RelaxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaxConfig")
            .field("coordinate_unit", &self.coordinate_unit)
            .field("normalize", &self.normalize)
            .field("raise_on_warning", &self.raise_on_warning)
            .field("inplace", &self.inplace)
            .field("keep_history", &self.keep_history)
            .field("ignore_missing_species", &self.ignore_missing_species)
            .field("max_iterations", &self.max_iterations)
            .field("tolerance_grad", &self.tolerance_grad)
            .field("tolerance_cost", &self.tolerance_cost)
            .field("lbfgs_memory", &self.lbfgs_memory)
            .field("interstitial", &self.interstitial.is_some())
            .finish()
    }
}

impl RelaxConfig {
    pub fn builder() -> RelaxConfigBuilder {
        RelaxConfigBuilder::new()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_toml::<Self>(path)?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if !(self.coordinate_unit.is_finite() && self.coordinate_unit > 0.0) {
            return Err(invalid("coordinate_unit", "must be a positive number"));
        }
        if self.tolerance_grad.is_nan() || self.tolerance_grad < 0.0 {
            return Err(invalid("tolerance_grad", "must not be negative"));
        }
        if self.tolerance_cost.is_nan() || self.tolerance_cost < 0.0 {
            return Err(invalid("tolerance_cost", "must not be negative"));
        }
        if self.lbfgs_memory == 0 {
            return Err(invalid("lbfgs_memory", "must be at least 1"));
        }
        Ok(self)
    }
}

#[derive(Default)]
pub struct RelaxConfigBuilder {
    coordinate_unit: Option<f64>,
    normalize: Option<bool>,
    raise_on_warning: Option<bool>,
    inplace: Option<bool>,
    keep_history: Option<bool>,
    ignore_missing_species: Option<bool>,
    max_iterations: Option<u64>,
    tolerance_grad: Option<f64>,
    tolerance_cost: Option<f64>,
    lbfgs_memory: Option<usize>,
    interstitial: Option<Interstitial>,
}

impl RelaxConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coordinate_unit(mut self, unit: f64) -> Self {
        self.coordinate_unit = Some(unit);
        self
    }
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = Some(normalize);
        self
    }
    pub fn raise_on_warning(mut self, raise: bool) -> Self {
        self.raise_on_warning = Some(raise);
        self
    }
    pub fn inplace(mut self, inplace: bool) -> Self {
        self.inplace = Some(inplace);
        self
    }
    pub fn keep_history(mut self, keep: bool) -> Self {
        self.keep_history = Some(keep);
        self
    }
    pub fn ignore_missing_species(mut self, ignore: bool) -> Self {
        self.ignore_missing_species = Some(ignore);
        self
    }
    pub fn max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn tolerance_grad(mut self, tolerance: f64) -> Self {
        self.tolerance_grad = Some(tolerance);
        self
    }
    pub fn tolerance_cost(mut self, tolerance: f64) -> Self {
        self.tolerance_cost = Some(tolerance);
        self
    }
    pub fn lbfgs_memory(mut self, memory: usize) -> Self {
        self.lbfgs_memory = Some(memory);
        self
    }
    pub fn interstitial(mut self, transform: Interstitial) -> Self {
        self.interstitial = Some(transform);
        self
    }

    pub fn build(self) -> Result<RelaxConfig, ConfigError> {
        let d = RelaxConfig::default();
        RelaxConfig {
            coordinate_unit: self.coordinate_unit.unwrap_or(d.coordinate_unit),
            normalize: self.normalize.unwrap_or(d.normalize),
            raise_on_warning: self.raise_on_warning.unwrap_or(d.raise_on_warning),
            inplace: self.inplace.unwrap_or(d.inplace),
            keep_history: self.keep_history.unwrap_or(d.keep_history),
            ignore_missing_species: self
                .ignore_missing_species
                .unwrap_or(d.ignore_missing_species),
            max_iterations: self.max_iterations.unwrap_or(d.max_iterations),
            tolerance_grad: self.tolerance_grad.unwrap_or(d.tolerance_grad),
            tolerance_cost: self.tolerance_cost.unwrap_or(d.tolerance_cost),
            lbfgs_memory: self.lbfgs_memory.unwrap_or(d.lbfgs_memory),
            interstitial: self.interstitial,
        }
        .validated()
    }
}
