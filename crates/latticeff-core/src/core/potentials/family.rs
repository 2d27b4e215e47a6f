use super::kernel::PotentialKernel;
use super::params::{Bounds, ParameterSet, ParameterSpec};
use super::potential::{LocalPotential, Scale};
use super::precompute::{BoundRFunction, RFunction};
use super::tag::PotentialTag;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FamilyError {
    #[error("Parameter '{parameter}' is missing for family '{family}'")]
    MissingParameter { family: String, parameter: String },
    #[error(
        "Parameter '{parameter}' = {value} is out of bounds [{lower}, {upper}] for family '{family}'"
    )]
    OutOfBounds {
        family: String,
        parameter: String,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error("Unknown parameter '{parameter}' for family '{family}'")]
    UnknownParameter { family: String, parameter: String },
    #[error("Tag '{tag}' names {found} species but '{family}' has coordination number {expected}")]
    TagArity {
        family: String,
        tag: String,
        expected: usize,
        found: usize,
    },
    #[error("Potential is not attached to a family")]
    NoFamily,
    #[error("Failed to set up '{family}': {message}")]
    Setup { family: String, message: String },
}

/// How a family derives the cutoff of an instance from its parameters.
#[derive(Clone)]
pub enum CutoffRule {
    Fixed(f64),
    Parameter(String),
    Computed(fn(&ParameterSet) -> f64),
}

impl fmt::Debug for CutoffRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoffRule::Fixed(v) => write!(f, "Fixed({v})"),
            CutoffRule::Parameter(name) => write!(f, "Parameter({name:?})"),
            CutoffRule::Computed(_) => f.write_str("Computed"),
        }
    }
}

pub type KernelFactory =
    Arc<dyn Fn(&ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> + Send + Sync>;

/// Fills in parameters that can be derived from the others before validation.
pub type ParameterCompletion = fn(&Family, ParameterSet) -> Result<ParameterSet, FamilyError>;

/// A potential shape: arity, parameter schema, cutoff rule and kernels.
///
/// Families are assembled with the consuming builder methods and then shared
/// behind an [`Arc`], so that every instance can point back to its family.
/// Scaled families take two extra parameters, `epsilon` and `sigma`, which are
/// stripped before the kernel is built and applied around every kernel call.
pub struct Family {
    tag: String,
    coordination_number: usize,
    parameters: Vec<ParameterSpec>,
    defaults: ParameterSet,
    cutoff: CutoffRule,
    pre_compute_r: Vec<RFunction>,
    scaled: bool,
    factory: KernelFactory,
    completion: Option<ParameterCompletion>,
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("tag", &self.tag)
            .field("coordination_number", &self.coordination_number)
            .field("parameters", &self.parameters)
            .field("defaults", &self.defaults)
            .field("cutoff", &self.cutoff)
            .field("pre_compute_r", &self.pre_compute_r)
            .field("scaled", &self.scaled)
            .finish_non_exhaustive()
    }
}

impl Family {
    pub fn new<F>(tag: impl Into<String>, coordination_number: usize, factory: F) -> Self
    where
        F: Fn(&ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> + Send + Sync + 'static,
    {
        Self {
            tag: tag.into(),
            coordination_number,
            parameters: Vec::new(),
            defaults: ParameterSet::new(),
            cutoff: CutoffRule::Fixed(0.0),
            pre_compute_r: Vec::new(),
            scaled: false,
            factory: Arc::new(factory),
            completion: None,
        }
    }

    pub fn parameter(mut self, name: &str, bounds: Option<Bounds>) -> Self {
        self.parameters.push(ParameterSpec::new(name, bounds));
        self
    }

    pub fn default_value(mut self, name: &str, value: f64) -> Self {
        self.defaults.insert(name.to_string(), value);
        self
    }

    pub fn cutoff(mut self, rule: CutoffRule) -> Self {
        self.cutoff = rule;
        self
    }

    pub fn pre_compute_r(mut self, functions: Vec<RFunction>) -> Self {
        self.pre_compute_r = functions;
        self
    }

    /// Marks the family as energy/length scaled and adds the `epsilon` and `sigma` parameters.
    pub fn scaled(mut self) -> Self {
        self.scaled = true;
        self.parameters
            .insert(0, ParameterSpec::new("sigma", Some(Bounds::new(0.0, f64::INFINITY))));
        self.parameters
            .insert(0, ParameterSpec::new("epsilon", Some(Bounds::new(0.0, f64::INFINITY))));
        self
    }

    pub fn completion(mut self, completion: ParameterCompletion) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn coordination_number(&self) -> usize {
        self.coordination_number
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn defaults(&self) -> &ParameterSet {
        &self.defaults
    }

    pub fn pre_compute_r_functions(&self) -> &[RFunction] {
        &self.pre_compute_r
    }

    pub fn is_scaled(&self) -> bool {
        self.scaled
    }

    /// Resolves the cutoff in kernel units.
    pub fn resolve_cutoff(&self, parameters: &ParameterSet) -> Result<f64, FamilyError> {
        match &self.cutoff {
            CutoffRule::Fixed(v) => Ok(*v),
            CutoffRule::Parameter(name) => parameters
                .get(name)
                .copied()
                .ok_or_else(|| self.missing(name)),
            CutoffRule::Computed(rule) => Ok(rule(parameters)),
        }
    }

    /// Builds the kernel for a complete parameter set, without validation.
    pub fn build_kernel(
        &self,
        parameters: &ParameterSet,
    ) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
        (self.factory)(parameters)
    }

    /// Creates a potential from this family.
    ///
    /// # Arguments
    ///
    /// * `tag` - The species combination the potential applies to, or `None` for all species.
    /// * `parameters` - Parameter values. Family defaults fill in anything omitted.
    ///
    /// # Return
    ///
    /// The bound potential, or a [`FamilyError`] naming the offending parameter if
    /// one is missing, unknown or outside its declared bounds.
    pub fn instantiate(
        self: &Arc<Self>,
        tag: Option<PotentialTag>,
        parameters: ParameterSet,
    ) -> Result<LocalPotential, FamilyError> {
        let mut merged = self.defaults.clone();
        merged.extend(parameters);
        if let Some(complete) = self.completion {
            merged = complete(&**self, merged)?;
        }
        self.validate(&merged)?;

        if let Some(tag) = &tag {
            self.check_tag(tag)?;
        }

        let (kernel_parameters, scale) = self.split_scale(&merged)?;
        let sigma = scale.map_or(1.0, |s| s.sigma);
        let cutoff = self.resolve_cutoff(&kernel_parameters)? * sigma;
        let kernel = self.build_kernel(&kernel_parameters)?;
        let r_functions = self
            .pre_compute_r
            .iter()
            .map(|&f| BoundRFunction::bind(f, &kernel_parameters).map_err(|p| self.missing(p)))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(family = %self.tag, cutoff, "Instantiated potential");
        Ok(LocalPotential::from_parts(
            self.coordination_number,
            merged,
            cutoff,
            kernel,
            r_functions,
            scale,
            tag,
            Some(Arc::clone(self)),
        ))
    }

    pub(crate) fn check_tag(&self, tag: &PotentialTag) -> Result<(), FamilyError> {
        if tag.coordination_number() != self.coordination_number {
            return Err(FamilyError::TagArity {
                family: self.tag.clone(),
                tag: tag.to_string(),
                expected: self.coordination_number,
                found: tag.coordination_number(),
            });
        }
        Ok(())
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<(), FamilyError> {
        for spec in &self.parameters {
            let value = *parameters
                .get(&spec.name)
                .ok_or_else(|| self.missing(&spec.name))?;
            if let Some(bounds) = spec.bounds {
                if !bounds.contains(value) {
                    return Err(FamilyError::OutOfBounds {
                        family: self.tag.clone(),
                        parameter: spec.name.clone(),
                        value,
                        lower: bounds.lower,
                        upper: bounds.upper,
                    });
                }
            }
        }
        let known = |name: &String| {
            self.defaults.contains_key(name) || self.parameters.iter().any(|s| &s.name == name)
        };
        if let Some(unknown) = parameters.keys().find(|k| !known(*k)) {
            return Err(FamilyError::UnknownParameter {
                family: self.tag.clone(),
                parameter: unknown.clone(),
            });
        }
        Ok(())
    }

    fn split_scale(
        &self,
        parameters: &ParameterSet,
    ) -> Result<(ParameterSet, Option<Scale>), FamilyError> {
        if !self.scaled {
            return Ok((parameters.clone(), None));
        }
        let mut kernel_parameters = parameters.clone();
        let epsilon = kernel_parameters
            .remove("epsilon")
            .ok_or_else(|| self.missing("epsilon"))?;
        let sigma = kernel_parameters
            .remove("sigma")
            .ok_or_else(|| self.missing("sigma"))?;
        Ok((kernel_parameters, Some(Scale { epsilon, sigma })))
    }

    pub(crate) fn missing(&self, parameter: &str) -> FamilyError {
        FamilyError::MissingParameter {
            family: self.tag.clone(),
            parameter: parameter.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::potentials::catalog::{self, on_site};
    use crate::core::potentials::params::parameter_set;

    fn lj() -> Arc<Family> {
        Arc::new(catalog::lennard_jones::family())
    }

    #[test]
    fn missing_parameter_error_names_parameter_and_family() {
        let result = lj().instantiate(None, parameter_set([("epsilon", 1.0), ("sigma", 1.0)]));
        assert_eq!(
            result.unwrap_err(),
            FamilyError::MissingParameter {
                family: "Lennard-Jones".to_string(),
                parameter: "a".to_string(),
            }
        );
    }

    #[test]
    fn out_of_bounds_parameter_is_rejected_inclusively() {
        let family = lj();
        let lower = 2f64.powf(1.0 / 6.0);
        assert!(family
            .instantiate(None, parameter_set([("epsilon", 1.0), ("sigma", 1.0), ("a", lower)]))
            .is_ok());

        let err = family
            .instantiate(None, parameter_set([("epsilon", 1.0), ("sigma", 1.0), ("a", 1.0)]))
            .unwrap_err();
        assert!(matches!(err, FamilyError::OutOfBounds { ref parameter, .. } if parameter == "a"));
        assert!(err.to_string().contains("Lennard-Jones"));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let family = Arc::new(on_site::family());
        let err = family
            .instantiate(None, parameter_set([("v0", 1.0), ("v1", 2.0)]))
            .unwrap_err();
        assert!(matches!(err, FamilyError::UnknownParameter { ref parameter, .. } if parameter == "v1"));
    }

    #[test]
    fn defaults_fill_omitted_parameters() {
        let family = Arc::new(catalog::behler::g5_family());
        let potential = family
            .instantiate(
                None,
                parameter_set([("a", 3.0), ("eta", 0.5), ("l", 1.0), ("zeta", 2.0)]),
            )
            .unwrap();
        assert_eq!(potential.parameters().get("epsilon"), Some(&1.0));
    }

    #[test]
    fn scaled_family_cutoff_is_multiplied_by_sigma() {
        let potential = lj()
            .instantiate(None, parameter_set([("epsilon", 2.0), ("sigma", 1.5), ("a", 2.5)]))
            .unwrap();
        assert!((potential.cutoff() - 3.75).abs() < 1e-12);
        assert_eq!(potential.scale(), Some(Scale { epsilon: 2.0, sigma: 1.5 }));
    }

    #[test]
    fn tag_arity_must_match_coordination_number() {
        let err = lj()
            .instantiate(
                Some("a-b-c".parse().unwrap()),
                parameter_set([("epsilon", 1.0), ("sigma", 1.0), ("a", 2.5)]),
            )
            .unwrap_err();
        assert!(matches!(err, FamilyError::TagArity { expected: 2, found: 3, .. }));
    }
}
