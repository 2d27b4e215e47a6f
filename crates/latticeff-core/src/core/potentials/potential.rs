use super::dispatch::call_screened;
use super::family::{Family, FamilyError};
use super::kernel::{KernelKind, KernelResult, Neighborhood, PotentialKernel, SpeciesMatch};
use super::params::ParameterSet;
use super::precompute::{BoundRFunction, PrecomputedR, PrecomputedView};
use super::registry::PotentialRecord;
use super::tag::PotentialTag;
use nalgebra::Vector3;
use std::fmt;
use std::sync::Arc;

/// Energy and length scale of a scaled potential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub epsilon: f64,
    pub sigma: f64,
}

impl Scale {
    /// Factor applied to raw kernel output.
    pub fn output_factor(&self, kind: KernelKind) -> f64 {
        match kind {
            KernelKind::Value => self.epsilon,
            KernelKind::Gradient => self.epsilon / self.sigma,
        }
    }
}

/// A potential bound to concrete parameter values and, optionally, a species tag.
///
/// Copies share the kernel and the family. For scaled potentials the distances
/// and coordinates handed to the kernel are divided by `sigma` and the output is
/// multiplied by `epsilon` (values) or `epsilon / sigma` (gradients); `cutoff`
/// is always in unscaled units.
#[derive(Clone)]
pub struct LocalPotential {
    coordination_number: usize,
    parameters: ParameterSet,
    cutoff: f64,
    kernel: Arc<dyn PotentialKernel>,
    r_functions: Vec<BoundRFunction>,
    scale: Option<Scale>,
    tag: Option<PotentialTag>,
    family: Option<Arc<Family>>,
}

impl LocalPotential {
    /// Wraps a kernel that does not belong to any family.
    pub fn new(
        coordination_number: usize,
        parameters: ParameterSet,
        cutoff: f64,
        kernel: Arc<dyn PotentialKernel>,
    ) -> Self {
        Self::from_parts(
            coordination_number,
            parameters,
            cutoff,
            kernel,
            Vec::new(),
            None,
            None,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        coordination_number: usize,
        parameters: ParameterSet,
        cutoff: f64,
        kernel: Arc<dyn PotentialKernel>,
        r_functions: Vec<BoundRFunction>,
        scale: Option<Scale>,
        tag: Option<PotentialTag>,
        family: Option<Arc<Family>>,
    ) -> Self {
        Self {
            coordination_number,
            parameters,
            cutoff,
            kernel,
            r_functions,
            scale,
            tag,
            family,
        }
    }

    pub fn with_r_functions(mut self, r_functions: Vec<BoundRFunction>) -> Self {
        self.r_functions = r_functions;
        self
    }

    pub fn coordination_number(&self) -> usize {
        self.coordination_number
    }

    /// All parameters, including `epsilon` and `sigma` for scaled potentials.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn tag(&self) -> Option<&PotentialTag> {
        self.tag.as_ref()
    }

    pub fn family(&self) -> Option<&Arc<Family>> {
        self.family.as_ref()
    }

    pub fn scale(&self) -> Option<Scale> {
        self.scale
    }

    pub fn kernel(&self) -> &dyn PotentialKernel {
        self.kernel.as_ref()
    }

    pub fn r_functions(&self) -> &[BoundRFunction] {
        &self.r_functions
    }

    /// A copy applying to a different species combination.
    pub fn with_tag(&self, tag: Option<PotentialTag>) -> Result<Self, FamilyError> {
        if let Some(tag) = &tag {
            match &self.family {
                Some(family) => family.check_tag(tag)?,
                None if tag.coordination_number() != self.coordination_number => {
                    return Err(FamilyError::TagArity {
                        family: self.family_name().to_string(),
                        tag: tag.to_string(),
                        expected: self.coordination_number,
                        found: tag.coordination_number(),
                    });
                }
                None => {}
            }
        }
        let mut copy = self.clone();
        copy.tag = tag;
        Ok(copy)
    }

    pub fn to_record(&self) -> Result<PotentialRecord, FamilyError> {
        let family = self.family.as_ref().ok_or(FamilyError::NoFamily)?;
        Ok(PotentialRecord {
            tag: family.tag().to_string(),
            parameters: self.parameters.clone(),
            ptag: self.tag.clone(),
        })
    }

    fn family_name(&self) -> &str {
        self.family.as_ref().map_or("LocalPotential", |f| f.tag())
    }

    /// Evaluates this potential and accumulates the result into `out`.
    ///
    /// `shared` is this potential's view into a batch-wide precompute table. When it
    /// is absent the r-functions are computed here.
    pub fn evaluate(
        &self,
        kind: KernelKind,
        neighborhood: &Neighborhood<'_>,
        species_mask: Option<&[SpeciesMatch]>,
        shared: Option<PrecomputedView<'_>>,
        parallel: bool,
        out: &mut [f64],
    ) -> KernelResult {
        let Some(scale) = self.scale else {
            return self.evaluate_raw(kind, neighborhood, species_mask, shared, parallel, out);
        };

        let inverse = 1.0 / scale.sigma;
        let rescale = |v: &[Vector3<f64>]| v.iter().map(|p| p * inverse).collect::<Vec<_>>();
        let distances = neighborhood
            .distances
            .with_data(neighborhood.distances.data().iter().map(|r| r * inverse).collect());
        let cartesian_row = rescale(neighborhood.cartesian_row);
        let cartesian_col = rescale(neighborhood.cartesian_col);
        let scaled = Neighborhood {
            distances: &distances,
            cartesian_row: &cartesian_row,
            cartesian_col: &cartesian_col,
            species_row: neighborhood.species_row,
        };

        let mut raw = vec![0.0; out.len()];
        let result = self.evaluate_raw(kind, &scaled, species_mask, None, parallel, &mut raw);
        let factor = scale.output_factor(kind);
        for (o, r) in out.iter_mut().zip(raw) {
            *o += r * factor;
        }
        result
    }

    fn evaluate_raw(
        &self,
        kind: KernelKind,
        neighborhood: &Neighborhood<'_>,
        species_mask: Option<&[SpeciesMatch]>,
        shared: Option<PrecomputedView<'_>>,
        parallel: bool,
        out: &mut [f64],
    ) -> KernelResult {
        let own;
        let handles: Vec<usize>;
        let precomputed = match shared {
            Some(view) => view,
            None if self.r_functions.is_empty() => PrecomputedView::empty(),
            None => {
                own = PrecomputedR::compute(neighborhood.distances.data(), &self.r_functions);
                handles = (0..self.r_functions.len()).collect();
                own.view(&handles)
            }
        };
        call_screened(
            self.kernel.as_ref(),
            kind,
            self.coordination_number,
            neighborhood,
            species_mask,
            precomputed,
            &self.r_functions,
            parallel,
            out,
        )
    }
}

impl PartialEq for LocalPotential {
    fn eq(&self, other: &Self) -> bool {
        self.coordination_number == other.coordination_number
            && self.parameters == other.parameters
            && self.cutoff == other.cutoff
            && self.tag == other.tag
            && self.scale == other.scale
            && self.family.as_ref().map(|f| f.tag()) == other.family.as_ref().map(|f| f.tag())
    }
}

impl fmt::Debug for LocalPotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPotential")
            .field("family", &self.family.as_ref().map(|f| f.tag()))
            .field("coordination_number", &self.coordination_number)
            .field("parameters", &self.parameters)
            .field("cutoff", &self.cutoff)
            .field("tag", &self.tag)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for LocalPotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.family_name())?;
        for (name, value) in &self.parameters {
            write!(f, "{name}={value}, ")?;
        }
        write!(f, "cutoff={}", self.cutoff)?;
        match &self.tag {
            Some(tag) => write!(f, ", tag='{tag}')"),
            None => write!(f, ")"),
        }
    }
}
