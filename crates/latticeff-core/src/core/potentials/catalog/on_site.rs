use super::{ON_SITE, require};
use crate::core::potentials::family::{CutoffRule, Family, FamilyError};
use crate::core::potentials::kernel::{KernelInput, KernelResult, PotentialKernel};
use crate::core::potentials::params::{Bounds, ParameterSet};
use std::sync::Arc;

/// A constant per-particle energy. Never reads the distance table.
#[derive(Debug, Clone, Copy)]
pub struct OnSite {
    pub v0: f64,
}

impl PotentialKernel for OnSite {
    fn value(&self, input: &KernelInput<'_>, out: &mut [f64]) -> KernelResult {
        for (row, slot) in out.iter_mut().enumerate() {
            if input.row_matches(row) {
                *slot += self.v0;
            }
        }
        Ok(())
    }

    fn gradient(&self, _input: &KernelInput<'_>, _out: &mut [f64]) -> KernelResult {
        Ok(())
    }
}

fn build(parameters: &ParameterSet) -> Result<Arc<dyn PotentialKernel>, FamilyError> {
    let v0 = require(ON_SITE, parameters, "v0")?;
    Ok(Arc::new(OnSite { v0 }))
}

pub fn family() -> Family {
    Family::new(ON_SITE, 1, build)
        .parameter("v0", Some(Bounds::unbounded()))
        .cutoff(CutoffRule::Fixed(0.0))
}
