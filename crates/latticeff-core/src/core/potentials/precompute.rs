use super::params::ParameterSet;
use std::collections::HashMap;
use std::fmt;

/// A scalar function of distance that several potentials may share.
///
/// `parameters` names the potential parameters the function reads, in the order
/// they are passed to `eval`. The `name` identifies the function when deciding
/// whether two potentials can reuse the same precomputed column, so it must be
/// unique per function.
#[derive(Clone, Copy)]
pub struct RFunction {
    pub name: &'static str,
    pub parameters: &'static [&'static str],
    pub eval: fn(f64, &[f64]) -> f64,
}

impl fmt::Debug for RFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// An [`RFunction`] bound to the parameter values of one potential.
#[derive(Debug, Clone)]
pub struct BoundRFunction {
    pub function: RFunction,
    pub values: Vec<f64>,
}

impl BoundRFunction {
    /// Binds `function` to `parameters`. Returns the first missing parameter name on failure.
    pub fn bind(function: RFunction, parameters: &ParameterSet) -> Result<Self, &'static str> {
        let values = function
            .parameters
            .iter()
            .map(|&name| parameters.get(name).copied().ok_or(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { function, values })
    }

    #[inline]
    pub fn eval(&self, r: f64) -> f64 {
        (self.function.eval)(r, &self.values)
    }

    fn signature(&self) -> (&'static str, Vec<u64>) {
        (
            self.function.name,
            self.values.iter().map(|v| v.to_bits()).collect(),
        )
    }
}

impl PartialEq for BoundRFunction {
    fn eq(&self, other: &Self) -> bool {
        self.signature() == other.signature()
    }
}

/// Dense `[nnz, columns]` table of r-function values, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecomputedR {
    data: Vec<f64>,
    columns: usize,
}

impl PrecomputedR {
    pub fn compute(r: &[f64], functions: &[BoundRFunction]) -> Self {
        let columns = functions.len();
        let mut data = Vec::with_capacity(r.len() * columns);
        for &distance in r {
            data.extend(functions.iter().map(|f| f.eval(distance)));
        }
        Self { data, columns }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn view<'a>(&'a self, handles: &'a [usize]) -> PrecomputedView<'a> {
        PrecomputedView {
            data: &self.data,
            stride: self.columns,
            handles,
        }
    }
}

/// The columns of a [`PrecomputedR`] table one potential reads, addressed by slot.
///
/// Slot `s` corresponds to the `s`-th r-function the potential declares.
#[derive(Debug, Clone, Copy)]
pub struct PrecomputedView<'a> {
    data: &'a [f64],
    stride: usize,
    handles: &'a [usize],
}

impl<'a> PrecomputedView<'a> {
    pub fn empty() -> Self {
        Self {
            data: &[],
            stride: 0,
            handles: &[],
        }
    }

    pub fn slots(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Value of slot `slot` at sparse entry `k`.
    #[inline]
    pub fn get(&self, k: usize, slot: usize) -> f64 {
        self.data[k * self.stride + self.handles[slot]]
    }
}

/// Precomputed r-functions shared across a batch of potentials.
///
/// Each distinct `(function, parameter values)` signature is evaluated once. A
/// potential excluded from sharing gets an empty handle list.
#[derive(Debug, Clone, Default)]
pub struct SharedPrecompute {
    table: PrecomputedR,
    handles: Vec<Vec<usize>>,
}

impl SharedPrecompute {
    pub fn for_potentials<'a, I>(r: &[f64], function_lists: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a [BoundRFunction]>>,
    {
        let mut unique: Vec<&BoundRFunction> = Vec::new();
        let mut index: HashMap<(&'static str, Vec<u64>), usize> = HashMap::new();
        let mut handles = Vec::new();

        for functions in function_lists {
            let potential_handles: Vec<usize> = functions
                .unwrap_or_default()
                .iter()
                .map(|f| {
                    *index.entry(f.signature()).or_insert_with(|| {
                        unique.push(f);
                        unique.len() - 1
                    })
                })
                .collect();
            handles.push(potential_handles);
        }

        let unique: Vec<BoundRFunction> = unique.into_iter().cloned().collect();
        Self {
            table: PrecomputedR::compute(r, &unique),
            handles,
        }
    }

    pub fn columns(&self) -> usize {
        self.table.columns()
    }

    pub fn handles(&self, potential: usize) -> &[usize] {
        self.handles
            .get(potential)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The view for the `potential`-th entry, or `None` if it was excluded or declares nothing.
    pub fn view(&self, potential: usize) -> Option<PrecomputedView<'_>> {
        let handles = self.handles(potential);
        (!handles.is_empty()).then(|| self.table.view(handles))
    }
}
