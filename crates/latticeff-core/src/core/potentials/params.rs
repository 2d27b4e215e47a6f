use std::collections::BTreeMap;

/// Named numeric parameters of a potential.
pub type ParameterSet = BTreeMap<String, f64>;

/// Inclusive range a parameter value must fall into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub const fn at_least(lower: f64) -> Self {
        Self::new(lower, f64::INFINITY)
    }

    pub const fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// One entry of a family's parameter schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub bounds: Option<Bounds>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, bounds: Option<Bounds>) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// Builds a parameter set from `(name, value)` pairs.
pub fn parameter_set<'a>(values: impl IntoIterator<Item = (&'a str, f64)>) -> ParameterSet {
    values
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive_on_both_ends() {
        let bounds = Bounds::new(-1.0, 1.0);
        assert!(bounds.contains(-1.0));
        assert!(bounds.contains(1.0));
        assert!(!bounds.contains(1.0 + 1e-12));
        assert!(!bounds.contains(f64::NAN));
    }

    #[test]
    fn at_least_is_open_above() {
        let bounds = Bounds::at_least(2f64.powf(1.0 / 6.0));
        assert!(bounds.contains(1e300));
        assert!(!bounds.contains(1.0));
    }
}
