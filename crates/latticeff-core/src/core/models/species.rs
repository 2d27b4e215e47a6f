use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// An opaque species label attached to every point of a [`Cell`](super::cell::Cell).
///
/// Labels are compared and ordered as strings. Integer labels are converted to
/// their decimal representation, so `Species::from(8)` and `Species::from("8")`
/// denote the same species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Species(String);

impl Species {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Species {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl From<String> for Species {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl From<u32> for Species {
    fn from(label: u32) -> Self {
        Self(label.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpeciesError {
    #[error("Unknown species '{0}'")]
    Unknown(Species),
    #[error("Species index {index} is out of range for a codec with {len} species")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Dense zero-based encoding of the species present in one or more cells.
///
/// Species are sorted, so the encoding of a given label set does not depend on
/// the order in which labels were observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesCodec {
    species: Vec<Species>,
    lookup: BTreeMap<Species, usize>,
}

impl SpeciesCodec {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a Species>,
    {
        let mut species: Vec<Species> = labels.into_iter().cloned().collect();
        species.sort();
        species.dedup();
        let lookup = species
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { species, lookup }
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn contains(&self, species: &Species) -> bool {
        self.lookup.contains_key(species)
    }

    pub fn encode(&self, species: &Species) -> Result<usize, SpeciesError> {
        self.lookup
            .get(species)
            .copied()
            .ok_or_else(|| SpeciesError::Unknown(species.clone()))
    }

    /// Encodes a label, returning `default` for species the codec has never seen.
    pub fn encode_or(&self, species: &Species, default: usize) -> usize {
        self.lookup.get(species).copied().unwrap_or(default)
    }

    pub fn encode_all(&self, labels: &[Species]) -> Result<Vec<usize>, SpeciesError> {
        labels.iter().map(|s| self.encode(s)).collect()
    }

    pub fn decode(&self, index: usize) -> Result<&Species, SpeciesError> {
        self.species.get(index).ok_or(SpeciesError::IndexOutOfRange {
            index,
            len: self.species.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<Species> {
        raw.iter().map(|&s| Species::from(s)).collect()
    }

    #[test]
    fn codec_sorts_and_deduplicates_labels() {
        let observed = labels(&["se", "bi", "se", "bi", "bi"]);
        let codec = SpeciesCodec::from_labels(&observed);

        assert_eq!(codec.species(), labels(&["bi", "se"]).as_slice());
        assert_eq!(codec.encode_all(&observed).unwrap(), vec![1, 0, 1, 0, 0]);
    }

    #[test]
    fn encoding_is_independent_of_observation_order() {
        let a = SpeciesCodec::from_labels(&labels(&["c", "a", "b"]));
        let b = SpeciesCodec::from_labels(&labels(&["b", "c", "a"]));
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_species_is_an_error_unless_default_requested() {
        let codec = SpeciesCodec::from_labels(&labels(&["a"]));
        let missing = Species::from("x");

        assert_eq!(
            codec.encode(&missing),
            Err(SpeciesError::Unknown(missing.clone()))
        );
        assert_eq!(codec.encode_or(&missing, usize::MAX), usize::MAX);
    }

    #[test]
    fn decode_inverts_encode() {
        let codec = SpeciesCodec::from_labels(&labels(&["o", "h"]));
        let h = Species::from("h");
        let index = codec.encode(&h).unwrap();
        assert_eq!(codec.decode(index).unwrap(), &h);
        assert!(matches!(
            codec.decode(5),
            Err(SpeciesError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn integer_labels_share_the_string_namespace() {
        assert_eq!(Species::from(8u32), Species::from("8"));
    }
}
