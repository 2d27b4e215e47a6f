use crate::core::models::species::Species;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("Potential tag '{0}' must name one, two or three species separated by '-'")]
    Malformed(String),
}

/// The species combination a potential applies to.
///
/// The variant fixes the arity, so a tag always agrees with the coordination
/// number it was built for. The textual form joins species with `-`, e.g. `"Bi-Se"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PotentialTag {
    OnSite(Species),
    Pair(Species, Species),
    Triple(Species, Species, Species),
}

impl PotentialTag {
    pub fn coordination_number(&self) -> usize {
        match self {
            PotentialTag::OnSite(..) => 1,
            PotentialTag::Pair(..) => 2,
            PotentialTag::Triple(..) => 3,
        }
    }

    pub fn species(&self) -> Vec<&Species> {
        match self {
            PotentialTag::OnSite(a) => vec![a],
            PotentialTag::Pair(a, b) => vec![a, b],
            PotentialTag::Triple(a, b, c) => vec![a, b, c],
        }
    }
}

impl fmt::Display for PotentialTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PotentialTag::OnSite(a) => write!(f, "{a}"),
            PotentialTag::Pair(a, b) => write!(f, "{a}-{b}"),
            PotentialTag::Triple(a, b, c) => write!(f, "{a}-{b}-{c}"),
        }
    }
}

impl FromStr for PotentialTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(TagError::Malformed(s.to_string()));
        }
        match parts.as_slice() {
            [a] => Ok(PotentialTag::OnSite((*a).into())),
            [a, b] => Ok(PotentialTag::Pair((*a).into(), (*b).into())),
            [a, b, c] => Ok(PotentialTag::Triple((*a).into(), (*b).into(), (*c).into())),
            _ => Err(TagError::Malformed(s.to_string())),
        }
    }
}

impl TryFrom<String> for PotentialTag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PotentialTag> for String {
    fn from(tag: PotentialTag) -> Self {
        tag.to_string()
    }
}
