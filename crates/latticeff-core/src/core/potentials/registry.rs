use super::catalog;
use super::family::{Family, FamilyError};
use super::params::ParameterSet;
use super::potential::LocalPotential;
use super::tag::PotentialTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Plain representation of a potential: family tag, parameters and species tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialRecord {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptag: Option<PotentialTag>,
    pub parameters: ParameterSet,
}

#[derive(Debug, Serialize, Deserialize)]
struct PotentialSetFile {
    #[serde(default)]
    potential: Vec<PotentialRecord>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A family with tag '{0}' is already registered")]
    DuplicateTag(String),
    #[error("No family registered with tag '{0}'")]
    UnknownFamily(String),
    #[error(transparent)]
    Family(#[from] FamilyError),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Families addressable by tag, used to rebuild potentials from records.
#[derive(Debug, Clone, Default)]
pub struct FamilyRegistry {
    families: BTreeMap<String, Arc<Family>>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in family.
    pub fn with_builtin() -> Self {
        let families = catalog::builtin_families()
            .into_iter()
            .map(|f| (f.tag().to_string(), Arc::new(f)))
            .collect();
        Self { families }
    }

    pub fn register(&mut self, family: Family) -> Result<Arc<Family>, RegistryError> {
        if self.families.contains_key(family.tag()) {
            return Err(RegistryError::DuplicateTag(family.tag().to_string()));
        }
        let family = Arc::new(family);
        self.families
            .insert(family.tag().to_string(), Arc::clone(&family));
        Ok(family)
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<Family>> {
        self.families.get(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    pub fn family(&self, tag: &str) -> Result<&Arc<Family>, RegistryError> {
        self.get(tag)
            .ok_or_else(|| RegistryError::UnknownFamily(tag.to_string()))
    }

    pub fn instantiate(
        &self,
        family: &str,
        tag: Option<PotentialTag>,
        parameters: ParameterSet,
    ) -> Result<LocalPotential, RegistryError> {
        Ok(self.family(family)?.instantiate(tag, parameters)?)
    }

    pub fn from_record(&self, record: &PotentialRecord) -> Result<LocalPotential, RegistryError> {
        self.instantiate(&record.tag, record.ptag.clone(), record.parameters.clone())
    }

    /// Reads a TOML file of `[[potential]]` records.
    pub fn load_potentials(&self, path: &Path) -> Result<Vec<LocalPotential>, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: PotentialSetFile =
            toml::from_str(&content).map_err(|e| RegistryError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        let potentials = file
            .potential
            .iter()
            .map(|record| self.from_record(record))
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = potentials.len(), path = %path.display(), "Loaded potentials");
        Ok(potentials)
    }

    pub fn save_potentials(path: &Path, potentials: &[LocalPotential]) -> Result<(), RegistryError> {
        let file = PotentialSetFile {
            potential: potentials
                .iter()
                .map(LocalPotential::to_record)
                .collect::<Result<_, _>>()?,
        };
        let content = toml::to_string(&file)?;
        std::fs::write(path, content).map_err(|e| RegistryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::potentials::catalog::on_site;
    use crate::core::potentials::params::parameter_set;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn examples(registry: &FamilyRegistry) -> Vec<LocalPotential> {
        let cases: [(&str, Option<&str>, Vec<(&str, f64)>); 9] = [
            ("on-site", Some("a"), vec![("v0", 3.14)]),
            ("harmonic repulsion", Some("a-b"), vec![("a", 1.5), ("epsilon", 0.5)]),
            ("Lennard-Jones", Some("a-a"), vec![("epsilon", 0.3), ("sigma", 1.1), ("a", 2.5)]),
            (
                "Stillinger-Weber type 2",
                Some("b-b"),
                vec![("epsilon", 2.0), ("sigma", 1.2), ("a", 1.8), ("p", 4.0), ("q", 0.0)],
            ),
            (
                "Stillinger-Weber type 3",
                Some("a-b-b"),
                vec![
                    ("epsilon", 2.0),
                    ("sigma", 1.2),
                    ("l", 21.0),
                    ("gamma", 1.2),
                    ("cos_theta0", -1.0 / 3.0),
                    ("a", 1.8),
                ],
            ),
            ("Behler type 2", None, vec![("a", 4.0), ("eta", 0.7), ("r_sphere", 1.0)]),
            ("Sigmoid", Some("b-a"), vec![("a", 4.0), ("dr", 0.3), ("r0", 2.0)]),
            (
                "Behler type 4",
                Some("a-a-b"),
                vec![("a", 4.0), ("eta", 0.2), ("l", -1.0), ("zeta", 2.0)],
            ),
            (
                "Behler type 5",
                None,
                vec![("a", 4.0), ("eta", 0.2), ("l", 1.0), ("zeta", 4.0), ("epsilon", 0.5)],
            ),
        ];
        cases
            .into_iter()
            .map(|(family, tag, parameters)| {
                registry
                    .instantiate(family, tag.map(|t| t.parse().unwrap()), parameter_set(parameters))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn duplicate_family_tag_is_rejected() {
        let mut registry = FamilyRegistry::with_builtin();
        let result = registry.register(on_site::family());
        assert!(matches!(result, Err(RegistryError::DuplicateTag(tag)) if tag == "on-site"));
    }

    #[test]
    fn registries_are_independent() {
        let mut empty = FamilyRegistry::new();
        assert!(empty.get("on-site").is_none());
        empty.register(on_site::family()).unwrap();
        assert!(empty.get("on-site").is_some());
        assert_eq!(FamilyRegistry::new().tags().count(), 0);
    }

    #[test]
    fn every_builtin_family_round_trips_through_records() {
        let registry = FamilyRegistry::with_builtin();
        let potentials = examples(&registry);
        assert_eq!(potentials.len(), registry.tags().count());

        for potential in &potentials {
            let record = potential.to_record().unwrap();
            let restored = registry.from_record(&record).unwrap();
            assert_eq!(restored.coordination_number(), potential.coordination_number());
            assert_eq!(restored.cutoff(), potential.cutoff());
            assert_eq!(restored.tag(), potential.tag());
            assert_eq!(restored.parameters(), potential.parameters());
            assert_eq!(&restored, potential);
        }
    }

    #[test]
    fn potential_sets_round_trip_through_toml_files() {
        let registry = FamilyRegistry::with_builtin();
        let potentials = examples(&registry);
        let file = NamedTempFile::new().unwrap();

        FamilyRegistry::save_potentials(file.path(), &potentials).unwrap();
        let restored = registry.load_potentials(file.path()).unwrap();

        assert_eq!(restored, potentials);
    }

    #[test]
    fn load_reports_unknown_family() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[potential]]
tag = "Morse"
ptag = "a-b"
parameters = {{ d = 1.0 }}
"#
        )
        .unwrap();

        let result = FamilyRegistry::with_builtin().load_potentials(file.path());
        assert!(matches!(result, Err(RegistryError::UnknownFamily(tag)) if tag == "Morse"));
    }

    #[test]
    fn load_reports_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[potential]\ntag = ").unwrap();
        let result = FamilyRegistry::with_builtin().load_potentials(file.path());
        assert!(matches!(result, Err(RegistryError::Toml { .. })));
    }

    #[test]
    fn potential_without_family_cannot_be_recorded() {
        let family_less = LocalPotential::new(
            1,
            ParameterSet::new(),
            0.0,
            registry_kernel(),
        );
        assert_eq!(family_less.to_record().unwrap_err(), FamilyError::NoFamily);
    }

    fn registry_kernel() -> Arc<dyn crate::core::potentials::kernel::PotentialKernel> {
        FamilyRegistry::with_builtin()
            .family("on-site")
            .unwrap()
            .build_kernel(&parameter_set([("v0", 1.0)]))
            .unwrap()
    }
}
