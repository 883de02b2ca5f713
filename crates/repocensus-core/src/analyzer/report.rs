use crate::analyzer::dockerfile::DockerfileAnalysis;
use crate::parser::{Dependency, EcosystemType, UNPARSED_VERSION};
use crate::sbom::SbomPackage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Analysis of one Dockerfile, keyed by its repository path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileReport {
    pub path: String,
    pub analysis: DockerfileAnalysis,
}

/// Everything the static-analysis engine derives from one repository's files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInventory {
    pub dependencies: Vec<Dependency>,
    pub dockerfiles: Vec<DockerfileReport>,
    pub sbom_packages: Vec<SbomPackage>,
}

impl RepoInventory {
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Dependencies whose version referenced a variable that could not be resolved.
    pub fn unparsed_count(&self) -> usize {
        self.dependencies
            .iter()
            .filter(|d| d.version == UNPARSED_VERSION)
            .count()
    }

    pub fn by_ecosystem(&self) -> BTreeMap<EcosystemType, usize> {
        let mut counts = BTreeMap::new();
        for dep in &self.dependencies {
            *counts.entry(dep.ecosystem).or_insert(0) += 1;
        }
        counts
    }

    /// Dockerfiles pinned to `latest`, missing a `USER`, or carrying secret-like `ENV`/`ARG` names.
    pub fn flagged_dockerfiles(&self) -> impl Iterator<Item = &DockerfileReport> {
        self.dockerfiles.iter().filter(|d| {
            let f = &d.analysis.features;
            f.uses_latest_tag || !f.has_user_instruction || f.has_secrets_in_env_or_arg
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(ecosystem: EcosystemType, version: &str) -> Dependency {
        Dependency::new(ecosystem, "", "x", version, "f")
    }

    #[test]
    fn test_counts() {
        let inventory = RepoInventory {
            dependencies: vec![
                dep(EcosystemType::Npm, "1.0.0"),
                dep(EcosystemType::Npm, "2.0.0"),
                dep(EcosystemType::Maven, UNPARSED_VERSION),
            ],
            ..Default::default()
        };
        assert_eq!(inventory.dependency_count(), 3);
        assert_eq!(inventory.unparsed_count(), 1);
        let counts = inventory.by_ecosystem();
        assert_eq!(counts[&EcosystemType::Npm], 2);
        assert_eq!(counts[&EcosystemType::Maven], 1);
    }
}
