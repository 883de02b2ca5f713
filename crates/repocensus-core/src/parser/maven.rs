use super::{file_name, interpolate, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Maven,
    can_parse,
    parse_file,
    parse_repo: Some(parse_repo),
};

static PROPERTY_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid property regex"));

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    parent: Option<Parent>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: DependencyList,
    #[serde(default)]
    dependency_management: DependencyManagement,
}

#[derive(Debug, Default, Deserialize)]
struct Parent {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DependencyManagement {
    #[serde(default)]
    dependencies: DependencyList,
}

#[derive(Debug, Default, Deserialize)]
struct DependencyList {
    #[serde(default, rename = "dependency")]
    items: Vec<PomDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomDependency {
    #[serde(default)]
    group_id: String,
    #[serde(default)]
    artifact_id: String,
    #[serde(default)]
    version: Option<String>,
}

impl Project {
    fn parse(path: &str, content: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .with_context(|| format!("{} is not valid UTF-8", path))?;
        quick_xml::de::from_str(text).with_context(|| format!("Failed to parse {}", path))
    }

    fn raw_version(&self) -> &str {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.version.as_deref()))
            .unwrap_or_default()
    }

    /// Resolve dependencies against `pool` plus this project's own `project.version`.
    fn resolve(&self, path: &str, mut pool: BTreeMap<String, String>) -> Vec<Dependency> {
        let raw = self.raw_version();
        if !raw.is_empty() {
            let own = interpolate(raw, &PROPERTY_REF, |k| pool.get(k).cloned());
            pool.insert("project.version".to_string(), own);
        }

        self.dependencies
            .items
            .iter()
            .chain(self.dependency_management.dependencies.items.iter())
            .filter_map(|dep| {
                let raw = dep.version.as_deref().map(str::trim).unwrap_or_default();
                if raw.is_empty() {
                    return None;
                }
                let version = interpolate(raw, &PROPERTY_REF, |k| pool.get(k).cloned());
                Some(Dependency::new(
                    EcosystemType::Maven,
                    dep.group_id.trim(),
                    dep.artifact_id.trim(),
                    version,
                    path,
                ))
            })
            .collect()
    }
}

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "pom.xml"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let project = Project::parse(path, content)?;
    let pool = project.properties.clone();
    Ok(project.resolve(path, pool))
}

/// Parse every pom.xml with the properties of all of them merged into one pool,
/// so modules can reference versions declared in a parent POM.
pub fn parse_repo(files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<Dependency>> {
    let projects = files
        .iter()
        .map(|(path, content)| Project::parse(path, content).map(|p| (path, p)))
        .collect::<Result<Vec<_>>>()?;

    let mut pool = BTreeMap::new();
    for (_, project) in &projects {
        pool.extend(project.properties.clone());
    }

    Ok(projects
        .iter()
        .flat_map(|(path, project)| project.resolve(path, pool.clone()))
        .collect())
}
