use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Npm,
    can_parse,
    parse_file,
    parse_repo: None,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: BTreeMap<String, LockPackage>,
}

#[derive(Debug, Deserialize)]
struct LockPackage {
    #[serde(default)]
    version: Option<String>,
}

const NODE_MODULES: &str = "node_modules/";

pub fn can_parse(path: &str) -> bool {
    matches!(file_name(path), "package.json" | "package-lock.json")
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    if file_name(path) == "package-lock.json" {
        parse_lock(path, content)
    } else {
        parse_manifest(path, content)
    }
}

fn parse_manifest(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let manifest: PackageJson = serde_json::from_slice(content)
        .with_context(|| format!("Failed to parse {}", path))?;

    let deps = manifest
        .dependencies
        .iter()
        .chain(manifest.dev_dependencies.iter())
        .filter_map(|(name, version)| {
            let version = version.as_str()?.trim();
            if version.is_empty() {
                return None;
            }
            Some(build(name, version, path))
        })
        .collect();
    Ok(deps)
}

fn parse_lock(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let lock: PackageLock = serde_json::from_slice(content)
        .with_context(|| format!("Failed to parse {}", path))?;

    let deps = lock
        .packages
        .iter()
        .filter_map(|(key, pkg)| {
            // Workspace members (`packages/x/node_modules/y`) are not installs of this lockfile.
            if !key.starts_with(NODE_MODULES) {
                return None;
            }
            // Nested installs look like node_modules/a/node_modules/b; the package is b.
            let idx = key.rfind(NODE_MODULES)?;
            let name = &key[idx + NODE_MODULES.len()..];
            let version = pkg.version.as_deref()?.trim();
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some(build(name, version, path))
        })
        .collect();
    Ok(deps)
}

fn build(full_name: &str, version: &str, path: &str) -> Dependency {
    let (group, name) = split_scope(full_name);
    Dependency::new(EcosystemType::Npm, group, name, version, path)
}

/// Split `@scope/name` into (`@scope`, `name`); unscoped names have no group.
pub(crate) fn split_scope(full_name: &str) -> (&str, &str) {
    if full_name.starts_with('@') {
        if let Some((scope, name)) = full_name.split_once('/') {
            return (scope, name);
        }
    }
    ("", full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_json() {
        let content = br#"{
  "name": "web",
  "dependencies": {"react": "^18.2.0", "@types/node": "20.1.0", "empty": ""},
  "devDependencies": {"jest": "29.7.0"}
}"#;
        let deps = parse_file("web/package.json", content).unwrap();
        assert_eq!(deps.len(), 3);
        let types = deps.iter().find(|d| d.name == "node").unwrap();
        assert_eq!(types.group, "@types");
        assert_eq!(types.version, "20.1.0");
        assert!(deps.iter().all(|d| d.source_path == "web/package.json"));
        assert!(deps.iter().all(|d| d.ecosystem == EcosystemType::Npm));
    }

    #[test]
    fn test_package_lock() {
        let content = br#"{
  "lockfileVersion": 3,
  "packages": {
    "": {"name": "web", "version": "1.0.0"},
    "node_modules/lodash": {"version": "4.17.21"},
    "node_modules/@babel/core": {"version": "7.23.0"},
    "node_modules/a/node_modules/b": {"version": "2.0.0"},
    "node_modules/linked": {"link": true},
    "packages/ui": {"name": "ui", "version": "0.1.0"},
    "packages/ui/node_modules/react": {"version": "18.2.0"}
  }
}"#;
        let deps = parse_file("package-lock.json", content).unwrap();
        assert_eq!(deps.len(), 3);
        assert!(deps.iter().any(|d| d.name == "lodash" && d.group.is_empty()));
        assert!(deps.iter().any(|d| d.name == "core" && d.group == "@babel"));
        assert!(deps.iter().any(|d| d.name == "b" && d.version == "2.0.0"));
        assert!(!deps.iter().any(|d| d.name == "react"));
    }

    #[test]
    fn test_invalid_json_errors() {
        assert!(parse_file("package.json", b"nope").is_err());
    }

    #[test]
    fn test_split_scope() {
        assert_eq!(split_scope("@scope/pkg"), ("@scope", "pkg"));
        assert_eq!(split_scope("pkg"), ("", "pkg"));
        assert_eq!(split_scope("@broken"), ("", "@broken"));
    }
}
