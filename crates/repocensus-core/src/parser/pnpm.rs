use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Pnpm,
    can_parse,
    parse_file,
    parse_repo: None,
};

#[derive(Debug, Default, Deserialize)]
struct PnpmLock {
    #[serde(default)]
    importers: BTreeMap<String, Importer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Importer {
    #[serde(default)]
    dependencies: BTreeMap<String, ImporterDependency>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, ImporterDependency>,
}

/// Lockfile v6+ stores `{specifier, version}`; older files store the bare version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImporterDependency {
    Detailed {
        #[serde(default)]
        version: Option<String>,
    },
    Bare(String),
}

impl ImporterDependency {
    fn version(&self) -> Option<&str> {
        match self {
            Self::Detailed { version } => version.as_deref(),
            Self::Bare(v) => Some(v),
        }
    }
}

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "pnpm-lock.yaml"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let lock: PnpmLock = serde_yaml::from_slice(content)
        .with_context(|| format!("Failed to parse {}", path))?;

    let mut deps = Vec::new();
    for importer in lock.importers.values() {
        for (full_name, entry) in importer.dependencies.iter().chain(importer.dev_dependencies.iter()) {
            let Some(raw) = entry.version() else {
                continue;
            };
            let version = strip_peer_suffix(raw);
            if version.is_empty() {
                continue;
            }
            let (group, name) = split_name(full_name);
            deps.push(Dependency::new(EcosystemType::Pnpm, group, name, version, path));
        }
    }
    Ok(deps)
}

/// `7.23.0(@babel/core@7.23.0)` -> `7.23.0`
fn strip_peer_suffix(version: &str) -> &str {
    match version.find('(') {
        Some(idx) => version[..idx].trim(),
        None => version.trim(),
    }
}

fn split_name(full_name: &str) -> (&str, &str) {
    if full_name.starts_with('@') {
        if let Some(idx) = full_name.find(['/', ':']) {
            return (&full_name[..idx], &full_name[idx + 1..]);
        }
    }
    ("", full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pnpm_lock() {
        let content = br#"
lockfileVersion: '9.0'

importers:
  .:
    dependencies:
      react:
        specifier: ^18.2.0
        version: 18.2.0
      '@tanstack/react-query':
        specifier: ^5.0.0
        version: 5.17.9(react@18.2.0)
    devDependencies:
      typescript:
        specifier: ^5.3.0
        version: 5.3.3
  packages/ui:
    dependencies:
      clsx:
        specifier: ^2.0.0
        version: 2.1.0

packages:
  react@18.2.0:
    resolution: {integrity: sha512-x}
"#;
        let deps = parse_file("pnpm-lock.yaml", content).unwrap();
        assert_eq!(deps.len(), 4);
        let query = deps.iter().find(|d| d.name == "react-query").unwrap();
        assert_eq!(query.group, "@tanstack");
        assert_eq!(query.version, "5.17.9");
        assert!(deps.iter().any(|d| d.name == "clsx" && d.version == "2.1.0"));
        assert!(deps.iter().all(|d| d.ecosystem == EcosystemType::Pnpm));
    }

    #[test]
    fn test_lock_without_importers() {
        let content = b"lockfileVersion: 5.4\ndependencies:\n  react: 18.2.0\n";
        assert!(parse_file("pnpm-lock.yaml", content).unwrap().is_empty());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("@scope/pkg"), ("@scope", "pkg"));
        assert_eq!(split_name("@scope:pkg"), ("@scope", "pkg"));
        assert_eq!(split_name("plain"), ("", "plain"));
    }
}
