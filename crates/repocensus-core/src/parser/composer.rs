use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Composer,
    can_parse,
    parse_file,
    parse_repo: None,
};

#[derive(Debug, Deserialize)]
struct ComposerJson {
    #[serde(default)]
    require: BTreeMap<String, String>,
    #[serde(default, rename = "require-dev")]
    require_dev: BTreeMap<String, String>,
}

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "composer.json"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let manifest: ComposerJson = serde_json::from_slice(content)
        .with_context(|| format!("Failed to parse {}", path))?;

    let deps = manifest
        .require
        .iter()
        .chain(manifest.require_dev.iter())
        .map(|(package, version)| {
            let (vendor, name) = package.split_once('/').unwrap_or(("", package.as_str()));
            Dependency::new(EcosystemType::Composer, vendor, name, version, path)
        })
        .collect();
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_composer() {
        let content = br#"{
  "require": {"php": "^8.2", "laravel/framework": "^11.0"},
  "require-dev": {"phpunit/phpunit": "^10.5"}
}"#;
        let deps = parse_file("composer.json", content).unwrap();
        assert_eq!(deps.len(), 3);
        let laravel = deps.iter().find(|d| d.name == "framework").unwrap();
        assert_eq!(laravel.group, "laravel");
        assert_eq!(laravel.version, "^11.0");
        assert!(deps.iter().any(|d| d.name == "php" && d.group.is_empty()));
    }
}
