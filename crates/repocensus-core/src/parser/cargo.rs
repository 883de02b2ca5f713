use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Cargo,
    can_parse,
    parse_file,
    parse_repo: None,
};

const SECTIONS: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "Cargo.toml"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;
    let manifest: toml::Table = toml::from_str(text)
        .with_context(|| format!("Failed to parse {}", path))?;

    let mut deps = Vec::new();
    for section in SECTIONS {
        let Some(table) = manifest.get(section).and_then(toml::Value::as_table) else {
            continue;
        };
        for (name, spec) in table {
            let version = match spec {
                toml::Value::String(v) => v.as_str(),
                toml::Value::Table(t) => t.get("version").and_then(toml::Value::as_str).unwrap_or_default(),
                _ => "",
            };
            deps.push(Dependency::new(EcosystemType::Cargo, "", name, version, path));
        }
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cargo_toml() {
        let content = br#"
[package]
name = "demo"

[dependencies]
serde = "1"
tokio = { version = "1.35", features = ["full"] }
local = { path = "../local" }

[dev-dependencies]
tempfile = "3"

[build-dependencies]
cc = "1.0"
"#;
        let deps = parse_file("Cargo.toml", content).unwrap();
        assert_eq!(deps.len(), 5);
        assert!(deps.iter().any(|d| d.name == "tokio" && d.version == "1.35"));
        assert!(deps.iter().any(|d| d.name == "local" && d.version.is_empty()));
        assert!(deps.iter().any(|d| d.name == "cc"));
        assert!(deps.iter().all(|d| d.group.is_empty()));
    }

    #[test]
    fn test_invalid_toml_errors() {
        assert!(parse_file("Cargo.toml", b"[dependencies\nserde = ").is_err());
    }
}
