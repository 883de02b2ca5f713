use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use serde::Deserialize;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Pyproject,
    can_parse,
    parse_file,
    parse_repo: None,
};

/// Tried in order; two-character operators come first so `>=` is not read as `>`.
const OPERATORS: [&str; 8] = [">=", "==", "<=", "~=", "!=", "<", ">", "="];

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<ProjectTable>,
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectTable {
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    poetry: Option<PoetryTable>,
}

#[derive(Debug, Default, Deserialize)]
struct PoetryTable {
    #[serde(default)]
    dependencies: toml::Table,
}

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "pyproject.toml"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;
    let doc: PyProject = toml::from_str(text)
        .with_context(|| format!("Failed to parse {}", path))?;

    let mut deps = Vec::new();

    if let Some(project) = &doc.project {
        for requirement in &project.dependencies {
            let (name, version) = split_requirement(requirement);
            deps.push(Dependency::new(EcosystemType::Pyproject, "", name, version, path));
        }
    }

    if let Some(poetry) = doc.tool.as_ref().and_then(|t| t.poetry.as_ref()) {
        for (name, spec) in &poetry.dependencies {
            if name == "python" {
                continue;
            }
            let version = match spec {
                toml::Value::String(v) => v.clone(),
                toml::Value::Table(_) => "complex".to_string(),
                _ => String::new(),
            };
            deps.push(Dependency::new(EcosystemType::Pyproject, "", name, version, path));
        }
    }

    Ok(deps)
}

/// Split a PEP 508 requirement at its first comparison operator. The operator
/// stays on the version (`">=2.0"`); an unconstrained requirement has an empty version.
fn split_requirement(requirement: &str) -> (&str, String) {
    for op in OPERATORS {
        if let Some(idx) = requirement.find(op) {
            let name = requirement[..idx].trim();
            let version = format!("{}{}", op, requirement[idx + op.len()..].trim());
            return (name, version);
        }
    }
    (requirement.trim(), String::new())
}
