use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Yarn,
    can_parse,
    parse_file,
    parse_repo: None,
};

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "yarn.lock"
}

/// Walk a yarn.lock as header/version line pairs.
///
/// A header such as `"lodash@^4.17.0", lodash@^4.17.21:` names the package;
/// the next `version "4.17.21"` line (or `version: 4.17.21` in Berry lockfiles)
/// emits it and clears the current name.
pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;

    let mut deps = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.ends_with(':') {
            current = header_name(line);
            continue;
        }

        let Some(name) = current.as_deref() else {
            continue;
        };
        let version = line
            .strip_prefix("version ")
            .or_else(|| line.strip_prefix("version:"))
            .map(|v| v.trim().trim_matches('"'));
        if let Some(version) = version {
            deps.push(Dependency::new(EcosystemType::Yarn, "", name, version, path));
            current = None;
        }
    }

    Ok(deps)
}

fn header_name(line: &str) -> Option<String> {
    let header = line.trim_end_matches(':');
    header
        .split(',')
        .map(|key| key.trim_matches(|c| c == ' ' || c == '"'))
        .find_map(|key| match key.rfind('@') {
            Some(idx) if idx > 0 => Some(key[..idx].to_string()),
            _ => None,
        })
}
