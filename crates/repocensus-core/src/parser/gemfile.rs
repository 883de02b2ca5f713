use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Gem,
    can_parse,
    parse_file,
    parse_repo: None,
};

static GEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"gem ['"]([^'"]+)['"](?:,\s*['"]([^'"]+)['"])?"#).expect("valid gem regex")
});

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "Gemfile"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;

    let deps = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| GEM.captures(line))
        .map(|caps| {
            let version = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            Dependency::new(EcosystemType::Gem, "", &caps[1], version, path)
        })
        .collect();
    Ok(deps)
}
