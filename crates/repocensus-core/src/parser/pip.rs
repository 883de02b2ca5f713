use super::{file_name, Dependency, EcosystemType, ParserDescriptor, UNPARSED_VERSION};
use anyhow::{Context, Result};

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Pip,
    can_parse,
    parse_file,
    parse_repo: None,
};

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "requirements.txt"
}

/// Parse `name==version` lines. Anything without an exact pin gets [`UNPARSED_VERSION`].
pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;

    let deps = text
        .lines()
        .map(str::trim)
        // pip options such as `-r base.txt` or `--index-url` are not packages
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .map(|line| match line.split_once("==") {
            Some((name, version)) => (name.trim(), version.trim()),
            None => (line, UNPARSED_VERSION),
        })
        .map(|(name, version)| Dependency::new(EcosystemType::Pip, "", name, version, path))
        .collect();

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirements() {
        let content = b"# web deps\nflask==2.0.1\n\nrequests>=2.31\n-r base.txt\nnumpy == 1.26.0\n";
        let deps = parse_file("requirements.txt", content).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "flask");
        assert_eq!(deps[0].version, "2.0.1");
        assert_eq!(deps[1].name, "requests>=2.31");
        assert_eq!(deps[1].version, UNPARSED_VERSION);
        assert_eq!(deps[2].name, "numpy");
        assert_eq!(deps[2].version, "1.26.0");
    }
}
