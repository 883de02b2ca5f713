use super::{file_name, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Go,
    can_parse,
    parse_file,
    parse_repo: None,
};

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "go.mod"
}

/// Parse `require` directives from a go.mod, both single-line and block form.
pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;

    let mut deps = Vec::new();
    let mut in_block = false;

    for raw in text.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if in_block {
            if line.starts_with(')') {
                in_block = false;
                continue;
            }
            push_requirement(line, path, &mut deps);
            continue;
        }

        if let Some(rest) = line.strip_prefix("require") {
            if rest.trim_start().starts_with('(') {
                in_block = true;
            } else if rest.starts_with(char::is_whitespace) {
                push_requirement(rest, path, &mut deps);
            }
        }
    }

    Ok(deps)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn push_requirement(line: &str, path: &str, deps: &mut Vec<Dependency>) {
    let mut fields = line.split_whitespace();
    let (Some(module), Some(version)) = (fields.next(), fields.next()) else {
        return;
    };
    let (group, name) = match module.rsplit_once('/') {
        Some((group, name)) => (group, name),
        None => ("", module),
    };
    deps.push(Dependency::new(EcosystemType::Go, group, name, version, path));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_block() {
        let content = b"require (\n  github.com/sirupsen/logrus v1.9.0\n)";
        let deps = parse_file("go.mod", content).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].group, "github.com/sirupsen");
        assert_eq!(deps[0].name, "logrus");
        assert_eq!(deps[0].version, "v1.9.0");
        assert_eq!(deps[0].ecosystem.as_str(), "go");
    }

    #[test]
    fn test_mixed_forms_and_comments() {
        let content = br#"module github.com/acme/api

go 1.21

require github.com/pkg/errors v0.9.1

require (
	golang.org/x/sync v0.5.0 // indirect
	// github.com/commented/out v1.0.0
	gopkg.in/yaml.v3 v3.0.1
	rsc.io v1.0.0
)
"#;
        let deps = parse_file("svc/go.mod", content).unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(deps[0].name, "errors");
        assert_eq!(deps[1].group, "golang.org/x");
        assert_eq!(deps[1].name, "sync");
        assert_eq!(deps[2].group, "gopkg.in");
        assert_eq!(deps[3].group, "");
        assert_eq!(deps[3].name, "rsc.io");
    }

    #[test]
    fn test_short_lines_ignored() {
        let content = b"require (\n  github.com/only/module\n)\n";
        assert!(parse_file("go.mod", content).unwrap().is_empty());
    }
}
