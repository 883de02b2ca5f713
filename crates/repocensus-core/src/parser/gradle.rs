use super::{file_name, interpolate, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::Gradle,
    can_parse,
    parse_file,
    parse_repo: None,
};

static COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']([\w.-]+):([\w.-]+):([^"']+)["']"#).expect("valid coordinate regex")
});

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:def\s+|val\s+|ext\.|project\.)\s*([\w.-]+)\s*=\s*['"]([^'"]+)['"]"#)
        .expect("valid variable regex")
});

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{?([\w.-]+)\}?").expect("valid reference regex"));

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "build.gradle"
}

/// Extract `"group:name:version"` coordinates from a Groovy build script.
pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;
    let vars = extract_variables(text);

    let mut deps = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.starts_with("//") || !line.contains(':') {
            continue;
        }

        for caps in COORDINATE.captures_iter(line) {
            let group = &caps[1];
            let name = &caps[2];
            let raw_version = &caps[3];
            if group.starts_with("scm") || raw_version.contains("scm:") {
                continue;
            }
            let version = interpolate(raw_version, &REFERENCE, |k| vars.get(k).cloned());
            deps.push(Dependency::new(EcosystemType::Gradle, group, name, version, path));
        }
    }

    Ok(deps)
}

fn extract_variables(text: &str) -> HashMap<String, String> {
    VARIABLE
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::UNPARSED_VERSION;

    const BUILD: &str = r#"
ext.springVersion = '6.1.2'
def kotlinVersion = "1.9.22"

dependencies {
    implementation "org.springframework:spring-core:${springVersion}"
    implementation 'org.jetbrains.kotlin:kotlin-stdlib:$kotlinVersion'
    testImplementation 'junit:junit:4.13.2'
    // implementation 'commented:out:1.0'
    runtimeOnly "com.example:missing:${undefinedVersion}"
}

scm {
    connection = 'scm:git:git://github.com/acme/api.git'
}
"#;

    #[test]
    fn test_parse_build_gradle() {
        let deps = parse_file("build.gradle", BUILD.as_bytes()).unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(deps[0].group, "org.springframework");
        assert_eq!(deps[0].version, "6.1.2");
        assert_eq!(deps[1].version, "1.9.22");
        assert_eq!(deps[2].name, "junit");
        assert_eq!(deps[2].version, "4.13.2");
        assert!(deps.iter().all(|d| d.ecosystem == EcosystemType::Gradle));
    }

    #[test]
    fn test_unresolved_variable_is_unparsed() {
        let deps = parse_file("build.gradle", BUILD.as_bytes()).unwrap();
        let missing = deps.iter().find(|d| d.name == "missing").unwrap();
        assert_eq!(missing.version, UNPARSED_VERSION);
    }

    #[test]
    fn test_scm_coordinates_skipped() {
        let deps = parse_file("build.gradle", BUILD.as_bytes()).unwrap();
        assert!(!deps.iter().any(|d| d.group.starts_with("scm")));
    }

    #[test]
    fn test_idempotent() {
        let first = parse_file("build.gradle", BUILD.as_bytes()).unwrap();
        let second = parse_file("build.gradle", BUILD.as_bytes()).unwrap();
        assert_eq!(first, second);
    }
}
