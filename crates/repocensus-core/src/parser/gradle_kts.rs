use super::{file_name, interpolate, Dependency, EcosystemType, ParserDescriptor};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const DESCRIPTOR: ParserDescriptor = ParserDescriptor {
    ecosystem: EcosystemType::GradleKts,
    can_parse,
    parse_file,
    parse_repo: None,
};

static VAL_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"val\s+(\w+)\s*=\s*"([^"]*)""#).expect("valid val regex"));

static VAL_BY_PROJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"val\s+(\w+)(?:\s*:\s*\w+)?\s+by\s+project").expect("valid delegate regex"));

static DEPENDENCY_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(implementation|api|testImplementation)\(\s*["']([^:"']+):([^:"']+):([^"']+)["']\s*\)"#,
    )
    .expect("valid dependency regex")
});

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{?(\w+)\}?").expect("valid reference regex"));

pub fn can_parse(path: &str) -> bool {
    file_name(path) == "build.gradle.kts"
}

pub fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Dependency>> {
    let text = std::str::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;

    // `val x by project` is resolved from gradle.properties at build time; its value is unknown here.
    let mut vars: HashMap<String, String> = VAL_BY_PROJECT
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), String::new()))
        .collect();
    vars.extend(
        VAL_ASSIGN
            .captures_iter(text)
            .map(|caps| (caps[1].to_string(), caps[2].to_string())),
    );

    let deps = DEPENDENCY_CALL
        .captures_iter(text)
        .map(|caps| {
            let version = interpolate(&caps[4], &REFERENCE, |k| vars.get(k).cloned());
            Dependency::new(EcosystemType::GradleKts, &caps[2], &caps[3], version, path)
        })
        .collect();

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::UNPARSED_VERSION;

    const BUILD: &str = r#"
val ktorVersion = "2.3.7"
val logbackVersion: String by project

dependencies {
    implementation("io.ktor:ktor-server-core:$ktorVersion")
    implementation("io.ktor:ktor-server-netty:${ktorVersion}")
    api("ch.qos.logback:logback-classic:$logbackVersion")
    testImplementation("org.jetbrains.kotlin:kotlin-test:$kotlinVersion")
    testImplementation("io.mockk:mockk:1.13.8")
    runtimeOnly("org.postgresql:postgresql:42.7.1")
}
"#;

    #[test]
    fn test_parse_kts() {
        let deps = parse_file("build.gradle.kts", BUILD.as_bytes()).unwrap();
        assert_eq!(deps.len(), 5);
        assert_eq!(deps[0].group, "io.ktor");
        assert_eq!(deps[0].name, "ktor-server-core");
        assert_eq!(deps[0].version, "2.3.7");
        assert_eq!(deps[1].version, "2.3.7");
        assert_eq!(deps[4].version, "1.13.8");
        assert!(deps.iter().all(|d| d.ecosystem == EcosystemType::GradleKts));
    }

    #[test]
    fn test_unresolved_and_empty_values_are_unparsed() {
        let deps = parse_file("build.gradle.kts", BUILD.as_bytes()).unwrap();
        let logback = deps.iter().find(|d| d.name == "logback-classic").unwrap();
        assert_eq!(logback.version, UNPARSED_VERSION);
        let kotlin = deps.iter().find(|d| d.name == "kotlin-test").unwrap();
        assert_eq!(kotlin.version, UNPARSED_VERSION);
    }
}
