use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Security and posture flags for one Dockerfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileFeatures {
    pub base_image: String,
    pub base_tag: String,
    pub stage_count: usize,
    pub uses_latest_tag: bool,
    pub uses_multistage: bool,
    pub has_user_instruction: bool,
    pub has_copy_sensitive: bool,
    pub uses_add_instruction: bool,
    pub has_package_installs: bool,
    pub installs_curl_or_wget: bool,
    pub installs_build_tools: bool,
    pub has_apt_get_clean: bool,
    pub world_writable: bool,
    pub has_secrets_in_env_or_arg: bool,
    pub has_label: bool,
    pub has_expose: bool,
    pub has_entrypoint_or_cmd: bool,
    pub has_healthcheck: bool,
}

/// One build stage that starts from an external image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerStageMeta {
    pub stage_index: usize,
    pub base_image: String,
    pub base_tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileAnalysis {
    pub features: DockerfileFeatures,
    pub stages: Vec<DockerStageMeta>,
}

const SENSITIVE_PATHS: [&str; 3] = [".ssh", "id_rsa", "secrets"];
const PACKAGE_INSTALLS: [&str; 4] = ["apt-get install", "apk add", "yum install", "dnf install"];
const BUILD_TOOLS: [&str; 3] = ["gcc", "make", "build-essential"];
const SECRET_WORDS: [&str; 3] = ["password", "token", "secret"];
const APT_CLEANUP: [&str; 2] = ["apt-get clean", "rm -rf /var/lib/apt/lists"];

/// Analyze a Dockerfile in a single case-insensitive pass.
///
/// `FROM` lines naming an earlier stage alias do not start a new external stage,
/// and `FROM ${VAR}` lines count as stages but are never recorded as a base image.
pub fn analyze_dockerfile(content: &str) -> DockerfileAnalysis {
    let mut features = DockerfileFeatures::default();
    let mut stages = Vec::new();
    let mut aliases: HashSet<String> = HashSet::new();
    let mut env_continues = false;

    for raw in content.lines() {
        let line = raw.trim().to_lowercase();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let instruction = line.split_whitespace().next().unwrap_or_default();

        if env_continues {
            // Continued ENV/ARG assignments carry no keyword of their own.
            if SECRET_WORDS.iter().any(|w| line.contains(w)) {
                features.has_secrets_in_env_or_arg = true;
            }
            env_continues = line.ends_with('\\');
            continue;
        }

        if instruction == "from" {
            record_stage(&line, &mut features, &mut stages, &mut aliases);
        }

        match instruction {
            "user" => features.has_user_instruction = true,
            "copy" | "add" => {
                if instruction == "add" {
                    features.uses_add_instruction = true;
                }
                if SENSITIVE_PATHS.iter().any(|p| line.contains(p)) {
                    features.has_copy_sensitive = true;
                }
            }
            "env" | "arg" => {
                if SECRET_WORDS.iter().any(|w| line.contains(w)) {
                    features.has_secrets_in_env_or_arg = true;
                }
                env_continues = line.ends_with('\\');
            }
            "label" => features.has_label = true,
            "expose" => features.has_expose = true,
            "entrypoint" | "cmd" => features.has_entrypoint_or_cmd = true,
            "healthcheck" => features.has_healthcheck = true,
            _ => {}
        }

        // RUN continuations carry no instruction keyword, so these match on any line.
        if PACKAGE_INSTALLS.iter().any(|p| line.contains(p)) {
            features.has_package_installs = true;
        }
        if line.contains("curl") || line.contains("wget") {
            features.installs_curl_or_wget = true;
        }
        if BUILD_TOOLS.iter().any(|t| line.contains(t)) {
            features.installs_build_tools = true;
        }
        if APT_CLEANUP.iter().any(|c| line.contains(c)) {
            features.has_apt_get_clean = true;
        }
        if line.contains("chmod 777") {
            features.world_writable = true;
        }
    }

    features.uses_multistage = features.stage_count > 1;
    if let Some(first) = stages.first() {
        features.base_image = first.base_image.clone();
        features.base_tag = first.base_tag.clone();
        features.uses_latest_tag = first.base_tag == "latest";
    }

    DockerfileAnalysis { features, stages }
}

fn record_stage(
    line: &str,
    features: &mut DockerfileFeatures,
    stages: &mut Vec<DockerStageMeta>,
    aliases: &mut HashSet<String>,
) {
    let args: Vec<&str> = line
        .split_whitespace()
        .skip(1)
        .filter(|t| !t.starts_with("--"))
        .collect();
    let Some(image) = args.first().copied() else {
        return;
    };
    let alias = match args.get(1..3) {
        Some(["as", name]) => Some(name.to_string()),
        _ => None,
    };

    if aliases.contains(image) {
        if let Some(alias) = alias {
            aliases.insert(alias);
        }
        return;
    }

    let stage_index = features.stage_count;
    features.stage_count += 1;
    if let Some(alias) = alias {
        aliases.insert(alias);
    }

    if image.starts_with('$') {
        return;
    }

    let (base_image, base_tag) = split_image_tag(image);
    stages.push(DockerStageMeta {
        stage_index,
        base_image,
        base_tag,
    });
}

/// Split `registry:5000/name:tag@digest` into image and tag. A missing tag means `latest`.
fn split_image_tag(image: &str) -> (String, String) {
    let (name, digest) = match image.split_once('@') {
        Some((name, digest)) => (name, Some(digest)),
        None => (image, None),
    };

    let slash = name.rfind('/').map_or(0, |i| i + 1);
    if let Some(colon) = name[slash..].rfind(':') {
        let split = slash + colon;
        return (name[..split].to_string(), name[split + 1..].to_string());
    }

    match digest {
        Some(d) => (name.to_string(), d.to_string()),
        None if name == "scratch" => (name.to_string(), String::new()),
        None => (name.to_string(), "latest".to_string()),
    }
}
