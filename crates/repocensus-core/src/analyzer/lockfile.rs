use crate::models::LockfilePairing;
use std::collections::{BTreeSet, HashSet};

/// Manifest and lockfile filenames for one package ecosystem.
#[derive(Debug, Clone, Copy)]
pub struct EcosystemConfig {
    pub name: &'static str,
    pub manifests: &'static [&'static str],
    /// Tried in order; the first one present next to the manifest wins.
    pub lockfiles: &'static [&'static str],
}

pub const ECOSYSTEMS: &[EcosystemConfig] = &[
    EcosystemConfig {
        name: "javascript",
        manifests: &["package.json"],
        lockfiles: &[
            "package-lock.json",
            "npm-shrinkwrap.json",
            "yarn.lock",
            "pnpm-lock.yaml",
            "bun.lockb",
            "bun.lock",
            "deno.lock",
        ],
    },
    EcosystemConfig {
        name: "deno",
        manifests: &["deno.json", "deno.jsonc"],
        lockfiles: &["deno.lock"],
    },
    EcosystemConfig {
        name: "python",
        manifests: &["Pipfile", "pyproject.toml", "requirements.txt", "setup.py"],
        lockfiles: &["Pipfile.lock", "poetry.lock", "pdm.lock", "uv.lock"],
    },
    EcosystemConfig {
        name: "ruby",
        manifests: &["Gemfile"],
        lockfiles: &["Gemfile.lock"],
    },
    EcosystemConfig {
        name: "php",
        manifests: &["composer.json"],
        lockfiles: &["composer.lock"],
    },
    EcosystemConfig {
        name: "rust",
        manifests: &["Cargo.toml"],
        lockfiles: &["Cargo.lock"],
    },
    EcosystemConfig {
        name: "go",
        manifests: &["go.mod"],
        lockfiles: &["go.sum"],
    },
    EcosystemConfig {
        name: "java",
        manifests: &[
            "pom.xml",
            "build.gradle",
            "build.gradle.kts",
            "settings.gradle",
            "settings.gradle.kts",
        ],
        lockfiles: &["gradle.lockfile"],
    },
    EcosystemConfig {
        name: "dotnet",
        manifests: &["packages.config"],
        lockfiles: &["packages.lock.json"],
    },
    EcosystemConfig {
        name: "swift",
        manifests: &["Package.swift"],
        lockfiles: &["Package.resolved"],
    },
    EcosystemConfig {
        name: "dart",
        manifests: &["pubspec.yaml"],
        lockfiles: &["pubspec.lock"],
    },
    EcosystemConfig {
        name: "elixir",
        manifests: &["mix.exs"],
        lockfiles: &["mix.lock"],
    },
    EcosystemConfig {
        name: "scala",
        manifests: &["build.sbt"],
        lockfiles: &["coursier.lock"],
    },
    EcosystemConfig {
        name: "clojure",
        manifests: &["project.clj", "deps.edn"],
        lockfiles: &[],
    },
    EcosystemConfig {
        name: "r",
        manifests: &["DESCRIPTION"],
        lockfiles: &["renv.lock"],
    },
    EcosystemConfig {
        name: "perl",
        manifests: &["cpanfile"],
        lockfiles: &["cpanfile.snapshot"],
    },
    EcosystemConfig {
        name: "haskell",
        manifests: &["stack.yaml", "package.yaml", "cabal.project"],
        lockfiles: &["stack.yaml.lock", "cabal.project.freeze"],
    },
    EcosystemConfig {
        name: "cpp",
        manifests: &["conanfile.txt", "conanfile.py", "vcpkg.json"],
        lockfiles: &["conan.lock", "vcpkg-lock.json"],
    },
    EcosystemConfig {
        name: "nim",
        manifests: &[],
        lockfiles: &["nimble.lock"],
    },
    EcosystemConfig {
        name: "crystal",
        manifests: &["shard.yml"],
        lockfiles: &["shard.lock"],
    },
];

/// Directories holding vendored or installed dependencies rather than project sources.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "bower_components",
    "vendor",
    "site-packages",
    ".venv",
    "venv",
    "__pypackages__",
    "vcpkg_installed",
    ".dart_tool",
    ".bundle",
];

/// True when any directory segment of `path` is an ignored directory.
/// `myvendor/x` is not ignored; `lib/vendor/x` is.
pub fn is_ignored_path(path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    segments.iter().any(|s| IGNORED_DIRS.contains(s))
}

/// Every manifest and lockfile filename across all ecosystems.
pub fn dependency_file_names() -> BTreeSet<&'static str> {
    ECOSYSTEMS
        .iter()
        .flat_map(|e| e.manifests.iter().chain(e.lockfiles.iter()))
        .copied()
        .collect()
}

pub fn is_dependency_file(path: &str) -> bool {
    let name = base_name(path);
    ECOSYSTEMS
        .iter()
        .any(|e| e.manifests.contains(&name) || e.lockfiles.contains(&name))
}

pub fn is_manifest_file(path: &str) -> bool {
    let name = base_name(path);
    ECOSYSTEMS.iter().any(|e| e.manifests.contains(&name))
}

/// Pair every manifest in `paths` with the first configured lockfile found in its directory.
pub fn detect_lockfile_pairings<S: AsRef<str>>(paths: &[S]) -> Vec<LockfilePairing> {
    let known: HashSet<&str> = paths.iter().map(AsRef::<str>::as_ref).collect();
    let mut sorted: Vec<&str> = known.iter().copied().collect();
    sorted.sort_unstable();

    let mut pairings = Vec::new();
    for ecosystem in ECOSYSTEMS {
        for path in &sorted {
            if is_ignored_path(path) || !ecosystem.manifests.contains(&base_name(path)) {
                continue;
            }
            let dir = dir_name(path);
            let lockfile = ecosystem
                .lockfiles
                .iter()
                .map(|lock| join(dir, lock))
                .find(|candidate| known.contains(candidate.as_str()))
                .unwrap_or_default();
            pairings.push(LockfilePairing {
                ecosystem: ecosystem.name.to_string(),
                manifest_path: path.to_string(),
                lockfile_path: lockfile,
            });
        }
    }
    pairings
}

/// False when there are no pairings or any manifest lacks a lockfile.
pub fn has_complete_lockfiles(pairings: &[LockfilePairing]) -> bool {
    !pairings.is_empty() && pairings.iter().all(|p| !p.lockfile_path.trim().is_empty())
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn dir_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default()
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_manifest_with_lockfile() {
        let pairings = detect_lockfile_pairings(&["package.json", "package-lock.json"]);
        assert_eq!(pairings.len(), 1);
        assert_eq!(pairings[0].manifest_path, "package.json");
        assert_eq!(pairings[0].lockfile_path, "package-lock.json");
        assert_eq!(pairings[0].ecosystem, "javascript");
        assert!(has_complete_lockfiles(&pairings));
    }

    #[test]
    fn test_missing_lockfile() {
        let pairings = detect_lockfile_pairings(&["frontend/package.json"]);
        assert_eq!(pairings.len(), 1);
        assert_eq!(pairings[0].manifest_path, "frontend/package.json");
        assert_eq!(pairings[0].lockfile_path, "");
        assert!(!has_complete_lockfiles(&pairings));
    }

    #[test]
    fn test_lockfile_must_share_directory() {
        let pairings = detect_lockfile_pairings(&["api/go.mod", "go.sum"]);
        assert_eq!(pairings[0].lockfile_path, "");
    }

    #[test]
    fn test_first_configured_lockfile_wins() {
        let pairings = detect_lockfile_pairings(&["web/package.json", "web/yarn.lock", "web/package-lock.json"]);
        assert_eq!(pairings[0].lockfile_path, "web/package-lock.json");
    }

    #[test]
    fn test_multiple_ecosystems() {
        let paths = vec![
            "services/api/go.mod".to_string(),
            "services/api/go.sum".to_string(),
            "tools/pyproject.toml".to_string(),
            "tools/poetry.lock".to_string(),
            "Cargo.toml".to_string(),
        ];
        let pairings = detect_lockfile_pairings(&paths);
        assert_eq!(pairings.len(), 3);
        assert!(!has_complete_lockfiles(&pairings));
        let py = pairings.iter().find(|p| p.ecosystem == "python").unwrap();
        assert_eq!(py.lockfile_path, "tools/poetry.lock");
    }

    #[test]
    fn test_vendored_manifests_excluded() {
        let pairings = detect_lockfile_pairings(&[
            "node_modules/left-pad/package.json",
            "vendor/github.com/pkg/errors/go.mod",
            "myvendor/go.mod",
        ]);
        assert_eq!(pairings.len(), 1);
        assert_eq!(pairings[0].manifest_path, "myvendor/go.mod");
    }

    #[test]
    fn test_has_complete_lockfiles_edges() {
        assert!(!has_complete_lockfiles(&[]));
        let blank = LockfilePairing {
            ecosystem: "go".to_string(),
            manifest_path: "go.mod".to_string(),
            lockfile_path: "   ".to_string(),
        };
        assert!(!has_complete_lockfiles(&[blank]));
    }

    #[test]
    fn test_is_ignored_path() {
        for path in [
            "node_modules/pkg/package.json",
            "app/node_modules/pkg/package.json",
            "vendor/autoload.php",
            "lib/vendor/pkg/composer.json",
            "site-packages/x/setup.py",
            ".venv/lib/pyproject.toml",
            "vcpkg_installed/x/vcpkg.json",
            ".dart_tool/pubspec.yaml",
        ] {
            assert!(is_ignored_path(path), "{}", path);
        }
        for path in [
            "myvendor/go.mod",
            "node_modules_extra/package.json",
            "package.json",
            "services/api/go.mod",
            "vendor",
        ] {
            assert!(!is_ignored_path(path), "{}", path);
        }
    }

    #[test]
    fn test_dependency_file_names() {
        let names = dependency_file_names();
        assert!(names.contains("package.json"));
        assert!(names.contains("nimble.lock"));
        assert!(names.contains("go.sum"));
        assert!(is_dependency_file("a/b/Cargo.lock"));
        assert!(is_manifest_file("a/b/Cargo.toml"));
        assert!(!is_manifest_file("a/b/Cargo.lock"));
        assert!(!is_dependency_file("README.md"));
    }
}
