use serde::{Deserialize, Serialize};

/// GitHub dependency-graph export: an SPDX document wrapped in `{"sbom": ...}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubSbom {
    #[serde(default)]
    pub sbom: SpdxDocument,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdxDocument {
    #[serde(default)]
    pub spdx_version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub packages: Vec<SpdxPackage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdxPackage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version_info: Option<String>,
    #[serde(default)]
    pub license_concluded: Option<String>,
    #[serde(default)]
    pub external_refs: Vec<ExternalRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRef {
    #[serde(default)]
    pub reference_type: String,
    #[serde(default)]
    pub reference_locator: String,
}

/// Flattened package row extracted from an SBOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomPackage {
    pub name: String,
    pub version: String,
    pub license: String,
    pub purl: Option<String>,
}

impl From<&SpdxPackage> for SbomPackage {
    fn from(pkg: &SpdxPackage) -> Self {
        Self {
            name: pkg.name.clone(),
            version: pkg.version_info.clone().unwrap_or_default(),
            license: pkg.license_concluded.clone().unwrap_or_default(),
            purl: pkg
                .external_refs
                .iter()
                .find(|r| r.reference_type == "purl")
                .map(|r| r.reference_locator.clone()),
        }
    }
}

/// Extract the package list from a raw SBOM payload. Unknown shapes yield nothing.
pub fn extract_packages(raw: &serde_json::Value) -> Vec<SbomPackage> {
    match GitHubSbom::deserialize(raw) {
        Ok(doc) => doc
            .sbom
            .packages
            .iter()
            .filter(|p| !p.name.is_empty())
            .map(SbomPackage::from)
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "unrecognized SBOM payload");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_packages() {
        let raw = json!({
            "sbom": {
                "spdxVersion": "SPDX-2.3",
                "name": "com.github.acme/api",
                "packages": [
                    {
                        "name": "npm:lodash",
                        "versionInfo": "4.17.21",
                        "licenseConcluded": "MIT",
                        "externalRefs": [
                            {"referenceCategory": "SECURITY", "referenceType": "cpe23Type", "referenceLocator": "cpe:2.3:*"},
                            {"referenceCategory": "PACKAGE-MANAGER", "referenceType": "purl", "referenceLocator": "pkg:npm/lodash@4.17.21"}
                        ]
                    },
                    {"name": "com.github.acme/api", "versionInfo": "main"},
                    {"versionInfo": "nameless"}
                ]
            }
        });
        let packages = extract_packages(&raw);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "npm:lodash");
        assert_eq!(packages[0].license, "MIT");
        assert_eq!(packages[0].purl.as_deref(), Some("pkg:npm/lodash@4.17.21"));
        assert_eq!(packages[1].purl, None);
        assert_eq!(packages[1].license, "");
    }

    #[test]
    fn test_unexpected_payload() {
        assert!(extract_packages(&json!({"sbom": "nope"})).is_empty());
        assert!(extract_packages(&json!({})).is_empty());
    }
}
