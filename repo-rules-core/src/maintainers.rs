//! Maintainer extraction from in-repo manifests.
//!
//! `manifest.toml` is read first; when it does not exist the legacy
//! `manifest.json` is tried. A repository with neither has no maintainers,
//! which is a normal, cacheable outcome. Every other failure propagates.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::contract::{ApiError, GithubApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// `manifest.toml` with a `maintainers` array of handles.
    Toml,
    /// `manifest.json` with a `maintainer` object or array of objects.
    LegacyJson,
}

impl ManifestFormat {
    /// Lookup order.
    pub const ALL: [ManifestFormat; 2] = [ManifestFormat::Toml, ManifestFormat::LegacyJson];

    pub fn path(self) -> &'static str {
        match self {
            ManifestFormat::Toml => "manifest.toml",
            ManifestFormat::LegacyJson => "manifest.json",
        }
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid manifest.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid manifest.json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MaintainersError {
    #[error("repo {repo}: {source}")]
    Api {
        repo: String,
        #[source]
        source: ApiError,
    },

    #[error("repo {repo}: {source}")]
    Manifest {
        repo: String,
        #[source]
        source: ManifestError,
    },
}

#[derive(Deserialize)]
struct TomlManifest {
    #[serde(default)]
    maintainers: Vec<String>,
}

/// Extract the maintainer handles from a manifest's text.
pub fn extract_maintainers(
    content: &str,
    format: ManifestFormat,
) -> Result<Vec<String>, ManifestError> {
    match format {
        ManifestFormat::Toml => {
            let manifest: TomlManifest = toml::from_str(content)?;
            Ok(manifest.maintainers)
        }
        ManifestFormat::LegacyJson => {
            let manifest: Value = serde_json::from_str(content)?;
            Ok(legacy_maintainers(&manifest))
        }
    }
}

// Legacy entries carry free-form names; only handle-like ones (no whitespace) are kept.
fn legacy_maintainers(manifest: &Value) -> Vec<String> {
    let entries: Vec<&Value> = match manifest.get("maintainer") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
        None => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .filter(|name| !name.chars().any(char::is_whitespace))
        .map(str::to_string)
        .collect()
}

/// Fetch and extract the maintainers of one repository.
///
/// Returns `Ok(None)` when neither manifest exists at `reference`.
pub async fn fetch_repo_maintainers<A>(
    api: &A,
    org: &str,
    repo: &str,
    reference: &str,
) -> Result<Option<Vec<String>>, MaintainersError>
where
    A: GithubApi + ?Sized,
{
    for format in ManifestFormat::ALL {
        let path = format.path();
        match api.get_file_content(org, repo, path, reference).await {
            Ok(content) => {
                let maintainers = extract_maintainers(&content, format).map_err(|source| {
                    error!(repo, path, error = %source, "Failed to parse manifest");
                    MaintainersError::Manifest {
                        repo: repo.to_string(),
                        source,
                    }
                })?;
                info!(repo, path, ?maintainers, "Read maintainers");
                return Ok(Some(maintainers));
            }
            Err(e) if e.is_not_found() => {
                debug!(repo, path, reference, "Manifest not found");
            }
            Err(source) => {
                error!(repo, path, error = %source, "Failed to fetch manifest");
                return Err(MaintainersError::Api {
                    repo: repo.to_string(),
                    source,
                });
            }
        }
    }
    info!(repo, "No manifest found, repo has no maintainers");
    Ok(None)
}
