use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_MANIFEST_REF: &str = "master";
pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// The rule file: which repositories get which rulesets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RulesConfig {
    pub org: String,
    /// Ordered; the first matching group wins.
    pub repositories: Vec<RuleGroup>,
    pub rulesets: BTreeMap<String, Value>,
    pub super_maintainers: Vec<String>,
    /// Ref the maintainer manifests are read from.
    #[serde(default = "default_manifest_ref")]
    pub manifest_ref: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_manifest_ref() -> String {
    DEFAULT_MANIFEST_REF.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Branch name to the ruleset(s) applied to it.
    #[serde(default)]
    pub branches: BTreeMap<String, RulesetRef>,
    /// Default branch to set on matched repositories.
    #[serde(default)]
    pub default: Option<String>,
}

/// A branch names either one ruleset or an ordered list merged left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RulesetRef {
    One(String),
    Many(Vec<String>),
}

impl RulesetRef {
    pub fn names(&self) -> &[String] {
        match self {
            RulesetRef::One(name) => std::slice::from_ref(name),
            RulesetRef::Many(names) => names,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("repositories[{group}] branch {branch} refers to unknown ruleset {ruleset}")]
    UnknownRuleset {
        group: usize,
        branch: String,
        ruleset: String,
    },

    #[error("repositories[{group}] branch {branch} has an empty ruleset list")]
    EmptyRulesetList { group: usize, branch: String },

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

impl RulesConfig {
    /// Check cross references that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        for (index, group) in self.repositories.iter().enumerate() {
            for (branch, reference) in &group.branches {
                let names = reference.names();
                if names.is_empty() {
                    return Err(ConfigError::EmptyRulesetList {
                        group: index,
                        branch: branch.clone(),
                    });
                }
                if let Some(missing) = names.iter().find(|n| !self.rulesets.contains_key(*n)) {
                    return Err(ConfigError::UnknownRuleset {
                        group: index,
                        branch: branch.clone(),
                        ruleset: missing.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            org = %self.org,
            groups = self.repositories.len(),
            rulesets = self.rulesets.len(),
            super_maintainers = self.super_maintainers.len(),
            manifest_ref = %self.manifest_ref,
            concurrency = self.concurrency,
            "Loaded rules config"
        );
        debug!(?self, "Rules config loaded (full debug)");
    }
}
