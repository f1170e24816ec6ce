//! High-level pipeline: download → match → template → apply.
//!
//! This module provides the top-level orchestration of a repo-rules run:
//!   - Loads the repository inventory and maintainer mapping through the cache
//!   - Matches every repository against the ordered rule groups (first match wins)
//!   - Merges and instantiates the rulesets of each matched repository's branches
//!   - Pushes branch protection, commit-signature protection and the default branch
//!   - Aggregates and returns a report of what was applied
//!
//! # Major Types
//! - [`RepoPlan`]: everything that will be pushed to one repository
//! - [`SynchroniseReport`]: output report for the CLI and tests
//!
//! # Error Handling
//! Planning fails before any remote write. During apply, the first failing
//! request aborts the run; requests already in flight for other repositories
//! are dropped.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Building blocks: [`plan`], [`apply_plan`]

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::config::RulesConfig;
use crate::contract::{ApiError, GithubApi};
use crate::download::{DownloadConfig, DownloadError, Downloader, Inventory, MaintainerMap};
use crate::matcher::{compile_rule_groups, match_repos_rules, MatchError};
use crate::parallel::try_parallel_map;
use crate::ruleset::{build_branch_rules, BranchRules, RulesetError};

#[derive(Debug, Error)]
pub enum SynchroniseError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("repo {repo} branch {branch}: {source}")]
    Ruleset {
        repo: String,
        branch: String,
        #[source]
        source: RulesetError,
    },

    #[error("repo {repo}: {action} failed: {source}")]
    Apply {
        repo: String,
        action: String,
        #[source]
        source: ApiError,
    },
}

/// Everything that will be pushed to one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoPlan {
    pub repo: String,
    /// Index of the winning rule group in the config.
    pub group: usize,
    pub branches: BTreeMap<String, BranchRules>,
    /// Branches named by the rule group that the repository does not have.
    pub missing_branches: Vec<String>,
    pub default_branch: Option<String>,
    /// Default branch named by the rule group that the repository does not have.
    pub missing_default_branch: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SynchroniseReport {
    pub dry_run: bool,
    pub repos: Vec<RepoReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoReport {
    pub repo: String,
    pub group: usize,
    pub protected_branches: Vec<String>,
    pub skipped_branches: Vec<String>,
    pub default_branch: Option<String>,
    pub skipped_default_branch: Option<String>,
}

impl From<&RepoPlan> for RepoReport {
    fn from(plan: &RepoPlan) -> Self {
        Self {
            repo: plan.repo.clone(),
            group: plan.group,
            protected_branches: plan.branches.keys().cloned().collect(),
            skipped_branches: plan.missing_branches.clone(),
            default_branch: plan.default_branch.clone(),
            skipped_default_branch: plan.missing_default_branch.clone(),
        }
    }
}

/// Decide what every matched repository gets, without touching the network.
pub fn plan(
    config: &RulesConfig,
    inventory: &Inventory,
    maintainers: &MaintainerMap,
) -> Result<Vec<RepoPlan>, SynchroniseError> {
    let groups = compile_rule_groups(&config.repositories)?;
    let matched = match_repos_rules(&groups, inventory.keys());

    let mut plans = Vec::with_capacity(matched.len());
    for (repo, rule) in matched {
        let repo_maintainers = match maintainers.get(&repo) {
            Some(found) => found.as_deref(),
            None => {
                warn!(repo = %repo, "Repo missing from maintainers cache, treating as no maintainers");
                None
            }
        };
        let existing = inventory.get(&repo);

        let mut branches = BTreeMap::new();
        let mut missing_branches = Vec::new();
        for (branch, reference) in &rule.group.branches {
            if existing.is_some_and(|b| !b.contains_key(branch)) {
                warn!(repo = %repo, branch = %branch, "Branch does not exist, skipping");
                missing_branches.push(branch.clone());
                continue;
            }
            let rules = build_branch_rules(
                &config.rulesets,
                reference.names(),
                repo_maintainers,
                &config.super_maintainers,
            )
            .map_err(|source| SynchroniseError::Ruleset {
                repo: repo.clone(),
                branch: branch.clone(),
                source,
            })?;
            branches.insert(branch.clone(), rules);
        }

        let (default_branch, missing_default_branch) = match &rule.group.default {
            Some(default) if existing.is_some_and(|b| !b.contains_key(default)) => {
                warn!(repo = %repo, branch = %default, "Default branch does not exist, skipping");
                (None, Some(default.clone()))
            }
            default => (default.clone(), None),
        };

        plans.push(RepoPlan {
            repo,
            group: rule.index,
            branches,
            missing_branches,
            default_branch,
            missing_default_branch,
        });
    }
    info!(repos = plans.len(), "Planned branch rules");
    Ok(plans)
}

fn apply_error(repo: &str, action: String, source: ApiError) -> SynchroniseError {
    error!(repo, action = %action, error = %source, "Remote update failed");
    SynchroniseError::Apply {
        repo: repo.to_string(),
        action,
        source,
    }
}

/// Push one repository's plan: protection per branch, then signatures, then
/// the default branch.
pub async fn apply_repo<A>(api: &A, org: &str, plan: &RepoPlan) -> Result<RepoReport, SynchroniseError>
where
    A: GithubApi + ?Sized,
{
    let repo = plan.repo.as_str();
    for (branch, rules) in &plan.branches {
        info!(repo, branch = %branch, "Updating branch protection");
        api.update_branch_protection(org, repo, branch, &rules.protection)
            .await
            .map_err(|e| apply_error(repo, format!("update protection of {branch}"), e))?;

        match rules.required_signatures {
            Some(true) => {
                info!(repo, branch = %branch, "Requiring signed commits");
                api.create_commit_signature_protection(org, repo, branch)
                    .await
                    .map_err(|e| apply_error(repo, format!("require signatures on {branch}"), e))?;
            }
            Some(false) => {
                info!(repo, branch = %branch, "Dropping signed commit requirement");
                match api.delete_commit_signature_protection(org, repo, branch).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        info!(repo, branch = %branch, "Signed commits were not required");
                    }
                    Err(e) => {
                        return Err(apply_error(
                            repo,
                            format!("drop signatures on {branch}"),
                            e,
                        ))
                    }
                }
            }
            None => {}
        }
    }

    if let Some(default) = &plan.default_branch {
        info!(repo, branch = %default, "Setting default branch");
        api.set_default_branch(org, repo, default)
            .await
            .map_err(|e| apply_error(repo, format!("set default branch {default}"), e))?;
    }

    Ok(RepoReport::from(plan))
}

/// Apply every plan with at most `concurrency` repositories in flight.
pub async fn apply_plan<A>(
    api: &A,
    org: &str,
    plans: &[RepoPlan],
    concurrency: usize,
) -> Result<SynchroniseReport, SynchroniseError>
where
    A: GithubApi + ?Sized,
{
    info!(org, repos = plans.len(), concurrency, "Applying branch rules");
    let repos = try_parallel_map(plans, concurrency, |plan| apply_repo(api, org, plan)).await?;
    info!(org, repos = repos.len(), "Applied branch rules");
    Ok(SynchroniseReport {
        dry_run: false,
        repos,
    })
}

/// Run the whole pipeline for `config`.
///
/// With `dry_run` nothing is written remotely; the report lists what would be.
pub async fn synchronise<A>(
    api: &A,
    cache: &dyn Cache,
    config: &RulesConfig,
    dry_run: bool,
) -> Result<(Vec<RepoPlan>, SynchroniseReport), SynchroniseError>
where
    A: GithubApi + ?Sized,
{
    info!(org = %config.org, dry_run, "[SYNC] Starting synchronisation");
    let downloader = Downloader::new(api, cache, DownloadConfig::from(config));

    let inventory = downloader.repositories(false).await?;
    let names: Vec<String> = inventory.keys().cloned().collect();
    let maintainers = downloader.maintainers(&names, false).await?;

    let plans = plan(config, &inventory, &maintainers)?;
    let report = if dry_run {
        info!(repos = plans.len(), "[SYNC] Dry run, skipping remote updates");
        SynchroniseReport {
            dry_run: true,
            repos: plans.iter().map(RepoReport::from).collect(),
        }
    } else {
        apply_plan(api, &config.org, &plans, config.concurrency).await?
    };
    Ok((plans, report))
}
