use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::cache::{cached, Cache, CacheError};
use crate::config::RulesConfig;
use crate::contract::{ApiError, GithubApi};
use crate::maintainers::{fetch_repo_maintainers, MaintainersError};
use crate::parallel::try_parallel_map;

pub const REPOSITORIES_CACHE_KEY: &str = "repositories";
pub const MAINTAINERS_CACHE_KEY: &str = "maintainers";

/// Branch name to its current protection, `None` when unprotected.
pub type BranchProtections = BTreeMap<String, Option<Value>>;

/// Every repository of the organization with its branches.
pub type Inventory = BTreeMap<String, BranchProtections>;

/// Repository name to its maintainers, `None` when it has no manifest.
pub type MaintainerMap = BTreeMap<String, Option<Vec<String>>>;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("listing repositories of {org}: {source}")]
    ListRepos {
        org: String,
        #[source]
        source: ApiError,
    },

    #[error("repo {repo}: {source}")]
    Repo {
        repo: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Maintainers(#[from] MaintainersError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Download configuration: which org, which manifest ref, how wide to fan out.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub org: String,
    pub manifest_ref: String,
    pub concurrency: usize,
}

impl From<&RulesConfig> for DownloadConfig {
    fn from(config: &RulesConfig) -> Self {
        Self {
            org: config.org.clone(),
            manifest_ref: config.manifest_ref.clone(),
            concurrency: config.concurrency,
        }
    }
}

/// Fetch the branches of one repository and the protection of the protected ones.
pub async fn fetch_repo_protection_info<A>(
    api: &A,
    org: &str,
    repo: &str,
) -> Result<BranchProtections, ApiError>
where
    A: GithubApi + ?Sized,
{
    let branches = api.list_branches(org, repo).await?;
    let mut protections = BranchProtections::new();
    for branch in branches {
        let protection = if branch.protected {
            Some(api.get_branch_protection(org, repo, &branch.name).await?)
        } else {
            None
        };
        protections.insert(branch.name, protection);
    }
    debug!(repo, branches = protections.len(), "Fetched branch protection info");
    Ok(protections)
}

/// Fetches datasets through a [`Cache`], so a warm cache costs no remote call.
pub struct Downloader<'a, A: ?Sized> {
    api: &'a A,
    cache: &'a dyn Cache,
    config: DownloadConfig,
}

impl<'a, A> Downloader<'a, A>
where
    A: GithubApi + ?Sized,
{
    pub fn new(api: &'a A, cache: &'a dyn Cache, config: DownloadConfig) -> Self {
        Self { api, cache, config }
    }

    /// The repository inventory, from cache unless `force`.
    pub async fn repositories(&self, force: bool) -> Result<Inventory, DownloadError> {
        cached(self.cache, REPOSITORIES_CACHE_KEY, force, || {
            self.fetch_repositories()
        })
        .await
    }

    /// The maintainer mapping for `repos`, from cache unless `force`.
    pub async fn maintainers(
        &self,
        repos: &[String],
        force: bool,
    ) -> Result<MaintainerMap, DownloadError> {
        cached(self.cache, MAINTAINERS_CACHE_KEY, force, || {
            self.fetch_maintainers(repos)
        })
        .await
    }

    async fn fetch_repositories(&self) -> Result<Inventory, DownloadError> {
        let org = self.config.org.as_str();
        info!(org, "Listing organization repositories");
        let names = self.api.list_org_repos(org).await.map_err(|source| {
            error!(org, error = %source, "Failed to list repositories");
            DownloadError::ListRepos {
                org: org.to_string(),
                source,
            }
        })?;
        info!(org, count = names.len(), "Fetching branches for repositories");

        let api = self.api;
        let infos = try_parallel_map(names, self.config.concurrency, |repo| async move {
            match fetch_repo_protection_info(api, org, &repo).await {
                Ok(info) => Ok((repo, info)),
                Err(source) => {
                    error!(repo = %repo, error = %source, "Failed to fetch branches");
                    Err(DownloadError::Repo { repo, source })
                }
            }
        })
        .await?;

        Ok(infos.into_iter().collect())
    }

    async fn fetch_maintainers(&self, repos: &[String]) -> Result<MaintainerMap, DownloadError> {
        let org = self.config.org.as_str();
        let reference = self.config.manifest_ref.as_str();
        info!(org, count = repos.len(), reference, "Fetching maintainers");

        let api = self.api;
        let maintainers = try_parallel_map(repos, self.config.concurrency, |repo| async move {
            let found = fetch_repo_maintainers(api, org, repo, reference).await?;
            Ok::<_, DownloadError>((repo.clone(), found))
        })
        .await?;

        Ok(maintainers.into_iter().collect())
    }
}
