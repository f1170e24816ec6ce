/// # repo-rules CLI Interface (Module)
///
/// This module implements the CLI for repo-rules: command parsing, wiring the
/// GitHub client and the JSON file cache, and user-visible output.
///
/// All matching, templating and pipeline logic lives in the `repo-rules-core` crate.
/// This module is strictly CLI glue.
///
/// ## Commands
/// - `download_repositories [-f]`: refresh the cached repository/branch inventory
/// - `download_maintainers [-f]`: refresh the cached maintainer mapping
/// - `apply [--dry-run]`: match, template and push branch rules (the default)
///
/// ## How To Use
/// - For command-line users: use the installed `repo-rules` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`], or
///   [`execute`] with any [`GithubApi`] implementation.
use crate::github::GithubClient;
use crate::load_config::{load_config, load_token};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repo_rules_core::cache::{Cache, JsonFileCache};
use repo_rules_core::config::RulesConfig;
use repo_rules_core::contract::GithubApi;
use repo_rules_core::download::{DownloadConfig, Downloader};
use repo_rules_core::synchronise::synchronise;
use std::path::PathBuf;

/// CLI for repo-rules: apply branch protection rules across an organization.
#[derive(Parser, Debug)]
#[clap(
    name = "repo-rules",
    version,
    about = "Configure branch protection and maintainer rules across a GitHub organization"
)]
pub struct Cli {
    /// Enable debug logging, including every GitHub request
    #[clap(long, global = true)]
    pub debug: bool,

    /// Path to the YAML rule file
    #[clap(long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the YAML secrets file holding the API token
    #[clap(long, global = true, default_value = "secrets.yaml")]
    pub secrets: PathBuf,

    /// Directory holding the JSON cache files
    #[clap(long, global = true, default_value = ".")]
    pub cache_dir: PathBuf,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch the organization's repositories and branches into the cache
    #[clap(name = "download_repositories", alias = "download-repositories")]
    DownloadRepositories {
        /// Drop the cached inventory and fetch it again
        #[clap(short, long)]
        force: bool,
    },

    /// Fetch every repository's maintainers into the cache
    #[clap(name = "download_maintainers", alias = "download-maintainers")]
    DownloadMaintainers {
        /// Drop the cached maintainers and fetch them again
        #[clap(short, long)]
        force: bool,
    },

    /// Match repositories to rule groups and push their branch rules
    Apply {
        /// Print what would be pushed without changing anything
        #[clap(long)]
        dry_run: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Apply { dry_run: false }
    }
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!(debug = cli.debug, "repo-rules starting");

    let config = load_config(&cli.config)?;
    let token = load_token(&cli.secrets)?;
    let client = GithubClient::new(&config.api_url, token)?;
    let cache = JsonFileCache::new(&cli.cache_dir);

    execute(cli.command.unwrap_or_default(), &client, &cache, &config).await
}

/// Run one command against an arbitrary API implementation and cache.
pub async fn execute<A>(
    command: Commands,
    api: &A,
    cache: &dyn Cache,
    config: &RulesConfig,
) -> Result<()>
where
    A: GithubApi + ?Sized,
{
    let downloader = Downloader::new(api, cache, DownloadConfig::from(config));
    match command {
        Commands::DownloadRepositories { force } => {
            tracing::info!(command = "download_repositories", force, "Starting download");
            let inventory = downloader
                .repositories(force)
                .await
                .context("Downloading repositories failed")?;
            println!("Cached {} repositories of {}", inventory.len(), config.org);
        }
        Commands::DownloadMaintainers { force } => {
            tracing::info!(command = "download_maintainers", force, "Starting download");
            let inventory = downloader
                .repositories(false)
                .await
                .context("Downloading repositories failed")?;
            let names: Vec<String> = inventory.keys().cloned().collect();
            let maintainers = downloader
                .maintainers(&names, force)
                .await
                .context("Downloading maintainers failed")?;
            let with_manifest = maintainers.values().filter(|m| m.is_some()).count();
            println!(
                "Cached maintainers of {} repositories ({} with a manifest)",
                maintainers.len(),
                with_manifest
            );
        }
        Commands::Apply { dry_run } => {
            tracing::info!(command = "apply", dry_run, "Starting synchronisation");
            let (plans, report) = match synchronise(api, cache, config, dry_run).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(command = "apply", error = %e, "Synchronisation failed");
                    return Err(anyhow::Error::new(e).context("Synchronisation failed"));
                }
            };
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            }
            for repo in &report.repos {
                println!(
                    "{}: group {} protected [{}]{}",
                    repo.repo,
                    repo.group,
                    repo.protected_branches.join(", "),
                    repo.default_branch
                        .as_deref()
                        .map(|b| format!(", default branch {b}"))
                        .unwrap_or_default()
                );
            }
            println!(
                "Synchronise complete: {} repositories{}",
                report.repos.len(),
                if report.dry_run { " (dry run)" } else { "" }
            );
            tracing::info!(command = "apply", repos = report.repos.len(), "Synchronisation complete");
        }
    }
    Ok(())
}
