//! # contract: the GitHub API surface consumed by repo-rules
//!
//! This module defines a single trait ([`GithubApi`]) and its supporting types
//! for everything repo-rules reads from or writes to GitHub: repository and
//! branch listings, branch protection, file contents at a ref, the default
//! branch and commit-signature protection.
//!
//! ## Interface & Extensibility
//! - The real client lives in the `repo-rules` crate (`github::GithubClient`).
//! - All methods are async and return [`ApiError`].
//! - [`ApiError::NotFound`] is the only variant callers may recover from;
//!   everything else is fatal for the operation that hit it.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so tests can assert exactly which
//!   remote calls happen (or that none happen, for warm caches).

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error returned by every [`GithubApi`] call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("GitHub returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The response arrived but could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// A branch as returned by the branch listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub protected: bool,
}

/// Trait for the GitHub endpoints repo-rules depends on.
///
/// The trait is `Send` + `Sync` so one client can be shared by every worker of
/// a concurrent fan-out.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// List the names of all repositories of an organization (all pages).
    async fn list_org_repos(&self, org: &str) -> Result<Vec<String>, ApiError>;

    /// List all branches of a repository (all pages).
    async fn list_branches(&self, org: &str, repo: &str) -> Result<Vec<Branch>, ApiError>;

    /// Fetch the current protection of a protected branch.
    async fn get_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Value, ApiError>;

    /// Replace the protection of a branch with `protection`.
    async fn update_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        protection: &Value,
    ) -> Result<(), ApiError>;

    /// Change the default branch of a repository.
    async fn set_default_branch(&self, org: &str, repo: &str, branch: &str)
        -> Result<(), ApiError>;

    /// Read a file at `path` on `reference` and return its decoded text.
    async fn get_file_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<String, ApiError>;

    /// Require signed commits on a protected branch.
    async fn create_commit_signature_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<(), ApiError>;

    /// Stop requiring signed commits on a protected branch.
    async fn delete_commit_signature_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<(), ApiError>;
}
