#![doc = "GitHub REST client: implements the core GithubApi trait over reqwest."]
//
//! # GitHub Integration (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the
//! [`GithubApi`] abstraction in `repo-rules-core::contract`. It wires the
//! trait to the real GitHub REST API and provides the [`GithubClient`] used by
//! the CLI.
//!
//! - Construct [`GithubClient`] with the API base URL and a token.
//! - Every request and response status is logged at debug level, so `--debug`
//!   traces the whole conversation. The token is never logged.
//! - HTTP 404 maps to [`ApiError::NotFound`]; any other non-success status
//!   maps to [`ApiError::Status`] with the response body.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

pub use repo_rules_core::contract::{ApiError, Branch, GithubApi};

const PER_PAGE: usize = 100;
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Deserialize)]
struct RepoSummary {
    name: String,
}

pub struct GithubClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid GitHub API URL {base_url:?}: {e}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid GitHub API URL {base_url}: cannot hold a path");
        }
        let http = reqwest::Client::builder().build()?;
        tracing::info!(base_url = %base_url, "Initialized GitHub client");
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.request_accepting(method, url, JSON_MEDIA_TYPE)
    }

    fn request_accepting(&self, method: Method, url: &Url, accept: &str) -> RequestBuilder {
        tracing::debug!(method = %method, url = %url, accept, "GitHub request");
        self.http
            .request(method, url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .header(USER_AGENT, concat!("repo-rules/", env!("CARGO_PKG_VERSION")))
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        tracing::debug!(url = %url, status = %status, "GitHub response");

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(url = %url, status = %status, "GitHub API returned error. Response body: {body}");
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Follow `page=` until a short page comes back.
    async fn get_all_pages<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, ApiError> {
        let url = self.url(segments);
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let request = self
                .request(Method::GET, &url)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let response = self.send(request, &url).await?;
            let batch: Vec<T> = Self::decode(response, &url).await?;
            let size = batch.len();
            items.extend(batch);
            if size < PER_PAGE {
                break;
            }
            page += 1;
        }
        tracing::debug!(url = %url, count = items.len(), pages = page, "Fetched all pages");
        Ok(items)
    }

    async fn send_without_body(&self, method: Method, segments: &[&str]) -> Result<(), ApiError> {
        let url = self.url(segments);
        let request = self.request(method, &url);
        self.send(request, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn list_org_repos(&self, org: &str) -> Result<Vec<String>, ApiError> {
        tracing::info!(org, "Listing organization repositories");
        let repos: Vec<RepoSummary> = self.get_all_pages(&["orgs", org, "repos"]).await?;
        Ok(repos.into_iter().map(|r| r.name).collect())
    }

    async fn list_branches(&self, org: &str, repo: &str) -> Result<Vec<Branch>, ApiError> {
        self.get_all_pages(&["repos", org, repo, "branches"]).await
    }

    async fn get_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Value, ApiError> {
        let url = self.url(&["repos", org, repo, "branches", branch, "protection"]);
        let response = self.send(self.request(Method::GET, &url), &url).await?;
        Self::decode(response, &url).await
    }

    async fn update_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        protection: &Value,
    ) -> Result<(), ApiError> {
        let url = self.url(&["repos", org, repo, "branches", branch, "protection"]);
        tracing::debug!(repo, branch, body = %protection, "Branch protection payload");
        let request = self.request(Method::PUT, &url).json(protection);
        self.send(request, &url).await?;
        tracing::info!(repo, branch, "Updated branch protection");
        Ok(())
    }

    async fn set_default_branch(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(&["repos", org, repo]);
        let request = self
            .request(Method::PATCH, &url)
            .json(&json!({ "default_branch": branch }));
        self.send(request, &url).await?;
        tracing::info!(repo, branch, "Set default branch");
        Ok(())
    }

    async fn get_file_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<String, ApiError> {
        let mut segments = vec!["repos", org, repo, "contents"];
        segments.extend(path.split('/'));
        let url = self.url(&segments);
        let request = self
            .request_accepting(Method::GET, &url, RAW_MEDIA_TYPE)
            .query(&[("ref", reference)]);
        let response = self.send(request, &url).await?;
        response.text().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn create_commit_signature_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<(), ApiError> {
        self.send_without_body(
            Method::POST,
            &["repos", org, repo, "branches", branch, "protection", "required_signatures"],
        )
        .await
    }

    async fn delete_commit_signature_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> Result<(), ApiError> {
        self.send_without_body(
            Method::DELETE,
            &["repos", org, repo, "branches", branch, "protection", "required_signatures"],
        )
        .await
    }
}
