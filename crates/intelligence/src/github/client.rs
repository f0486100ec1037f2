//! REST implementation of [`GitHubApi`].

use super::{
    CandidateRepository, GitHubApi, GitHubUser, PublicEvent, RepoListKind, SearchQuery,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const GITHUB_API_BASE: &str = "https://api.github.com";
const CLIENT_USER_AGENT: &str = concat!("repopicks-intelligence/", env!("CARGO_PKG_VERSION"));

/// Get the GitHub API base URL, allowing override for testing.
pub(crate) fn github_api_base() -> String {
    std::env::var("GITHUB_API_BASE_URL").unwrap_or_else(|_| GITHUB_API_BASE.to_string())
}

fn github_token() -> Option<String> {
    let raw = std::env::var("GITHUB_TOKEN").ok()?;
    let token = raw.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Failures of a single GitHub call.
#[derive(thiserror::Error, Debug)]
pub enum GitHubError {
    #[error("GitHub resource not found: {0}")]
    NotFound(String),
    #[error("GitHub API rate limit exceeded. Wait a few minutes, or set GITHUB_TOKEN for higher limits.")]
    RateLimited,
    #[error("GitHub API access forbidden. Check your GITHUB_TOKEN permissions.")]
    Forbidden,
    #[error("GitHub API authentication failed. Verify your GITHUB_TOKEN is valid.")]
    Unauthorized,
    #[error("GitHub search query rejected (HTTP 422): {0}")]
    InvalidQuery(String),
    #[error("GitHub API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected GitHub response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GitHubError {
    fn from_status(status: u16, body: String, resource: &str) -> Self {
        match status {
            404 => Self::NotFound(resource.to_string()),
            401 => Self::Unauthorized,
            403 | 429 if body.to_lowercase().contains("rate limit") || status == 429 => {
                Self::RateLimited
            }
            403 => Self::Forbidden,
            422 => Self::InvalidQuery(truncate(&body, 200)),
            _ => Self::Status {
                status,
                body: truncate(&body, 200),
            },
        }
    }

    /// True when the error says the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[derive(Deserialize)]
struct RepoSearchResponse {
    #[serde(default)]
    items: Vec<CandidateRepository>,
}

#[derive(Deserialize)]
struct IssueSearchResponse {
    total_count: u64,
}

/// GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Build a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from `GITHUB_API_BASE_URL` and `GITHUB_TOKEN`.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        Self::new(github_api_base(), github_token(), timeout)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, CLIENT_USER_AGENT);
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<T, GitHubError> {
        let response = builder.send().await?;
        let status = response.status();
        // Read the body on every path so the connection is released.
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GitHubError::from_status(status.as_u16(), body, resource));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn search_repositories(&self, query: &SearchQuery) -> Result<Vec<CandidateRepository>> {
        let q = query.query_string();
        let per_page = query.per_page.to_string();
        let request = self.get("/search/repositories").query(&[
            ("q", q.as_str()),
            ("sort", query.sort.as_param()),
            ("order", "desc"),
            ("per_page", per_page.as_str()),
        ]);
        let response: RepoSearchResponse = self
            .fetch(request, "search/repositories")
            .await
            .with_context(|| format!("searching repositories for `{q}`"))?;
        Ok(response.items)
    }

    async fn get_user(&self, handle: &str) -> Result<GitHubUser> {
        let request = self.get(&format!("/users/{handle}"));
        Ok(self.fetch(request, &format!("user {handle}")).await?)
    }

    async fn list_user_repos(
        &self,
        handle: &str,
        kind: RepoListKind,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CandidateRepository>> {
        let request = self.get(&format!("/users/{handle}/repos")).query(&[
            ("type", kind.as_param().to_string()),
            ("sort", "pushed".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ]);
        let repos = self
            .fetch(request, &format!("repos of {handle}"))
            .await
            .with_context(|| format!("listing {} repos for {handle}", kind.as_param()))?;
        Ok(repos)
    }

    async fn list_starred(
        &self,
        handle: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CandidateRepository>> {
        let request = self.get(&format!("/users/{handle}/starred")).query(&[
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ]);
        let repos = self
            .fetch(request, &format!("stars of {handle}"))
            .await
            .with_context(|| format!("listing starred repos for {handle} (page {page})"))?;
        Ok(repos)
    }

    async fn list_public_events(&self, handle: &str, per_page: u32) -> Result<Vec<PublicEvent>> {
        let request = self
            .get(&format!("/users/{handle}/events/public"))
            .query(&[("per_page", per_page.to_string())]);
        let events = self
            .fetch(request, &format!("events of {handle}"))
            .await
            .with_context(|| format!("listing public events for {handle}"))?;
        Ok(events)
    }

    async fn repo_languages(&self, full_name: &str) -> Result<HashMap<String, u64>> {
        let request = self.get(&format!("/repos/{full_name}/languages"));
        let languages = self
            .fetch(request, full_name)
            .await
            .with_context(|| format!("fetching languages for {full_name}"))?;
        Ok(languages)
    }

    async fn count_open_issues_with_label(&self, full_name: &str, label: &str) -> Result<u64> {
        let q = format!("repo:{full_name} is:issue is:open label:\"{label}\"");
        let request = self
            .get("/search/issues")
            .query(&[("q", q.as_str()), ("per_page", "1")]);
        let response: IssueSearchResponse = self
            .fetch(request, "search/issues")
            .await
            .with_context(|| format!("counting `{label}` issues in {full_name}"))?;
        Ok(response.total_count)
    }

    async fn get_repository(&self, id: u64) -> Result<CandidateRepository> {
        let request = self.get(&format!("/repositories/{id}"));
        let repo = self
            .fetch(request, &format!("repository {id}"))
            .await
            .with_context(|| format!("fetching repository {id}"))?;
        Ok(repo)
    }
}
