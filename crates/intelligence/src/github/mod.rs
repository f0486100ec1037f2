//! Typed access to the GitHub REST API.
//!
//! Every response shape the pipeline reads has an explicit struct here; a
//! payload that does not deserialize becomes an ordinary per-call failure.

mod client;
mod query;

pub use client::{GitHubClient, GitHubError};
pub use query::{sanitize_search_term, SearchQuery, SearchSort};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Owner of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Repository metadata as returned by search and listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub owner: RepoOwner,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CandidateRepository {
    /// Most recent activity timestamp (push, falling back to update).
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.pushed_at.or(self.updated_at)
    }

    /// Whole days since the last activity, `None` when unknown.
    pub fn days_since_activity(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_activity()
            .map(|ts| (now - ts).num_days().max(0))
    }
}

/// Public profile of an account, used to validate handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub public_repos: u32,
}

/// A public activity event (`/users/{handle}/events/public`).
#[derive(Debug, Clone, Deserialize)]
pub struct PublicEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub repo: EventRepo,
    #[serde(default)]
    pub payload: EventPayload,
    pub created_at: DateTime<Utc>,
}

impl PublicEvent {
    pub fn is_push(&self) -> bool {
        self.kind == "PushEvent"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRepo {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub commits: Vec<EventCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventCommit {
    #[serde(default)]
    pub message: String,
}

/// Which repositories `list_user_repos` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoListKind {
    /// Repositories the account owns.
    Owner,
    /// Owned plus member repositories, including forks.
    All,
}

impl RepoListKind {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::All => "all",
        }
    }
}

/// The GitHub operations the recommendation core consumes.
///
/// Rate-limit and availability errors are ordinary per-call failures; callers
/// decide how to degrade.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn search_repositories(&self, query: &SearchQuery) -> Result<Vec<CandidateRepository>>;
    async fn get_user(&self, handle: &str) -> Result<GitHubUser>;
    async fn list_user_repos(
        &self,
        handle: &str,
        kind: RepoListKind,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CandidateRepository>>;
    async fn list_starred(
        &self,
        handle: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CandidateRepository>>;
    async fn list_public_events(&self, handle: &str, per_page: u32) -> Result<Vec<PublicEvent>>;
    /// Language name to bytes of code, as reported by GitHub.
    async fn repo_languages(&self, full_name: &str) -> Result<HashMap<String, u64>>;
    /// Number of open issues in `full_name` carrying `label`.
    async fn count_open_issues_with_label(&self, full_name: &str, label: &str) -> Result<u64>;
    async fn get_repository(&self, id: u64) -> Result<CandidateRepository>;
}
