//! In-memory GitHub and model backends for tests.
//!
//! Compiled for this crate's unit tests, and for other crates' tests through
//! the `test-support` feature (enabled by `repopicks_test_utils`).

use crate::github::{
    CandidateRepository, EventCommit, EventPayload, EventRepo, GitHubApi, GitHubError, GitHubUser,
    PublicEvent, RepoListKind, RepoOwner, SearchQuery,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// A repository pushed `days_ago` days before now.
pub fn repo(
    id: u64,
    full_name: &str,
    language: Option<&str>,
    stars: u64,
    days_ago: i64,
) -> CandidateRepository {
    let (owner, name) = full_name.split_once('/').unwrap_or(("owner", full_name));
    let pushed = Utc::now() - Duration::days(days_ago);
    CandidateRepository {
        id,
        name: name.to_string(),
        full_name: full_name.to_string(),
        description: None,
        language: language.map(str::to_string),
        stargazers_count: stars,
        forks_count: stars / 10,
        open_issues_count: 12,
        topics: Vec::new(),
        html_url: format!("https://github.com/{full_name}"),
        owner: RepoOwner {
            login: owner.to_string(),
            avatar_url: format!("https://avatars.githubusercontent.com/{owner}"),
        },
        archived: false,
        fork: false,
        pushed_at: Some(pushed),
        updated_at: Some(pushed),
    }
}

pub fn push_event(repo_name: &str, messages: &[&str], at: DateTime<Utc>) -> PublicEvent {
    PublicEvent {
        kind: "PushEvent".to_string(),
        repo: EventRepo {
            name: repo_name.to_string(),
        },
        payload: EventPayload {
            commits: messages
                .iter()
                .map(|m| EventCommit {
                    message: m.to_string(),
                })
                .collect(),
        },
        created_at: at,
    }
}

/// In-memory [`GitHubApi`] with switchable failures.
///
/// Failure keys: `owned`, `all`, `starred`, `events`, `user`, `languages`,
/// `issues`, `search`, or `search:<needle>` to fail only queries containing
/// the needle. Delays use the same keys.
#[derive(Default)]
pub struct FakeGitHub {
    pub owned: Vec<CandidateRepository>,
    pub all: Vec<CandidateRepository>,
    pub starred: Vec<CandidateRepository>,
    pub events: Vec<PublicEvent>,
    pub languages: HashMap<String, HashMap<String, u64>>,
    /// Query-string needle and the results returned for queries containing it.
    pub searches: Vec<(String, Vec<CandidateRepository>)>,
    /// Keyed by `"{full_name}|{label}"`.
    pub issue_counts: HashMap<String, u64>,
    pub users: Vec<String>,
    failures: HashSet<String>,
    delays: HashMap<String, std::time::Duration>,
    starred_pages: AtomicU32,
    queries: Mutex<Vec<String>>,
}

impl FakeGitHub {
    pub fn fail(&mut self, op: &str) {
        self.failures.insert(op.to_string());
    }

    /// Make `op` sleep for `delay` before answering.
    pub fn delay(&mut self, op: &str, delay: std::time::Duration) {
        self.delays.insert(op.to_string(), delay);
    }

    pub fn on_search(&mut self, needle: &str, repos: Vec<CandidateRepository>) {
        self.searches.push((needle.to_string(), repos));
    }

    pub fn starred_pages_requested(&self) -> u32 {
        self.starred_pages.load(Ordering::SeqCst)
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn pause(&self, op: &str) {
        if let Some(delay) = self.delays.get(op) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.failures.contains(op) {
            bail!("{op} unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn search_repositories(&self, query: &SearchQuery) -> Result<Vec<CandidateRepository>> {
        let q = query.query_string();
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(q.clone());
        for (key, delay) in &self.delays {
            if key
                .strip_prefix("search:")
                .is_some_and(|needle| q.contains(needle))
            {
                tokio::time::sleep(*delay).await;
            }
        }
        self.check("search")?;
        for failure in &self.failures {
            if let Some(needle) = failure.strip_prefix("search:") {
                if q.contains(needle) {
                    bail!("search for {needle} timed out");
                }
            }
        }
        Ok(self
            .searches
            .iter()
            .find(|(needle, _)| q.contains(needle.as_str()))
            .map(|(_, repos)| repos.clone())
            .unwrap_or_default())
    }

    async fn get_user(&self, handle: &str) -> Result<GitHubUser> {
        self.check("user")?;
        match self.users.iter().find(|u| u.eq_ignore_ascii_case(handle)) {
            Some(login) => Ok(GitHubUser {
                login: login.clone(),
                id: 1,
                public_repos: self.owned.len() as u32,
            }),
            None => Err(GitHubError::NotFound(format!("user {handle}")).into()),
        }
    }

    async fn list_user_repos(
        &self,
        _handle: &str,
        kind: RepoListKind,
        _page: u32,
        _per_page: u32,
    ) -> Result<Vec<CandidateRepository>> {
        match kind {
            RepoListKind::Owner => {
                self.pause("owned").await;
                self.check("owned")?;
                Ok(self.owned.clone())
            }
            RepoListKind::All => {
                self.pause("all").await;
                self.check("all")?;
                Ok(self.all.clone())
            }
        }
    }

    async fn list_starred(
        &self,
        _handle: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CandidateRepository>> {
        self.starred_pages.fetch_add(1, Ordering::SeqCst);
        self.check("starred")?;
        let start = ((page.saturating_sub(1)) * per_page) as usize;
        Ok(self
            .starred
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn list_public_events(&self, _handle: &str, per_page: u32) -> Result<Vec<PublicEvent>> {
        self.check("events")?;
        Ok(self.events.iter().take(per_page as usize).cloned().collect())
    }

    async fn repo_languages(&self, full_name: &str) -> Result<HashMap<String, u64>> {
        self.check("languages")?;
        Ok(self.languages.get(full_name).cloned().unwrap_or_default())
    }

    async fn count_open_issues_with_label(&self, full_name: &str, label: &str) -> Result<u64> {
        self.check("issues")?;
        self.check(&format!("issues:{full_name}"))?;
        Ok(self
            .issue_counts
            .get(&format!("{full_name}|{label}"))
            .copied()
            .unwrap_or(0))
    }

    async fn get_repository(&self, id: u64) -> Result<CandidateRepository> {
        self.searches
            .iter()
            .flat_map(|(_, repos)| repos.iter())
            .chain(self.owned.iter())
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(format!("repository {id}")).into())
    }
}

enum Scripted {
    Reply(String),
    Fail(String),
}

/// [`ChatBackend`] answering from a per-model script.
///
/// Entries are matched in insertion order on model name and, optionally, a
/// needle contained in the prompt.
#[derive(Default)]
pub struct ScriptedChat {
    script: Vec<(String, Option<String>, Scripted)>,
    delays: HashMap<String, std::time::Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn reply(mut self, model: &str, text: &str) -> Self {
        self.script
            .push((model.to_string(), None, Scripted::Reply(text.to_string())));
        self
    }

    pub fn reply_matching(mut self, model: &str, needle: &str, text: &str) -> Self {
        self.script.push((
            model.to_string(),
            Some(needle.to_string()),
            Scripted::Reply(text.to_string()),
        ));
        self
    }

    pub fn fail(mut self, model: &str, message: &str) -> Self {
        self.script
            .push((model.to_string(), None, Scripted::Fail(message.to_string())));
        self
    }

    pub fn delay(mut self, model: &str, delay: std::time::Duration) -> Self {
        self.delays.insert(model.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl crate::llm::ChatBackend for ScriptedChat {
    async fn complete(&self, model: &str, request: &crate::llm::ChatRequest) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(model.to_string());
        if let Some(delay) = self.delays.get(model) {
            tokio::time::sleep(*delay).await;
        }
        let entry = self.script.iter().find(|(m, needle, _)| {
            m == model
                && needle
                    .as_deref()
                    .map_or(true, |n| request.prompt.contains(n))
        });
        match entry {
            Some((_, _, Scripted::Reply(text))) => Ok(text.clone()),
            Some((_, _, Scripted::Fail(message))) => bail!("{message}"),
            None => bail!("model {model} not scripted"),
        }
    }
}
