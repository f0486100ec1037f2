//! Quality and friendliness signals for candidate repositories.

use crate::github::{CandidateRepository, GitHubApi};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const GOOD_FIRST_ISSUE_LABEL: &str = "good first issue";
const HELP_WANTED_LABEL: &str = "help wanted";

/// Bounded contribution signals for one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSignals {
    pub has_good_first_issue: bool,
    pub has_help_wanted: bool,
    /// 0..=100
    pub maintenance_health: u8,
    /// 0..=100
    pub contribution_friendliness: u8,
}

impl RepoSignals {
    /// Signals from metadata alone, for repositories whose label lookup
    /// failed.
    pub fn estimate(repo: &CandidateRepository, now: DateTime<Utc>) -> Self {
        let has_topic = |names: &[&str]| {
            repo.topics
                .iter()
                .any(|t| names.iter().any(|n| t.eq_ignore_ascii_case(n)))
        };
        let gfi = u64::from(has_topic(&["good-first-issue", "good-first-issues", "beginner-friendly"]));
        let hw = u64::from(has_topic(&["help-wanted", "hacktoberfest"]));
        Self::from_counts(repo, gfi, hw, now)
    }

    fn from_counts(
        repo: &CandidateRepository,
        good_first_issues: u64,
        help_wanted: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let days = repo.days_since_activity(now);
        Self {
            has_good_first_issue: good_first_issues > 0,
            has_help_wanted: help_wanted > 0,
            maintenance_health: maintenance_health(repo, days),
            contribution_friendliness: friendliness(repo, good_first_issues, help_wanted, days),
        }
    }
}

fn maintenance_health(repo: &CandidateRepository, days: Option<i64>) -> u8 {
    let recency = match days {
        Some(d) if d <= 7 => 40,
        Some(d) if d <= 30 => 30,
        Some(d) if d <= 90 => 15,
        Some(d) if d <= 180 => 5,
        _ => 0,
    };
    let popularity = match repo.stargazers_count {
        s if s >= 10_000 => 25,
        s if s >= 1_000 => 20,
        s if s >= 500 => 15,
        s if s >= 100 => 10,
        0 => 0,
        _ => 5,
    };
    let community = match repo.forks_count {
        f if f >= 100 => 15,
        f if f >= 10 => 10,
        0 => 0,
        _ => 5,
    };
    let tracker = match repo.open_issues_count {
        0 => 5,
        n if n <= 500 => 20,
        _ => 10,
    };
    (recency + popularity + community + tracker).min(100)
}

fn friendliness(
    repo: &CandidateRepository,
    good_first_issues: u64,
    help_wanted: u64,
    days: Option<i64>,
) -> u8 {
    let mut score: u64 = 0;
    if good_first_issues > 0 {
        score += 35 + good_first_issues.min(10) * 2;
    }
    if help_wanted > 0 {
        score += 20;
    }
    if repo.open_issues_count > 0 {
        score += 10;
    }
    if days.is_some_and(|d| d <= 30) {
        score += 15;
    }
    score.min(100) as u8
}

/// Count labeled open issues and derive signals for one repository.
pub async fn extract_repo_signals(
    api: &dyn GitHubApi,
    repo: &CandidateRepository,
    now: DateTime<Utc>,
) -> Result<RepoSignals> {
    let (gfi, hw) = tokio::try_join!(
        api.count_open_issues_with_label(&repo.full_name, GOOD_FIRST_ISSUE_LABEL),
        api.count_open_issues_with_label(&repo.full_name, HELP_WANTED_LABEL),
    )
    .with_context(|| format!("extracting signals for {}", repo.full_name))?;
    Ok(RepoSignals::from_counts(repo, gfi, hw, now))
}

/// Extract signals for many repositories with at most `concurrency` in
/// flight. Failed repositories are omitted from the map.
pub async fn extract_signals_batch(
    api: &dyn GitHubApi,
    repos: &[CandidateRepository],
    concurrency: usize,
    now: DateTime<Utc>,
) -> HashMap<String, RepoSignals> {
    let results: Vec<(&str, Result<RepoSignals>)> = stream::iter(repos)
        .map(|repo| async move {
            (
                repo.full_name.as_str(),
                extract_repo_signals(api, repo, now).await,
            )
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut signals = HashMap::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok(s) => {
                signals.insert(name.to_string(), s);
            }
            Err(e) => warn!(repo = name, error = %e, "signal extraction failed"),
        }
    }
    debug!(
        requested = repos.len(),
        extracted = signals.len(),
        "extracted repository signals"
    );
    signals
}
