//! Repositories an account already owns, starred, or forked.

use crate::github::{CandidateRepository, GitHubApi, RepoListKind};
use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, warn};

const PAGE_SIZE: u32 = 100;

/// Union of owned, starred and forked full names.
///
/// The three listings run concurrently; a failing listing contributes
/// nothing.
pub async fn collect_existing_work(
    api: &dyn GitHubApi,
    handle: &str,
    starred_max_pages: u32,
) -> HashSet<String> {
    let (owned, starred, forked) = tokio::join!(
        api.list_user_repos(handle, RepoListKind::Owner, 1, PAGE_SIZE),
        collect_starred(api, handle, starred_max_pages),
        api.list_user_repos(handle, RepoListKind::All, 1, PAGE_SIZE),
    );

    let mut names = HashSet::new();
    names.extend(names_or_empty(owned, handle, "owned"));
    names.extend(starred);
    let forked = forked.map(|repos| repos.into_iter().filter(|r| r.fork).collect());
    names.extend(names_or_empty(forked, handle, "forked"));
    debug!(handle, count = names.len(), "collected existing work");
    names
}

fn names_or_empty(
    result: Result<Vec<CandidateRepository>>,
    handle: &str,
    source: &'static str,
) -> Vec<String> {
    match result {
        Ok(repos) => repos.into_iter().map(|r| r.full_name).collect(),
        Err(e) => {
            warn!(handle, source, error = %e, "existing-work listing failed");
            Vec::new()
        }
    }
}

/// Page through stars until a short page or `max_pages`. Names from pages
/// fetched before a failure are kept.
async fn collect_starred(api: &dyn GitHubApi, handle: &str, max_pages: u32) -> Vec<String> {
    let mut names = Vec::new();
    for page in 1..=max_pages {
        match api.list_starred(handle, page, PAGE_SIZE).await {
            Ok(repos) => {
                let short = (repos.len() as u32) < PAGE_SIZE;
                names.extend(repos.into_iter().map(|r| r.full_name));
                if short {
                    break;
                }
            }
            Err(e) => {
                warn!(handle, page, error = %e, "starred listing failed");
                break;
            }
        }
    }
    names
}
