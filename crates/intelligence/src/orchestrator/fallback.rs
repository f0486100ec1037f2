//! Profile-independent list of popular, beginner-friendly repositories.

use crate::config::PicksConfig;
use crate::github::{GitHubApi, SearchQuery, SearchSort};
use crate::recommend::{fallback_pick, ContributionPick};
use std::collections::HashSet;
use tracing::{info, warn};

const FALLBACK_QUERY_SIZE: u32 = 30;

pub fn fallback_query(config: &PicksConfig) -> SearchQuery {
    SearchQuery::new()
        .min_good_first_issues(1)
        .min_stars(config.min_stars)
        .not_archived()
        .sort(SearchSort::Stars)
        .per_page(FALLBACK_QUERY_SIZE)
}

/// One search, filtered and capped. A failed search yields an empty list.
pub async fn fallback_recommendations(
    api: &dyn GitHubApi,
    exclusions: &HashSet<String>,
    config: &PicksConfig,
) -> Vec<ContributionPick> {
    let query = fallback_query(config);
    let repos = match api.search_repositories(&query).await {
        Ok(repos) => repos,
        Err(e) => {
            warn!(query = %query.query_string(), error = %e, "fallback search failed");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let picks: Vec<ContributionPick> = repos
        .iter()
        .filter(|r| !r.archived && r.stargazers_count >= config.min_stars)
        .filter(|r| !exclusions.contains(&r.full_name))
        .filter(|r| seen.insert(r.full_name.clone()))
        .take(config.result_limit)
        .map(fallback_pick)
        .collect();
    info!(count = picks.len(), "serving fallback recommendations");
    picks
}
