//! Build a [`UserProfile`] from an account's public repositories and events.

use super::{RepoKind, UserProfile, NO_ACTIVITY_WINDOW_DAYS};
use crate::github::{CandidateRepository, GitHubApi, PublicEvent, RepoListKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

const OWNED_PAGE_SIZE: u32 = 100;
const EVENT_PAGE_SIZE: u32 = 30;
const ACTIVE_WINDOW_DAYS: i64 = 90;
/// Owned repositories (most recently pushed first) whose language breakdown is fetched.
const LANGUAGE_BREAKDOWN_REPOS: usize = 10;
const PRIMARY_LANGUAGE_WEIGHT: u32 = 3;
const BREAKDOWN_LANGUAGE_WEIGHT: u32 = 1;

/// Framework identifier and the tokens that indicate it.
const FRAMEWORKS: &[(&str, &[&str])] = &[
    ("react", &["react", "reactjs", "react.js"]),
    ("nextjs", &["nextjs", "next.js"]),
    ("vue", &["vue", "vuejs", "vue.js", "nuxt"]),
    ("angular", &["angular", "angularjs"]),
    ("svelte", &["svelte", "sveltekit"]),
    ("express", &["express", "expressjs"]),
    ("nestjs", &["nestjs"]),
    ("tailwind", &["tailwind", "tailwindcss"]),
    ("django", &["django"]),
    ("flask", &["flask"]),
    ("fastapi", &["fastapi"]),
    ("pytorch", &["pytorch", "torch"]),
    ("tensorflow", &["tensorflow"]),
    ("rails", &["rails"]),
    ("laravel", &["laravel"]),
    ("spring", &["spring", "springboot"]),
    ("tokio", &["tokio"]),
    ("actix", &["actix"]),
    ("axum", &["axum"]),
    ("tauri", &["tauri"]),
    ("electron", &["electron"]),
    ("flutter", &["flutter"]),
];

const KIND_RULES: &[(RepoKind, &[&str])] = &[
    (
        RepoKind::Documentation,
        &[
            "docs",
            "documentation",
            "awesome",
            "tutorial",
            "tutorials",
            "guide",
            "book",
            "notes",
            "cheatsheet",
        ],
    ),
    (
        RepoKind::Library,
        &["library", "lib", "sdk", "crate", "package", "framework", "bindings"],
    ),
    (
        RepoKind::Tooling,
        &[
            "cli",
            "tool",
            "tools",
            "tooling",
            "plugin",
            "extension",
            "devtools",
            "linter",
            "formatter",
        ],
    ),
    (
        RepoKind::Service,
        &["api", "server", "service", "backend", "microservice", "bot"],
    ),
    (
        RepoKind::Application,
        &[
            "app",
            "application",
            "website",
            "web",
            "game",
            "dashboard",
            "frontend",
            "mobile",
            "desktop",
        ],
    ),
];

/// Lowercased tokens of a repository's name, description and topics.
pub(crate) fn repo_tokens(repo: &CandidateRepository) -> HashSet<String> {
    let mut text = repo.name.to_lowercase();
    if let Some(desc) = &repo.description {
        text.push(' ');
        text.push_str(&desc.to_lowercase());
    }
    for topic in &repo.topics {
        text.push(' ');
        text.push_str(&topic.to_lowercase());
    }
    text.split(|c: char| !c.is_alphanumeric() && c != '.')
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Frameworks a repository's metadata mentions.
pub fn detect_frameworks(repo: &CandidateRepository) -> BTreeSet<String> {
    let tokens = repo_tokens(repo);
    FRAMEWORKS
        .iter()
        .filter(|(_, aliases)| aliases.iter().any(|a| tokens.contains(*a)))
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Classify a repository from its topics, name and description.
pub fn classify_repo(repo: &CandidateRepository) -> RepoKind {
    let tokens = repo_tokens(repo);
    KIND_RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| tokens.contains(*w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(RepoKind::Other)
}

/// Build the profile for a validated handle.
///
/// Fails only when the owned-repository listing fails; event and language
/// lookups degrade to partial data.
pub async fn build_profile(
    api: &dyn GitHubApi,
    handle: &str,
    now: DateTime<Utc>,
) -> Result<UserProfile> {
    let (owned, events) = tokio::join!(
        api.list_user_repos(handle, RepoListKind::Owner, 1, OWNED_PAGE_SIZE),
        api.list_public_events(handle, EVENT_PAGE_SIZE),
    );
    let mut owned: Vec<CandidateRepository> = owned
        .with_context(|| format!("building profile for {handle}"))?
        .into_iter()
        .filter(|repo| !repo.fork)
        .collect();
    owned.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));

    let events = events.unwrap_or_else(|e| {
        warn!(handle, error = %e, "public events unavailable, continuing without them");
        Vec::new()
    });

    let breakdowns = join_all(owned.iter().take(LANGUAGE_BREAKDOWN_REPOS).map(
        |repo| async move {
            match api.repo_languages(&repo.full_name).await {
                Ok(languages) => Some(languages),
                Err(e) => {
                    debug!(repo = %repo.full_name, error = %e, "skipping language breakdown");
                    None
                }
            }
        },
    ))
    .await;

    let mut profile = UserProfile::default();
    for repo in &owned {
        if let Some(language) = repo.language.as_deref().filter(|l| !l.is_empty()) {
            *profile.languages.entry(language.to_string()).or_default() +=
                PRIMARY_LANGUAGE_WEIGHT;
        }
        profile
            .topics
            .extend(repo.topics.iter().map(|t| t.to_lowercase()));
        profile.frameworks.extend(detect_frameworks(repo));
        *profile.repo_types.entry(classify_repo(repo)).or_default() += 1;
    }
    for languages in breakdowns.into_iter().flatten() {
        for language in languages.into_keys() {
            *profile.languages.entry(language).or_default() += BREAKDOWN_LANGUAGE_WEIGHT;
        }
    }
    profile.active_repos = active_repos(&owned, &events, now);
    profile.last_activity_window = activity_window(&owned, &events, now);

    debug!(
        handle,
        languages = profile.languages.len(),
        topics = profile.topics.len(),
        frameworks = profile.frameworks.len(),
        active = profile.active_repos.len(),
        "built profile"
    );
    Ok(profile)
}

fn activity_points<'a>(
    owned: &'a [CandidateRepository],
    events: &'a [PublicEvent],
) -> impl Iterator<Item = (&'a str, DateTime<Utc>)> + 'a {
    let pushes = owned
        .iter()
        .filter_map(|r| r.last_activity().map(|ts| (r.full_name.as_str(), ts)));
    let acts = events.iter().map(|e| (e.repo.name.as_str(), e.created_at));
    pushes.chain(acts)
}

fn active_repos(
    owned: &[CandidateRepository],
    events: &[PublicEvent],
    now: DateTime<Utc>,
) -> Vec<String> {
    let cutoff = now - Duration::days(ACTIVE_WINDOW_DAYS);
    let mut touched: Vec<(&str, DateTime<Utc>)> = activity_points(owned, events)
        .filter(|(_, ts)| *ts >= cutoff)
        .collect();
    touched.sort_by(|a, b| b.1.cmp(&a.1));

    let mut seen = HashSet::new();
    touched
        .into_iter()
        .filter(|(name, _)| seen.insert(*name))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn activity_window(owned: &[CandidateRepository], events: &[PublicEvent], now: DateTime<Utc>) -> u32 {
    match activity_points(owned, events).map(|(_, ts)| ts).max() {
        Some(latest) => (now - latest).num_days().clamp(1, i64::from(u32::MAX)) as u32,
        None => NO_ACTIVITY_WINDOW_DAYS,
    }
}
