//! Prompt templates for the ranking model.

use crate::github::CandidateRepository;
use crate::profile::UserProfile;
use crate::recommend::RepoSignals;
use std::collections::HashSet;

const PROFILE_LANGUAGES: usize = 5;
const PROFILE_TOPICS: usize = 10;
const CANDIDATE_TOPICS: usize = 5;
pub const MAX_EXCLUDED_IN_PROMPT: usize = 30;

pub const SYSTEM_PROMPT: &str = r#"You recommend open-source repositories a developer could contribute to.

You receive a summary of the developer's GitHub activity (languages, frameworks, topics, repository kinds, recent activity) and a numbered list of candidate repositories.

Select 5 to 10 candidates and rank them by fit and contribution readiness.

Hard rules:
- Only choose repositories from the candidate list. Never invent repositories.
- Never choose a repository from the excluded list.
- Never choose repositories the developer owns, starred or forked.

Rank by language and framework alignment, topic overlap, project health (recent pushes, responsive maintainers), and how welcoming the project is to newcomers (README, CONTRIBUTING, "good first issue" and "help wanted" labels).

Answer with JSON only, no markdown and no commentary:
[
  {
    "full_name": "owner/repo",
    "matchScore": 0,
    "summary": "80-120 characters on why THIS repository suits the developer, naming concrete technologies or goals",
    "whyMatches": ["reason", "reason"],
    "firstSteps": ["step", "step"],
    "difficulty": "Easy" | "Medium" | "Hard"
  }
]

Every summary must be specific to its repository. If nothing fits, answer []."#;

const SINGLE_ITEM_SCHEMA: &str = r#"Answer with one JSON object only:
{"summary": "...", "matchScore": 0, "whyMatches": ["...", "..."], "firstSteps": ["...", "..."], "difficulty": "Easy|Medium|Hard"}"#;

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

/// Text summary of a profile.
pub fn profile_summary(profile: &UserProfile) -> String {
    let languages = profile.top_languages(PROFILE_LANGUAGES);
    let topics: Vec<String> = profile.topics.iter().take(PROFILE_TOPICS).cloned().collect();
    let frameworks: Vec<String> = profile.frameworks.iter().cloned().collect();
    let kinds: Vec<String> = profile
        .repo_types
        .iter()
        .map(|(kind, count)| format!("{} {count}", kind.label()))
        .collect();

    format!(
        "Developer profile:\n\
         - Primary languages: {}\n\
         - Topics: {}\n\
         - Frameworks: {}\n\
         - Last active: {} days ago\n\
         - Repository kinds: {}\n\
         - Mostly builds: {}\n\
         - Active repositories (90 days): {}\n",
        join_or(&languages, "unknown"),
        join_or(&topics, "none"),
        join_or(&frameworks, "none"),
        profile.last_activity_window,
        join_or(&kinds, "none"),
        profile
            .dominant_repo_kind()
            .map_or("unknown", |kind| kind.label()),
        profile.active_repos.len(),
    )
}

fn candidate_entry(index: usize, repo: &CandidateRepository) -> String {
    let topics: Vec<String> = repo.topics.iter().take(CANDIDATE_TOPICS).cloned().collect();
    let updated = repo
        .last_activity()
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{}. {}\n   - Description: {}\n   - Language: {}\n   - Stars: {}, Forks: {}\n   - Open issues: {}\n   - Topics: {}\n   - Updated: {}",
        index + 1,
        repo.full_name,
        repo.description.as_deref().unwrap_or("N/A"),
        repo.language.as_deref().unwrap_or("Multiple"),
        repo.stargazers_count,
        repo.forks_count,
        repo.open_issues_count,
        join_or(&topics, "none"),
        updated,
    )
}

/// User prompt for batch selection over `candidates`.
pub fn batch_prompt(
    profile: &UserProfile,
    candidates: &[CandidateRepository],
    exclusions: &HashSet<String>,
) -> String {
    let listing: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(i, repo)| candidate_entry(i, repo))
        .collect();
    let mut excluded: Vec<&String> = exclusions.iter().collect();
    excluded.sort();
    let excluded: Vec<String> = excluded
        .into_iter()
        .take(MAX_EXCLUDED_IN_PROMPT)
        .cloned()
        .collect();

    format!(
        "{}\nCandidate repositories (choose ONLY from these):\n{}\n\nExcluded repositories: {}\n\nPick 5-10 repositories from the candidate list and answer with JSON only.",
        profile_summary(profile),
        listing.join("\n\n"),
        join_or(&excluded, "none"),
    )
}

/// User prompt for explaining one repository.
pub fn single_prompt(
    profile: &UserProfile,
    repo: &CandidateRepository,
    signals: &RepoSignals,
) -> String {
    format!(
        "{}\nRepository: {}\nDescription: {}\nLanguage: {}\nTopics: {}\nStars: {}\nForks: {}\nOpen issues: {}\nHas good first issues: {}\nHas help wanted issues: {}\nMaintenance health: {}%\nContribution friendliness: {}%\n\n{}",
        profile_summary(profile),
        repo.full_name,
        repo.description.as_deref().unwrap_or("N/A"),
        repo.language.as_deref().unwrap_or("unknown"),
        join_or(&repo.topics, "none"),
        repo.stargazers_count,
        repo.forks_count,
        repo.open_issues_count,
        signals.has_good_first_issue,
        signals.has_help_wanted,
        signals.maintenance_health,
        signals.contribution_friendliness,
        SINGLE_ITEM_SCHEMA,
    )
}
