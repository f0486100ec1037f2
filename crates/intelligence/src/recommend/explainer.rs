//! Generate human-readable explanations for picks.

use super::{ContributionPick, Difficulty, RepoScorer, RepoSignals, ScoreBreakdown};
use crate::github::CandidateRepository;

const FALLBACK_SCORE: u8 = 60;

/// The explanation fields of a [`ContributionPick`].
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub match_score: u8,
    pub difficulty: Difficulty,
    pub reason: String,
    pub factors: Vec<String>,
    pub first_steps: Vec<String>,
}

/// Ordered factor phrases for the parts of a breakdown that contributed.
pub fn match_factors(
    scorer: &RepoScorer<'_>,
    repo: &CandidateRepository,
    breakdown: &ScoreBreakdown,
    signals: &RepoSignals,
) -> Vec<String> {
    let mut factors = Vec::new();

    if breakdown.language > 0.0 {
        if let Some(language) = &repo.language {
            factors.push(format!("Written in {language}, one of your languages"));
        }
    }
    let topics = scorer.shared_topics(repo);
    match topics.len() {
        0 => {}
        1 => factors.push(format!("Shares your interest in {}", topics[0])),
        _ => factors.push(format!("Shares topics: {}", topics.join(", "))),
    }
    for framework in scorer.shared_frameworks(repo) {
        factors.push(format!("Uses {framework}"));
    }
    if breakdown.recency >= 10.0 {
        factors.push("Actively maintained".to_string());
    }
    if breakdown.keywords > 0.0 {
        factors.push("Matches themes from your recent commits".to_string());
    }
    if signals.has_good_first_issue {
        factors.push("Has open good first issues".to_string());
    }
    if signals.has_help_wanted {
        factors.push("Maintainers are asking for help".to_string());
    }
    factors
}

/// Difficulty from friendliness and project size.
pub fn infer_difficulty(repo: &CandidateRepository, signals: &RepoSignals) -> Difficulty {
    if signals.has_good_first_issue && signals.contribution_friendliness >= 50 {
        Difficulty::Easy
    } else if repo.stargazers_count >= 50_000 || signals.contribution_friendliness < 30 {
        Difficulty::Hard
    } else {
        Difficulty::Medium
    }
}

fn first_steps(repo: &CandidateRepository, signals: &RepoSignals) -> Vec<String> {
    let mut steps = Vec::new();
    if signals.has_good_first_issue {
        steps.push(format!(
            "Browse issues labeled \"good first issue\" in {}",
            repo.full_name
        ));
    }
    if signals.has_help_wanted {
        steps.push("Look through issues labeled \"help wanted\"".to_string());
    }
    steps.push("Read the README and CONTRIBUTING guide".to_string());
    steps.push("Set up the project locally and run its tests".to_string());
    steps
}

/// Explanation built from the score breakdown alone.
pub fn explain_static(
    scorer: &RepoScorer<'_>,
    repo: &CandidateRepository,
    signals: &RepoSignals,
) -> Explanation {
    let breakdown = scorer.score(repo, signals);
    let mut factors = match_factors(scorer, repo, &breakdown, signals);
    if factors.is_empty() {
        factors = generic_factors();
    }
    let reason = format!(
        "{} fits your profile: {}",
        repo.full_name,
        factors[..factors.len().min(2)].join("; ")
    );
    Explanation {
        match_score: breakdown.match_score(),
        difficulty: infer_difficulty(repo, signals),
        reason,
        factors,
        first_steps: first_steps(repo, signals),
    }
}

fn generic_factors() -> Vec<String> {
    vec!["Open source".to_string(), "Active repository".to_string()]
}

/// A pick for the profile-independent fallback list.
pub fn fallback_pick(repo: &CandidateRepository) -> ContributionPick {
    ContributionPick::new(
        repo,
        Explanation {
            match_score: FALLBACK_SCORE,
            difficulty: Difficulty::Medium,
            reason: format!(
                "Recommended for your profile: {} is popular and welcomes new contributors",
                repo.full_name
            ),
            factors: generic_factors(),
            first_steps: vec![
                "Explore the repository".to_string(),
                "Read the README".to_string(),
            ],
        },
    )
}
