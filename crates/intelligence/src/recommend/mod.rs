//! Contribution picks: scoring, signals and explanations.

mod diversity;
mod explainer;
mod scorer;
mod signals;

pub use diversity::{OwnerDiversity, OwnerDiversityConfig};
pub use explainer::{
    explain_static, fallback_pick, infer_difficulty, match_factors, Explanation,
};
pub use scorer::{RepoScorer, ScoredRepo};
pub use signals::{extract_repo_signals, extract_signals_batch, RepoSignals};

use crate::github::{CandidateRepository, RepoOwner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How hard a first contribution is likely to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Case-insensitive parse; unknown labels are `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" | "beginner" => Some(Self::Easy),
            "medium" | "intermediate" => Some(Self::Medium),
            "hard" | "advanced" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Repository fields of a pick, in the shape existing consumers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub url: String,
    pub language: String,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub watchers_count: u64,
    pub open_issues_count: u64,
    pub owner: RepoOwner,
    pub topics: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub html_url: String,
}

impl From<&CandidateRepository> for PickRepository {
    fn from(repo: &CandidateRepository) -> Self {
        Self {
            id: repo.id,
            name: repo.name.clone(),
            full_name: repo.full_name.clone(),
            description: repo.description.clone().unwrap_or_default(),
            url: repo.html_url.clone(),
            language: repo.language.clone().unwrap_or_default(),
            stargazers_count: repo.stargazers_count,
            forks_count: repo.forks_count,
            watchers_count: 0,
            open_issues_count: repo.open_issues_count,
            owner: repo.owner.clone(),
            topics: repo.topics.clone(),
            updated_at: repo.updated_at.or(repo.pushed_at),
            html_url: repo.html_url.clone(),
        }
    }
}

/// One ranked, explained recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionPick {
    #[serde(flatten)]
    pub repository: PickRepository,
    /// 0-100, higher is a better fit.
    pub match_score: u8,
    pub difficulty: Difficulty,
    pub match_reason: String,
    pub match_factors: Vec<String>,
    pub first_steps: Vec<String>,
}

impl ContributionPick {
    pub fn new(repo: &CandidateRepository, explanation: Explanation) -> Self {
        Self {
            repository: PickRepository::from(repo),
            match_score: explanation.match_score.min(100),
            difficulty: explanation.difficulty,
            match_reason: explanation.reason,
            match_factors: explanation.factors,
            first_steps: explanation.first_steps,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.repository.full_name
    }
}

/// Deterministic score components; `total()` is within 0..=100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Up to 30, from the profile's weight for the repository language.
    pub language: f64,
    /// Up to 20, from shared topics.
    pub topics: f64,
    /// Up to 10, from shared frameworks.
    pub frameworks: f64,
    /// Up to 15, from push recency.
    pub recency: f64,
    /// Up to 10, from commit-keyword matches.
    pub keywords: f64,
    /// Up to 15, from friendliness and health signals.
    pub signals: f64,
}

impl ScoreBreakdown {
    /// Calculate total score.
    pub fn total(&self) -> f64 {
        let sum = self.language
            + self.topics
            + self.frameworks
            + self.recency
            + self.keywords
            + self.signals;
        if sum.is_finite() {
            sum.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Total rounded to a whole match score.
    pub fn match_score(&self) -> u8 {
        self.total().round() as u8
    }
}
