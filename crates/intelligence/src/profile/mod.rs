//! Behavioral profile of a GitHub account.
//!
//! Profile data is advisory: every field degrades to an empty collection when
//! the account has nothing to say about it.

mod builder;
mod existing;
mod keywords;

pub use builder::{build_profile, classify_repo, detect_frameworks};
pub use existing::collect_existing_work;
pub use keywords::{extract_commit_keywords, keywords_from_messages};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Days of inactivity assumed when an account shows no activity at all.
pub const NO_ACTIVITY_WINDOW_DAYS: u32 = 90;

/// Category of repository an account tends to work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoKind {
    Library,
    Application,
    Service,
    Tooling,
    Documentation,
    Other,
}

impl RepoKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Application => "application",
            Self::Service => "service",
            Self::Tooling => "tooling",
            Self::Documentation => "documentation",
            Self::Other => "other",
        }
    }
}

/// Languages, interests and activity of one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Language name to accumulated weight.
    pub languages: BTreeMap<String, u32>,
    /// Lowercased topics across owned repositories.
    pub topics: BTreeSet<String>,
    pub frameworks: BTreeSet<String>,
    /// Whole days since the most recent push or event.
    pub last_activity_window: u32,
    pub repo_types: BTreeMap<RepoKind, u32>,
    /// Full names touched in the trailing 90 days, most recent first.
    pub active_repos: Vec<String>,
}

impl UserProfile {
    /// True when the profile can steer sourcing at all.
    pub fn has_signal(&self) -> bool {
        !self.languages.is_empty() || !self.topics.is_empty()
    }

    /// Up to `n` languages by weight desc, then name asc.
    pub fn top_languages(&self, n: usize) -> Vec<String> {
        let mut langs: Vec<(&String, &u32)> = self.languages.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        langs.into_iter().take(n).map(|(l, _)| l.clone()).collect()
    }

    pub fn max_language_weight(&self) -> u32 {
        self.languages.values().copied().max().unwrap_or(0)
    }

    /// Weight of `language`, matched case-insensitively.
    pub fn language_weight(&self, language: &str) -> Option<u32> {
        self.languages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(language))
            .map(|(_, w)| *w)
    }

    /// Most frequent repository kind, if any.
    pub fn dominant_repo_kind(&self) -> Option<RepoKind> {
        self.repo_types
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(kind, _)| *kind)
    }
}
