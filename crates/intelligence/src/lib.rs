//! Personalized open-source contribution recommendations.
//!
//! This crate provides:
//! - A typed GitHub client and the [`GitHubApi`] seam the pipeline runs on
//! - Profile building, existing-work collection and commit keyword extraction
//! - Candidate sourcing, deterministic scoring with owner diversity, and
//!   repository signal extraction
//! - Model-backed selection over an ordered fallback chain of models
//! - The result cache and rotation ledger, and the [`Orchestrator`] that
//!   drives one recommendation cycle

pub mod config;
pub mod error;
pub mod github;
pub mod ledger;
pub mod llm;
pub mod orchestrator;
pub mod profile;
pub mod recommend;
pub mod source;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{AiConfig, KeywordPolicy, PicksConfig};
pub use error::PicksError;
pub use github::{CandidateRepository, GitHubApi, GitHubClient, GitHubError, SearchQuery};
pub use ledger::{CachedPicks, LedgerEntry, ResultCache, RotationLedger};
pub use llm::{AiSelector, ChainError, ChatBackend, ChatClient, ChatRequest, ModelChain};
pub use orchestrator::{
    ChannelProgress, HandleStrategy, Identity, LogProgress, Orchestrator, PicksSource,
    ProgressSink, ProgressUpdate, RecommendationRequest, Recommendations, RecordingProgress,
    SessionUser, Stage,
};
pub use profile::{RepoKind, UserProfile};
pub use recommend::{
    ContributionPick, Difficulty, OwnerDiversityConfig, RepoScorer, RepoSignals, ScoreBreakdown,
};
