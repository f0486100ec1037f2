//! Model-backed selection and explanation of candidates.

use super::chain::ModelChain;
use super::client::{ChatBackend, ChatRequest};
use super::parse::{parse_explanation, parse_selections, AiSelection};
use super::prompts::{batch_prompt, single_prompt, SYSTEM_PROMPT};
use crate::config::AiConfig;
use crate::github::CandidateRepository;
use crate::profile::UserProfile;
use crate::recommend::{Difficulty, Explanation, RepoSignals};
use anyhow::bail;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const BATCH_TEMPERATURE: f32 = 0.4;
const BATCH_MAX_TOKENS: u32 = 2000;
const SINGLE_TEMPERATURE: f32 = 0.3;
const SINGLE_MAX_TOKENS: u32 = 500;
const DEFAULT_AI_SCORE: f64 = 75.0;

/// A candidate the model selected, with its explanation.
#[derive(Debug, Clone)]
pub struct AiPick {
    pub repo: CandidateRepository,
    pub explanation: Explanation,
}

/// Explanation fields written by the model. `difficulty` is `None` when the
/// model gave none or an unknown value.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelExplanation {
    pub match_score: u8,
    pub difficulty: Option<Difficulty>,
    pub reason: String,
    pub factors: Vec<String>,
    pub first_steps: Vec<String>,
}

impl ModelExplanation {
    /// The explanation of a model pick; a missing difficulty reads as Medium.
    pub fn into_explanation(self) -> Explanation {
        Explanation {
            match_score: self.match_score,
            difficulty: self.difficulty.unwrap_or(Difficulty::Medium),
            reason: self.reason,
            factors: self.factors,
            first_steps: self.first_steps,
        }
    }
}

/// Turn a model entry into explanation fields, filling gaps with defaults.
pub fn explanation_from(selection: &AiSelection, full_name: &str) -> ModelExplanation {
    let reason = selection
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{full_name} is well-matched for your profile"));
    let score = selection
        .match_score
        .filter(|s| s.is_finite())
        .unwrap_or(DEFAULT_AI_SCORE)
        .clamp(0.0, 100.0);
    let non_empty = |items: &[String]| -> Vec<String> {
        items
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    ModelExplanation {
        match_score: score.round() as u8,
        difficulty: selection.difficulty.as_deref().and_then(Difficulty::parse),
        reason,
        factors: non_empty(&selection.why_matches),
        first_steps: non_empty(&selection.first_steps),
    }
}

/// Keep only entries naming an offered, non-excluded repository, once each,
/// in the model's order.
pub fn validate_selections(
    selections: &[AiSelection],
    offered: &[CandidateRepository],
    exclusions: &HashSet<String>,
) -> Vec<AiPick> {
    let by_name: HashMap<&str, &CandidateRepository> =
        offered.iter().map(|r| (r.full_name.as_str(), r)).collect();
    let mut seen = HashSet::new();
    let mut picks = Vec::new();
    for selection in selections {
        let name = selection.full_name.trim();
        let Some(repo) = by_name.get(name) else {
            warn!(repo = name, "dropping selection outside the candidate pool");
            continue;
        };
        if exclusions.contains(name) || !seen.insert(name) {
            continue;
        }
        picks.push(AiPick {
            repo: (*repo).clone(),
            explanation: explanation_from(selection, name).into_explanation(),
        });
    }
    picks
}

/// Ranks candidates through a [`ModelChain`]. Every failure is contained:
/// callers get an empty list or `None`.
pub struct AiSelector {
    backend: Arc<dyn ChatBackend>,
    chain: ModelChain,
    batch_timeout: Duration,
    single_timeout: Duration,
    max_candidates: usize,
}

impl AiSelector {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &AiConfig, max_candidates: usize) -> Self {
        Self {
            backend,
            chain: ModelChain::new(config.models.iter().cloned()),
            batch_timeout: config.batch_timeout(),
            single_timeout: config.single_timeout(),
            max_candidates,
        }
    }

    /// Ask the model for a ranked subset of `pool`. Hallucinated, excluded
    /// and duplicate entries never survive.
    pub async fn select(
        &self,
        profile: &UserProfile,
        pool: &[CandidateRepository],
        exclusions: &HashSet<String>,
    ) -> Vec<AiPick> {
        let offered = &pool[..pool.len().min(self.max_candidates)];
        if offered.is_empty() {
            return Vec::new();
        }
        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: batch_prompt(profile, offered, exclusions),
            temperature: BATCH_TEMPERATURE,
            max_tokens: BATCH_MAX_TOKENS,
        };

        let outcome = self
            .chain
            .run(self.backend.as_ref(), &request, self.batch_timeout, |text| {
                let picks = validate_selections(&parse_selections(text)?, offered, exclusions);
                if picks.is_empty() {
                    bail!("no valid selections");
                }
                Ok(picks)
            })
            .await;

        match outcome {
            Ok(won) => {
                info!(model = %won.model, selected = won.value.len(), "model selected candidates");
                won.value
            }
            Err(e) => {
                warn!(error = %e, "model selection unavailable, using deterministic ranking");
                Vec::new()
            }
        }
    }

    /// Explanation for one repository, `None` when every model fails.
    pub async fn explain(
        &self,
        profile: &UserProfile,
        repo: &CandidateRepository,
        signals: &RepoSignals,
    ) -> Option<ModelExplanation> {
        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: single_prompt(profile, repo, signals),
            temperature: SINGLE_TEMPERATURE,
            max_tokens: SINGLE_MAX_TOKENS,
        };
        let outcome = self
            .chain
            .run(self.backend.as_ref(), &request, self.single_timeout, |text| {
                parse_explanation(text).map(|s| explanation_from(&s, &repo.full_name))
            })
            .await;
        match outcome {
            Ok(won) => Some(won.value),
            Err(e) => {
                warn!(repo = %repo.full_name, error = %e, "model explanation unavailable");
                None
            }
        }
    }
}
