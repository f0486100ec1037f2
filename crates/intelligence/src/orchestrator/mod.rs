//! The recommendation cycle.
//!
//! `ResolvingIdentity → CacheCheck → BuildingProfile → CollectingExclusions →
//! Sourcing → Selecting → Explaining → Persisting → Done`, with `Fallback`
//! reachable when the profile, the candidate pool or the handle cannot be
//! established, or when the cycle overruns its deadline. Only input errors
//! reach the caller.

mod fallback;
mod identity;
mod progress;

pub use fallback::{fallback_query, fallback_recommendations};
pub use identity::{
    default_strategies, handle_from_noreply, is_valid_handle, resolve_session_handle,
    verify_handle, DisplayName, HandleCheck, HandleStrategy, Identity, NoreplyEmail,
    ProviderAccount, SessionUser, StoredHandle,
};
pub use progress::{
    ChannelProgress, LogProgress, ProgressSink, ProgressUpdate, RecordingProgress, Stage,
};

use crate::config::PicksConfig;
use crate::error::PicksError;
use crate::github::{CandidateRepository, GitHubApi, GitHubClient};
use crate::ledger::{cache_key, filter_cached, ledger_key, CachedPicks, ResultCache, RotationLedger};
use crate::llm::{AiPick, AiSelector, ChatBackend, ChatClient, ModelExplanation};
use crate::profile::{build_profile, collect_existing_work, extract_commit_keywords, UserProfile};
use crate::recommend::{
    explain_static, extract_signals_batch, ContributionPick, Explanation, OwnerDiversity,
    RepoScorer, RepoSignals, ScoredRepo,
};
use crate::source::source_candidates;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use progress::Reporter;
use repopicks_state::KvStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// One request for recommendations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub identity: Identity,
    /// Explicit handle; takes precedence over anything derived from a session.
    pub handle: Option<String>,
    /// Drop the cached list and avoid everything shown recently.
    pub force_refresh: bool,
    /// Return the progress checkpoints with the picks.
    pub include_progress: bool,
}

impl RecommendationRequest {
    pub fn guest(handle: impl Into<String>) -> Self {
        Self {
            identity: Identity::Guest,
            handle: Some(handle.into()),
            force_refresh: false,
            include_progress: false,
        }
    }

    pub fn session(user: SessionUser) -> Self {
        Self {
            identity: Identity::Session(user),
            handle: None,
            force_refresh: false,
            include_progress: false,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn with_progress(mut self, include: bool) -> Self {
        self.include_progress = include;
        self
    }
}

/// Where a list of picks came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PicksSource {
    Cache,
    Personalized,
    Fallback,
}

/// The response of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    /// At most `result_limit` picks, best first.
    pub repositories: Vec<ContributionPick>,
    pub source: PicksSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<ProgressUpdate>,
}

/// Longest deadline a cycle is given, whatever the configuration says.
const MAX_REQUEST_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// State shared between a running cycle and its deadline handler.
struct CycleState {
    deadline: Instant,
    exclusions: Mutex<HashSet<String>>,
}

impl CycleState {
    fn new(deadline: Duration) -> Self {
        Self {
            deadline: Instant::now() + deadline.min(MAX_REQUEST_DEADLINE),
            exclusions: Mutex::new(HashSet::new()),
        }
    }

    fn exclude<I: IntoIterator<Item = String>>(&self, names: I) {
        self.exclusions.lock().extend(names);
    }

    fn exclusions(&self) -> HashSet<String> {
        self.exclusions.lock().clone()
    }

    /// Half of the time left before the deadline, so later stages keep the
    /// other half.
    fn stage_budget(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now()) / 2
    }
}

struct Outcome {
    picks: Vec<ContributionPick>,
    source: PicksSource,
}

enum Selected {
    Ai(AiPick),
    Ranked { scored: ScoredRepo, signals: RepoSignals },
}

impl Selected {
    fn full_name(&self) -> &str {
        match self {
            Self::Ai(pick) => &pick.repo.full_name,
            Self::Ranked { scored, .. } => &scored.repo.full_name,
        }
    }
}

/// Runs recommendation cycles against injected GitHub, model and store
/// backends.
pub struct Orchestrator {
    github: Arc<dyn GitHubApi>,
    selector: Option<AiSelector>,
    cache: ResultCache,
    ledger: RotationLedger,
    strategies: Vec<Box<dyn HandleStrategy>>,
    diversity: OwnerDiversity,
    config: PicksConfig,
}

impl Orchestrator {
    /// An orchestrator without a ranking model; selection is deterministic.
    pub fn new(github: Arc<dyn GitHubApi>, store: Arc<dyn KvStore>, config: PicksConfig) -> Self {
        Self {
            github,
            selector: None,
            cache: ResultCache::new(store.clone(), config.result_cache_ttl()),
            ledger: RotationLedger::new(store, config.ledger_ttl(), config.ledger_cap),
            strategies: default_strategies(),
            diversity: OwnerDiversity::new(config.diversity.clone()),
            config,
        }
    }

    /// GitHub from the environment, plus the configured model backend when an
    /// API key is present.
    pub fn from_config(config: PicksConfig, store: Arc<dyn KvStore>) -> anyhow::Result<Self> {
        let github = Arc::new(GitHubClient::from_env(config.github_timeout())?);
        let backend: Option<Arc<dyn ChatBackend>> = match &config.ai.api_key {
            Some(key) if config.ai.is_enabled() => {
                Some(Arc::new(ChatClient::new(&config.ai.base_url, key.clone())?))
            }
            _ => None,
        };
        let orchestrator = Self::new(github, store, config);
        Ok(match backend {
            Some(backend) => orchestrator.with_chat_backend(backend),
            None => {
                info!("no model API key configured, using deterministic ranking only");
                orchestrator
            }
        })
    }

    pub fn with_chat_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.selector = Some(AiSelector::new(
            backend,
            &self.config.ai,
            self.config.max_ai_candidates,
        ));
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn HandleStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn config(&self) -> &PicksConfig {
        &self.config
    }

    /// Run one cycle, logging progress.
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<Recommendations, PicksError> {
        self.recommend_with_progress(request, &LogProgress).await
    }

    /// Run one cycle, reporting checkpoints to `sink`.
    pub async fn recommend_with_progress(
        &self,
        request: RecommendationRequest,
        sink: &dyn ProgressSink,
    ) -> Result<Recommendations, PicksError> {
        let span = info_span!("recommend", cycle = %Uuid::new_v4());
        async move {
            let handle = request
                .handle
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string);
            match (&handle, &request.identity) {
                (None, Identity::Guest) => return Err(PicksError::IdentityRequired),
                (Some(h), _) if !is_valid_handle(h) => {
                    return Err(PicksError::InvalidHandle(h.clone()))
                }
                _ => {}
            }

            let reporter = Reporter::new(sink, request.include_progress);
            let cycle = CycleState::new(self.config.request_deadline());
            let outcome = match tokio::time::timeout_at(
                cycle.deadline,
                self.run_cycle(&request, handle.as_deref(), &reporter, &cycle),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    let exclusions = cycle.exclusions();
                    warn!(
                        deadline_secs = self.config.request_deadline_secs,
                        excluded = exclusions.len(),
                        "recommendation cycle overran its deadline"
                    );
                    self.fallback(&exclusions, &reporter).await
                }
            };

            Ok(Recommendations {
                repositories: outcome.picks,
                source: outcome.source,
                progress: reporter.recorded(),
            })
        }
        .instrument(span)
        .await
    }

    async fn run_cycle(
        &self,
        request: &RecommendationRequest,
        explicit: Option<&str>,
        reporter: &Reporter<'_>,
        cycle: &CycleState,
    ) -> Result<Outcome, PicksError> {
        let api = self.github.as_ref();

        let handle = match explicit {
            Some(h) => match verify_handle(api, h).await? {
                HandleCheck::Resolved(login) => Some(login),
                HandleCheck::Unavailable => None,
            },
            None => match &request.identity {
                Identity::Session(user) => {
                    resolve_session_handle(&self.strategies, user, api).await
                }
                Identity::Guest => None,
            },
        };
        let Some(handle) = handle else {
            info!("no GitHub handle available");
            return Ok(self.fallback(&HashSet::new(), reporter).await);
        };

        let identity_key = request.identity.key(&handle);
        let cache_key = cache_key(&identity_key, &handle);
        let ledger_key = ledger_key(&identity_key, &handle);
        let shown = self.ledger.load(&ledger_key).await;
        cycle.exclude(shown.iter().flatten().map(|e| e.full_name.clone()));

        if request.force_refresh {
            self.cache.invalidate(&cache_key).await;
        } else if let Some(cached) = self.cache.load(&cache_key).await {
            if let Some(picks) = filter_cached(
                &cached,
                shown.as_deref(),
                self.config.min_cached_results,
                self.config.result_limit,
            ) {
                info!(handle = %handle, count = picks.len(), "serving cached recommendations");
                reporter.emit(Stage::Done, 100, "Loaded your saved recommendations");
                return Ok(Outcome {
                    picks,
                    source: PicksSource::Cache,
                });
            }
            debug!(handle = %handle, "cached picks rotated out, recomputing");
        }

        let now = Utc::now();
        reporter.emit(Stage::BuildingProfile, 10, "Analyzing your GitHub profile...");
        let (profile, existing, keywords) = tokio::join!(
            build_profile(api, &handle, now),
            collect_existing_work(api, &handle, self.config.starred_max_pages),
            extract_commit_keywords(api, &handle),
        );

        let mut exclusions = existing;
        exclusions.extend(shown.iter().flatten().map(|e| e.full_name.clone()));
        cycle.exclude(exclusions.iter().cloned());

        let profile = match profile {
            Ok(profile) if profile.has_signal() => profile,
            Ok(_) => {
                info!(handle = %handle, "profile has no languages or topics");
                return Ok(self.fallback(&exclusions, reporter).await);
            }
            Err(e) => {
                warn!(handle = %handle, error = %e, "profile build failed");
                return Ok(self.fallback(&exclusions, reporter).await);
            }
        };
        reporter.emit(
            Stage::BuildingProfile,
            25,
            format!(
                "Profile ready: {}",
                profile.top_languages(self.config.top_languages).join(", ")
            ),
        );

        reporter.emit(
            Stage::CollectingExclusions,
            30,
            "Checking repositories you already know...",
        );
        reporter.emit(
            Stage::CollectingExclusions,
            40,
            format!("Excluding {} repositories", exclusions.len()),
        );

        reporter.emit(Stage::Sourcing, 50, "Searching for matching repositories...");
        let pool =
            source_candidates(api, &profile, &exclusions, &keywords, &self.config, now).await;
        if pool.is_empty() {
            info!(handle = %handle, "no candidates survived sourcing");
            return Ok(self.fallback(&exclusions, reporter).await);
        }
        reporter.emit(
            Stage::Sourcing,
            60,
            format!("Found {} candidate repositories", pool.len()),
        );

        reporter.emit(Stage::Selecting, 70, "Ranking candidates...");
        let scorer = RepoScorer::new(&profile, &keywords, self.config.keyword_policy, now);
        let selected = self
            .select(&profile, &scorer, &pool, &exclusions, now, cycle)
            .await;
        reporter.emit(
            Stage::Selecting,
            85,
            format!("Selected {} repositories", selected.len()),
        );

        reporter.emit(Stage::Explaining, 90, "Explaining why each repository fits...");
        let picks = self.explain(&profile, &scorer, selected, cycle).await;

        reporter.emit(Stage::Persisting, 95, "Finalizing recommendations...");
        self.persist(&cache_key, &ledger_key, &picks).await;

        info!(handle = %handle, count = picks.len(), "recommendations ready");
        reporter.emit(Stage::Done, 100, "Recommendations ready");
        Ok(Outcome {
            picks,
            source: PicksSource::Personalized,
        })
    }

    /// Model selection first, then deterministic backfill when it falls short.
    /// The model gets half of the time left so the backfill always runs.
    async fn select(
        &self,
        profile: &UserProfile,
        scorer: &RepoScorer<'_>,
        pool: &[CandidateRepository],
        exclusions: &HashSet<String>,
        now: DateTime<Utc>,
        cycle: &CycleState,
    ) -> Vec<Selected> {
        let limit = self.config.result_limit;
        let mut selected: Vec<Selected> = match &self.selector {
            Some(selector) => {
                let budget = cycle.stage_budget();
                match tokio::time::timeout(budget, selector.select(profile, pool, exclusions))
                    .await
                {
                    Ok(picks) => picks,
                    Err(_) => {
                        warn!(
                            budget_ms = budget.as_millis() as u64,
                            "model selection ran out of time, using deterministic ranking"
                        );
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        }
        .into_iter()
        .take(limit)
        .map(Selected::Ai)
        .collect();

        if selected.len() >= self.config.min_ai_results {
            return selected;
        }

        let taken: HashSet<String> = selected.iter().map(|s| s.full_name().to_string()).collect();
        let remaining: Vec<CandidateRepository> = pool
            .iter()
            .filter(|r| !taken.contains(&r.full_name) && !exclusions.contains(&r.full_name))
            .take(self.config.max_ai_candidates)
            .cloned()
            .collect();
        let signals =
            extract_signals_batch(self.github.as_ref(), &remaining, self.config.signal_concurrency, now)
                .await;
        let ranked = scorer.rank(&remaining, &signals, &self.diversity);
        debug!(
            model_picks = selected.len(),
            ranked = ranked.len(),
            "backfilling with deterministic ranking"
        );

        let room = limit.saturating_sub(selected.len());
        selected.extend(ranked.into_iter().take(room).map(|scored| {
            let repo_signals = signals
                .get(&scored.repo.full_name)
                .copied()
                .unwrap_or_else(|| RepoSignals::estimate(&scored.repo, now));
            Selected::Ranked {
                scored,
                signals: repo_signals,
            }
        }));
        selected
    }

    /// Model-provided fields when present, else a single-item model call
    /// bounded by half of the time left, else a static explanation.
    async fn explain(
        &self,
        profile: &UserProfile,
        scorer: &RepoScorer<'_>,
        selected: Vec<Selected>,
        cycle: &CycleState,
    ) -> Vec<ContributionPick> {
        let budget = cycle.stage_budget();
        let mut picks = join_all(selected.into_iter().map(|item| async move {
            match item {
                Selected::Ai(pick) => ContributionPick::new(&pick.repo, pick.explanation),
                Selected::Ranked { scored, signals } => {
                    let fixed = explain_static(scorer, &scored.repo, &signals);
                    let model = match &self.selector {
                        Some(selector) => tokio::time::timeout(
                            budget,
                            selector.explain(profile, &scored.repo, &signals),
                        )
                        .await
                        .unwrap_or_else(|_| {
                            debug!(repo = %scored.repo.full_name, "model explanation ran out of time");
                            None
                        }),
                        None => None,
                    };
                    let explanation = match model {
                        Some(model) => merge_explanations(model, fixed),
                        None => fixed,
                    };
                    ContributionPick::new(&scored.repo, explanation)
                }
            }
        }))
        .await;
        make_reasons_unique(&mut picks);
        picks
    }

    async fn persist(&self, cache_key: &str, ledger_key: &str, picks: &[ContributionPick]) {
        if picks.is_empty() {
            return;
        }
        let computed_at = Utc::now();
        let cached = CachedPicks {
            computed_at,
            picks: picks.to_vec(),
        };
        tokio::join!(
            self.ledger
                .record(ledger_key, picks.iter().map(ContributionPick::full_name), computed_at),
            self.cache.save(cache_key, &cached),
        );
    }

    async fn fallback(&self, exclusions: &HashSet<String>, reporter: &Reporter<'_>) -> Outcome {
        reporter.emit(
            Stage::Fallback,
            50,
            "Finding popular beginner-friendly repositories...",
        );
        let picks = fallback_recommendations(self.github.as_ref(), exclusions, &self.config).await;
        reporter.emit(Stage::Done, 100, "Recommendations ready");
        Outcome {
            picks,
            source: PicksSource::Fallback,
        }
    }
}

/// Model text with the deterministic score; whatever the model left out
/// comes from the static explanation.
fn merge_explanations(model: ModelExplanation, fixed: Explanation) -> Explanation {
    Explanation {
        match_score: fixed.match_score,
        difficulty: model.difficulty.unwrap_or(fixed.difficulty),
        reason: model.reason,
        factors: if model.factors.is_empty() {
            fixed.factors
        } else {
            model.factors
        },
        first_steps: if model.first_steps.is_empty() {
            fixed.first_steps
        } else {
            model.first_steps
        },
    }
}

/// Suffix repeated reasons with the repository name.
fn make_reasons_unique(picks: &mut [ContributionPick]) {
    let mut seen = BTreeSet::new();
    for pick in picks.iter_mut() {
        if !seen.insert(pick.match_reason.clone()) {
            pick.match_reason = format!("{} ({})", pick.match_reason, pick.full_name());
            seen.insert(pick.match_reason.clone());
        }
    }
}
