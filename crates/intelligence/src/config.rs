//! Tuning parameters for one recommendation cycle.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `REPOPICKS_*` environment variables.

use crate::recommend::OwnerDiversityConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_AI_BASE_URL: &str = "https://api.groq.com/openai/v1/";

pub const DEFAULT_AI_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "openai/gpt-oss-120b",
    "openai/gpt-oss-20b",
];

const DEFAULT_ORG_ALLOWLIST: &[&str] = &[
    "facebook",
    "microsoft",
    "google",
    "vercel",
    "rust-lang",
    "kubernetes",
    "apache",
    "mozilla",
    "tokio-rs",
    "golang",
    "nodejs",
    "python",
];

const LEDGER_CAP_MIN: usize = 50;
const LEDGER_CAP_MAX: usize = 100;

/// How commit keywords influence ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordPolicy {
    /// Keywords order the candidate pool before AI selection only.
    PreSortOnly,
    /// Keywords also add to the deterministic score.
    #[default]
    PreSortAndScore,
}

impl KeywordPolicy {
    pub fn scores_keywords(&self) -> bool {
        matches!(self, Self::PreSortAndScore)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pre_sort_only" => Some(Self::PreSortOnly),
            "pre_sort_and_score" => Some(Self::PreSortAndScore),
            _ => None,
        }
    }
}

/// Ranking-model backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    pub models: Vec<String>,
    pub batch_timeout_secs: u64,
    pub single_timeout_secs: u64,
    /// Never written to or read from the config file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            models: DEFAULT_AI_MODELS.iter().map(|m| m.to_string()).collect(),
            batch_timeout_secs: 30,
            single_timeout_secs: 10,
            api_key: None,
        }
    }
}

impl AiConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn single_timeout(&self) -> Duration {
        Duration::from_secs(self.single_timeout_secs)
    }

    /// The selector only runs with a key and at least one model.
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some() && !self.models.is_empty()
    }
}

/// Thresholds and limits for the recommendation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PicksConfig {
    pub min_stars: u64,
    pub min_stars_outside_allowlist: u64,
    pub pushed_within_days: u32,
    pub recently_active_days: u32,
    pub org_allowlist: Vec<String>,
    pub top_languages: usize,
    pub result_limit: usize,
    pub min_ai_results: usize,
    pub min_cached_results: usize,
    pub max_ai_candidates: usize,
    pub ledger_cap: usize,
    pub result_cache_ttl_secs: u64,
    pub starred_max_pages: u32,
    pub signal_concurrency: usize,
    pub request_deadline_secs: u64,
    pub github_timeout_secs: u64,
    pub keyword_policy: KeywordPolicy,
    pub ai: AiConfig,
    pub diversity: OwnerDiversityConfig,
}

impl Default for PicksConfig {
    fn default() -> Self {
        Self {
            min_stars: 500,
            min_stars_outside_allowlist: 1000,
            pushed_within_days: 180,
            recently_active_days: 30,
            org_allowlist: DEFAULT_ORG_ALLOWLIST.iter().map(|o| o.to_string()).collect(),
            top_languages: 3,
            result_limit: 10,
            min_ai_results: 5,
            min_cached_results: 5,
            max_ai_candidates: 50,
            ledger_cap: LEDGER_CAP_MIN,
            result_cache_ttl_secs: 18 * 60 * 60,
            starred_max_pages: 5,
            signal_concurrency: 8,
            request_deadline_secs: 60,
            github_timeout_secs: 10,
            keyword_policy: KeywordPolicy::default(),
            ai: AiConfig::default(),
            diversity: OwnerDiversityConfig::default(),
        }
    }
}

impl PicksConfig {
    /// Defaults, overlaid with `path` when given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        if config.model_chain_outlasts_deadline() {
            tracing::warn!(
                models = config.ai.models.len(),
                batch_timeout_secs = config.ai.batch_timeout_secs,
                request_deadline_secs = config.request_deadline_secs,
                "model chain can outlast the request deadline; selection will be cut short"
            );
        }
        Ok(config)
    }

    /// True when trying every model could take the whole request deadline.
    pub fn model_chain_outlasts_deadline(&self) -> bool {
        self.ai
            .batch_timeout_secs
            .saturating_mul(self.ai.models.len() as u64)
            >= self.request_deadline_secs
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.ledger_cap = config.ledger_cap.clamp(LEDGER_CAP_MIN, LEDGER_CAP_MAX);
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `REPOPICKS_*` overrides. Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        env_parse("REPOPICKS_MIN_STARS", &mut self.min_stars);
        env_parse(
            "REPOPICKS_MIN_STARS_OUTSIDE_ALLOWLIST",
            &mut self.min_stars_outside_allowlist,
        );
        env_parse("REPOPICKS_PUSHED_WITHIN_DAYS", &mut self.pushed_within_days);
        env_parse(
            "REPOPICKS_RECENTLY_ACTIVE_DAYS",
            &mut self.recently_active_days,
        );
        env_parse("REPOPICKS_LEDGER_CAP", &mut self.ledger_cap);
        self.ledger_cap = self.ledger_cap.clamp(LEDGER_CAP_MIN, LEDGER_CAP_MAX);
        env_parse("REPOPICKS_CACHE_TTL_SECS", &mut self.result_cache_ttl_secs);
        env_parse(
            "REPOPICKS_REQUEST_DEADLINE_SECS",
            &mut self.request_deadline_secs,
        );

        if let Some(orgs) = env_list("REPOPICKS_ORG_ALLOWLIST") {
            self.org_allowlist = orgs;
        }
        if let Ok(raw) = std::env::var("REPOPICKS_KEYWORD_POLICY") {
            match KeywordPolicy::parse(&raw) {
                Some(policy) => self.keyword_policy = policy,
                None => tracing::warn!(value = %raw, "ignoring unknown REPOPICKS_KEYWORD_POLICY"),
            }
        }
        if let Ok(base) = std::env::var("REPOPICKS_AI_BASE_URL") {
            if !base.trim().is_empty() {
                self.ai.base_url = base.trim().to_string();
            }
        }
        if let Some(models) = env_list("REPOPICKS_AI_MODELS") {
            self.ai.models = models;
        }
        self.ai.api_key = ["REPOPICKS_AI_API_KEY", "GROQ_API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty());
    }

    pub fn result_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.result_cache_ttl_secs)
    }

    pub fn ledger_ttl(&self) -> Duration {
        Duration::from_secs(self.result_cache_ttl_secs.saturating_mul(2))
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn github_timeout(&self) -> Duration {
        Duration::from_secs(self.github_timeout_secs)
    }

    pub fn is_allowlisted(&self, owner: &str) -> bool {
        self.org_allowlist
            .iter()
            .any(|org| org.eq_ignore_ascii_case(owner))
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(var, value = %raw, "ignoring unparsable config override"),
    }
}

fn env_list(var: &str) -> Option<Vec<String>> {
    let raw = std::env::var(var).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repopicks_test_utils::{env_guard, set_env_var};

    /// Given: no file and no overrides
    /// When: the config is loaded
    /// Then: the documented defaults apply
    #[test]
    fn given_no_overrides_when_load_then_defaults_apply() {
        let _lock = env_guard();
        let _a = set_env_var("REPOPICKS_MIN_STARS", None);
        let _b = set_env_var("REPOPICKS_AI_API_KEY", None);
        let _c = set_env_var("GROQ_API_KEY", None);
        let _d = set_env_var("REPOPICKS_LEDGER_CAP", None);

        let config = PicksConfig::load(None).unwrap();

        assert_eq!(config.min_stars, 500);
        assert_eq!(config.min_stars_outside_allowlist, 1000);
        assert_eq!(config.result_cache_ttl(), Duration::from_secs(64_800));
        assert_eq!(config.ledger_ttl(), Duration::from_secs(129_600));
        assert_eq!(config.ai.models.len(), 4);
        assert!(!config.ai.is_enabled());
    }

    #[test]
    fn given_toml_file_when_loaded_then_fields_override_and_rest_default() {
        let config = PicksConfig::from_toml(
            r#"
            min_stars = 50
            keyword_policy = "pre_sort_only"
            ledger_cap = 400

            [ai]
            models = ["tiny-model"]
            "#,
        )
        .unwrap();

        assert_eq!(config.min_stars, 50);
        assert_eq!(config.keyword_policy, KeywordPolicy::PreSortOnly);
        assert_eq!(config.ledger_cap, 100, "cap is clamped");
        assert_eq!(config.ai.models, vec!["tiny-model".to_string()]);
        assert_eq!(config.ai.batch_timeout_secs, 30);
        assert_eq!(config.result_limit, 10);
    }

    #[test]
    fn given_env_overrides_when_applied_then_env_wins_and_garbage_is_ignored() {
        let _lock = env_guard();
        let _a = set_env_var("REPOPICKS_MIN_STARS", Some("42"));
        let _b = set_env_var("REPOPICKS_PUSHED_WITHIN_DAYS", Some("soon"));
        let _c = set_env_var("REPOPICKS_ORG_ALLOWLIST", Some(" rust-lang , ,tokio-rs"));
        let _d = set_env_var("REPOPICKS_AI_API_KEY", None);
        let _e = set_env_var("GROQ_API_KEY", Some("gsk-test"));
        let _f = set_env_var("REPOPICKS_KEYWORD_POLICY", Some("pre-sort-only"));

        let mut config = PicksConfig::default();
        config.apply_env();

        assert_eq!(config.min_stars, 42);
        assert_eq!(config.pushed_within_days, 180);
        assert_eq!(config.org_allowlist, vec!["rust-lang", "tokio-rs"]);
        assert_eq!(config.ai.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.keyword_policy, KeywordPolicy::PreSortOnly);
        assert!(config.ai.is_enabled());
    }

    #[test]
    fn given_ledger_cap_below_range_when_applied_then_clamped() {
        let _lock = env_guard();
        let _a = set_env_var("REPOPICKS_LEDGER_CAP", Some("5"));
        let mut config = PicksConfig::default();
        config.apply_env();
        assert_eq!(config.ledger_cap, 50);
    }

    #[test]
    fn given_config_file_when_loaded_then_path_is_reported_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("picks.toml");
        std::fs::write(&good, "result_limit = 7\n").unwrap();
        assert_eq!(PicksConfig::from_file(&good).unwrap().result_limit, 7);

        let bad = dir.path().join("broken.toml");
        std::fs::write(&bad, "result_limit = \"many\"\n").unwrap();
        let err = PicksConfig::from_file(&bad).unwrap_err();
        assert!(format!("{err}").contains("broken.toml"));

        assert!(PicksConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn given_huge_cache_ttl_when_ledger_ttl_derived_then_it_saturates() {
        let config = PicksConfig {
            result_cache_ttl_secs: u64::MAX - 1,
            ..PicksConfig::default()
        };
        assert_eq!(config.ledger_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn given_model_chain_longer_than_deadline_when_checked_then_flagged() {
        let mut config = PicksConfig::default();
        assert!(config.model_chain_outlasts_deadline(), "4 x 30s >= 60s");

        config.ai.models.truncate(1);
        assert!(!config.model_chain_outlasts_deadline());

        config.request_deadline_secs = 30;
        assert!(config.model_chain_outlasts_deadline());
    }

    #[test]
    fn given_diversity_table_when_loaded_then_missing_fields_default() {
        let config = PicksConfig::from_toml("[diversity]\ndecay = 0.5\n").unwrap();
        assert_eq!(config.diversity.decay, 0.5);
        assert_eq!(config.diversity.floor, 0.1);
    }

    #[test]
    fn test_allowlist_is_case_insensitive() {
        let config = PicksConfig::default();
        assert!(config.is_allowlisted("Microsoft"));
        assert!(!config.is_allowlisted("someone-else"));
    }

    #[test]
    fn test_round_trips_through_toml_without_key() {
        let mut config = PicksConfig::default();
        config.ai.api_key = Some("secret".into());
        let text = config.to_toml().unwrap();
        assert!(!text.contains("secret"));
        let back = PicksConfig::from_toml(&text).unwrap();
        assert_eq!(back.min_stars, config.min_stars);
        assert!(back.ai.api_key.is_none());
    }
}
