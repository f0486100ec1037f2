//! End-to-end recommendation cycles against in-memory GitHub and model
//! backends.

use anyhow::{bail, Result};
use async_trait::async_trait;
use repopicks_intelligence::orchestrator::ChannelProgress;
use repopicks_intelligence::source::keyword_match_score;
use repopicks_intelligence::{
    CandidateRepository, ChatBackend, ChatRequest, Difficulty, Orchestrator, PicksConfig,
    PicksError, PicksSource, RecommendationRequest, Recommendations, RecordingProgress,
    SessionUser, Stage,
};
use repopicks_state::{KvStore, MemoryKvStore};
use repopicks_test_utils::{push_event_json, repo_json, FakeGitHub};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn repo(id: u64, full_name: &str, stars: u64, days_ago: i64) -> CandidateRepository {
    serde_json::from_value(repo_json(id, full_name, stars, days_ago)).unwrap()
}

/// `count` eligible Rust repositories from distinct owners.
fn eligible_pool(count: u64) -> Vec<CandidateRepository> {
    (1..=count)
        .map(|i| repo(100 + i, &format!("owner{i}/proj{i}"), 2_000 + i * 100, 2))
        .collect()
}

/// An active Rust developer with a clear profile and some existing work.
fn rust_developer() -> FakeGitHub {
    let mut fork = repo(3, "octo/fork-of-serde", 0, 40);
    fork.fork = true;
    let mut fake = FakeGitHub::default();
    fake.users = vec!["octo".into()];
    fake.owned = vec![repo(1, "octo/tool-a", 12, 3), repo(2, "octo/tool-b", 4, 20)];
    fake.all = vec![fork];
    fake.starred = vec![repo(4, "star/gazer", 9_000, 1)];
    fake.events = vec![serde_json::from_value(push_event_json(
        "octo/tool-a",
        &["feat: streaming parser for configs"],
        1,
    ))
    .unwrap()];
    fake
}

fn with_language_pool(mut fake: FakeGitHub, pool: Vec<CandidateRepository>) -> FakeGitHub {
    fake.on_search("language:Rust", pool);
    fake
}

fn fallback_pool() -> Vec<CandidateRepository> {
    let mut archived = repo(900, "old/archived", 50_000, 400);
    archived.archived = true;
    let mut pool = vec![archived, repo(901, "small/thing", 120, 1)];
    pool.extend((1..=12).map(|i| repo(910 + i, &format!("popular{i}/starter"), 30_000 + i, 1)));
    pool
}

/// Scripted model: batch requests get `batch`, single-item requests get
/// `single`; `None` is an upstream failure. `hang` delays every answer.
#[derive(Default)]
struct FakeModel {
    batch: Option<String>,
    single: Option<String>,
    hang: Option<Duration>,
    calls: AtomicUsize,
}

#[async_trait]
impl ChatBackend for FakeModel {
    async fn complete(&self, _model: &str, request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hang) = self.hang {
            tokio::time::sleep(hang).await;
        }
        let reply = if request.max_tokens >= 1_000 {
            &self.batch
        } else {
            &self.single
        };
        match reply {
            Some(text) => Ok(text.clone()),
            None => bail!("HTTP 503: upstream unavailable"),
        }
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<MemoryKvStore>,
}

fn harness(fake: FakeGitHub, model: Option<FakeModel>, config: PicksConfig) -> Harness {
    let store = Arc::new(MemoryKvStore::new());
    let shared: Arc<dyn KvStore> = store.clone();
    let orchestrator = Orchestrator::new(Arc::new(fake), shared, config);
    let orchestrator = match model {
        Some(model) => orchestrator.with_chat_backend(Arc::new(model)),
        None => orchestrator,
    };
    Harness {
        orchestrator,
        store,
    }
}

fn names(out: &Recommendations) -> Vec<String> {
    out.repositories
        .iter()
        .map(|p| p.full_name().to_string())
        .collect()
}

#[tokio::test]
async fn excluded_repositories_never_appear() {
    let mut pool = eligible_pool(12);
    pool.push(repo(1, "octo/tool-a", 5_000, 1));
    pool.push(repo(3, "octo/fork-of-serde", 5_000, 1));
    pool.push(repo(4, "star/gazer", 9_000, 1));
    let h = harness(
        with_language_pool(rust_developer(), pool),
        None,
        PicksConfig::default(),
    );

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Personalized);
    let got = names(&out);
    for excluded in ["octo/tool-a", "octo/fork-of-serde", "star/gazer"] {
        assert!(!got.contains(&excluded.to_string()), "{excluded} leaked");
    }
    assert_eq!(got.len(), 10);
}

#[tokio::test]
async fn hallucinated_model_entries_are_dropped() {
    let model = FakeModel {
        batch: Some(
            r#"Here you go:
```json
[
  {"full_name": "ghost/repo", "matchScore": 99, "summary": "Does not exist"},
  {"full_name": "owner2/proj2", "matchScore": 91, "summary": "Async parsing work", "difficulty": "Easy"},
  {"full_name": "star/gazer", "matchScore": 90, "summary": "Already starred"}
]
```"#
                .into(),
        ),
        ..FakeModel::default()
    };
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(15)),
        Some(model),
        PicksConfig::default(),
    );

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    let got = names(&out);
    assert!(!got.contains(&"ghost/repo".to_string()));
    assert!(!got.contains(&"star/gazer".to_string()));
    assert_eq!(got[0], "owner2/proj2");
    assert_eq!(out.repositories[0].match_reason, "Async parsing work");
    assert_eq!(out.repositories[0].match_score, 91);
    assert!(got.len() <= 10);
}

#[tokio::test]
async fn failed_model_still_yields_a_full_deterministic_list() {
    let model = FakeModel::default();
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(20)),
        Some(model),
        PicksConfig::default(),
    );

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Personalized);
    assert_eq!(out.repositories.len(), 10);
    let reasons: HashSet<&str> = out
        .repositories
        .iter()
        .map(|p| p.match_reason.as_str())
        .collect();
    assert_eq!(reasons.len(), 10, "every reason is unique");
    assert!(out.repositories.iter().all(|p| p.match_score <= 100));
}

#[tokio::test]
async fn three_model_picks_are_backfilled_to_ten() {
    let model = FakeModel {
        batch: Some(
            r#"[
              {"full_name": "owner5/proj5", "summary": "Pick five"},
              {"full_name": "owner9/proj9", "summary": "Pick nine"},
              {"full_name": "owner5/proj5", "summary": "Duplicate"},
              {"full_name": "owner13/proj13", "summary": "Pick thirteen"}
            ]"#
            .into(),
        ),
        single: Some(r#"{"summary": "Well documented Rust project", "difficulty": "medium"}"#.into()),
        ..FakeModel::default()
    };
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(20)),
        Some(model),
        PicksConfig::default(),
    );

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    let got = names(&out);
    assert_eq!(got.len(), 10);
    assert_eq!(&got[..3], &["owner5/proj5", "owner9/proj9", "owner13/proj13"]);
    let unique: HashSet<&String> = got.iter().collect();
    assert_eq!(unique.len(), 10, "no name appears twice");

    let reasons: HashSet<&str> = out
        .repositories
        .iter()
        .map(|p| p.match_reason.as_str())
        .collect();
    assert_eq!(reasons.len(), 10);
}

#[tokio::test]
async fn repeated_requests_hit_the_cache() {
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(20)),
        None,
        PicksConfig::default(),
    );
    let request = RecommendationRequest::guest("octo");

    let first = h.orchestrator.recommend(request.clone()).await.unwrap();
    let second = h.orchestrator.recommend(request).await.unwrap();

    assert_eq!(first.source, PicksSource::Personalized);
    assert_eq!(second.source, PicksSource::Cache);
    assert_eq!(
        serde_json::to_string(&first.repositories).unwrap(),
        serde_json::to_string(&second.repositories).unwrap()
    );
    assert!(h
        .store
        .get("contribution-picks-shown:guest:octo:octo")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn forced_refresh_avoids_everything_just_shown() {
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(25)),
        None,
        PicksConfig::default(),
    );

    let first = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();
    let refreshed = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo").refresh(true))
        .await
        .unwrap();

    assert_eq!(refreshed.source, PicksSource::Personalized);
    assert_eq!(refreshed.repositories.len(), 10);
    let before: HashSet<String> = names(&first).into_iter().collect();
    assert!(names(&refreshed).iter().all(|n| !before.contains(n)));

    let after_refresh = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();
    assert_eq!(after_refresh.source, PicksSource::Cache);
    assert_eq!(names(&after_refresh), names(&refreshed));
}

#[tokio::test]
async fn cold_account_gets_the_popular_fallback_list() {
    let mut fake = FakeGitHub::default();
    fake.users = vec!["newbie".into()];
    fake.on_search("good-first-issues", fallback_pool());
    let h = harness(fake, None, PicksConfig::default());

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("newbie"))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Fallback);
    assert!(!out.repositories.is_empty());
    assert!(out.repositories.len() <= 10);
    assert!(out
        .repositories
        .iter()
        .all(|p| p.repository.stargazers_count >= 500));
    assert!(names(&out).iter().all(|n| n != "old/archived"));
}

#[test]
fn keyword_score_counts_distinct_matches() {
    let mut r = repo(1, "tanstack/react-query", 40_000, 1);
    r.description = Some("Hooks for fetching data".into());
    r.topics = vec!["react".into(), "hooks".into()];
    let keywords: BTreeSet<String> = ["query".to_string(), "hooks".to_string()].into();
    assert_eq!(keyword_match_score(&r, &keywords), 20);

    let many: BTreeSet<String> = (0..15).map(|i| format!("word{i}")).collect();
    r.description = Some(many.iter().cloned().collect::<Vec<_>>().join(" "));
    assert_eq!(keyword_match_score(&r, &many), 100);
}

#[tokio::test]
async fn failing_searches_degrade_to_fallback() {
    let mut fake = rust_developer();
    for needle in ["language:", "org:", "stars:>=1000"] {
        fake.fail(&format!("search:{needle}"));
    }
    fake.on_search("good-first-issues", fallback_pool());
    let h = harness(fake, None, PicksConfig::default());

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Fallback);
    assert_eq!(out.repositories.len(), 10);
}

#[tokio::test]
async fn input_errors_are_the_only_failures() {
    let h = harness(rust_developer(), None, PicksConfig::default());

    let missing = RecommendationRequest {
        handle: None,
        ..RecommendationRequest::guest("x")
    };
    assert_eq!(
        h.orchestrator.recommend(missing).await.unwrap_err(),
        PicksError::IdentityRequired
    );
    assert!(matches!(
        h.orchestrator
            .recommend(RecommendationRequest::guest("nobody-here"))
            .await,
        Err(PicksError::InvalidHandle(_))
    ));
    assert!(matches!(
        h.orchestrator
            .recommend(RecommendationRequest::guest("-bad-"))
            .await,
        Err(PicksError::InvalidHandle(_))
    ));
}

#[tokio::test]
async fn session_handle_is_derived_from_noreply_email() {
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(12)),
        None,
        PicksConfig::default(),
    );
    let user = SessionUser {
        id: "user-1".into(),
        email: Some("583231+octo@users.noreply.github.com".into()),
        ..SessionUser::default()
    };

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::session(user))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Personalized);
    assert!(h
        .store
        .get("contribution-picks:user-1:octo")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn overrunning_the_deadline_falls_back() {
    let mut fake = with_language_pool(rust_developer(), eligible_pool(12));
    fake.delay("owned", Duration::from_secs(5));
    fake.on_search("good-first-issues", fallback_pool());
    let config = PicksConfig {
        request_deadline_secs: 1,
        ..PicksConfig::default()
    };
    let h = harness(fake, None, config);

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();
    assert_eq!(out.source, PicksSource::Fallback);
}

#[tokio::test]
async fn deadline_fallback_still_honors_exclusions() {
    let mut fake = with_language_pool(rust_developer(), eligible_pool(12));
    fake.delay("search:language:", Duration::from_secs(5));
    let mut popular = vec![repo(4, "star/gazer", 9_000, 1)];
    popular.extend(fallback_pool());
    fake.on_search("good-first-issues", popular);
    let config = PicksConfig {
        request_deadline_secs: 1,
        ..PicksConfig::default()
    };
    let h = harness(fake, None, config);

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Fallback);
    assert!(!out.repositories.is_empty());
    assert!(
        !names(&out).contains(&"star/gazer".to_string()),
        "starred repository leaked into the fallback list"
    );
}

#[tokio::test]
async fn hanging_model_still_gets_a_scored_backfill() {
    let mut pool = eligible_pool(12);
    pool.push(repo(4, "star/gazer", 9_000, 1));
    let mut fake = with_language_pool(rust_developer(), pool);
    fake.on_search("good-first-issues", vec![repo(4, "star/gazer", 9_000, 1)]);
    let model = FakeModel {
        batch: Some(r#"[{"full_name": "owner1/proj1"}]"#.into()),
        single: Some(r#"{"summary": "Too late"}"#.into()),
        hang: Some(Duration::from_secs(30)),
        ..FakeModel::default()
    };
    let mut config = PicksConfig {
        request_deadline_secs: 4,
        ..PicksConfig::default()
    };
    config.ai.batch_timeout_secs = 2;
    config.ai.single_timeout_secs = 2;
    assert!(config.model_chain_outlasts_deadline());
    let h = harness(fake, Some(model), config);

    let out = h
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    assert_eq!(out.source, PicksSource::Personalized);
    assert_eq!(out.repositories.len(), 10);
    assert!(!names(&out).contains(&"star/gazer".to_string()));
    assert!(out
        .repositories
        .iter()
        .all(|p| p.match_reason != "Too late"));
}

#[tokio::test]
async fn backfill_keeps_inferred_difficulty_when_model_omits_it() {
    let difficulties = |out: &Recommendations| -> HashMap<String, Difficulty> {
        out.repositories
            .iter()
            .map(|p| (p.full_name().to_string(), p.difficulty))
            .collect()
    };
    let model = FakeModel {
        single: Some(r#"{"summary": "Nice fit"}"#.into()),
        ..FakeModel::default()
    };
    let with_model = harness(
        with_language_pool(rust_developer(), eligible_pool(12)),
        Some(model),
        PicksConfig::default(),
    );
    let without_model = harness(
        with_language_pool(rust_developer(), eligible_pool(12)),
        None,
        PicksConfig::default(),
    );

    let explained = with_model
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();
    let fixed = without_model
        .orchestrator
        .recommend(RecommendationRequest::guest("octo"))
        .await
        .unwrap();

    assert!(explained.repositories[0].match_reason.starts_with("Nice fit"));
    assert_eq!(difficulties(&explained), difficulties(&fixed));
}

#[tokio::test]
async fn progress_checkpoints_follow_the_stages() {
    let h = harness(
        with_language_pool(rust_developer(), eligible_pool(12)),
        None,
        PicksConfig::default(),
    );
    let recorder = RecordingProgress::new();

    let out = h
        .orchestrator
        .recommend_with_progress(
            RecommendationRequest::guest("octo").with_progress(true),
            &recorder,
        )
        .await
        .unwrap();

    let percents: Vec<u8> = out.progress.iter().map(|p| p.percent).collect();
    assert_eq!(percents, vec![10, 25, 30, 40, 50, 60, 70, 85, 90, 95, 100]);
    assert_eq!(out.progress.last().unwrap().stage, Stage::Done);
    assert_eq!(recorder.updates(), out.progress);

    let (sink, mut rx) = ChannelProgress::channel();
    let cached = h
        .orchestrator
        .recommend_with_progress(RecommendationRequest::guest("octo"), &sink)
        .await
        .unwrap();
    assert!(cached.progress.is_empty());
    assert_eq!(rx.recv().await.unwrap().percent, 100);
}
