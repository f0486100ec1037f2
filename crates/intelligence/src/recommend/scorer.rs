//! Deterministic repository scoring.

use super::{OwnerDiversity, RepoSignals, ScoreBreakdown};
use crate::config::KeywordPolicy;
use crate::github::CandidateRepository;
use crate::profile::{detect_frameworks, UserProfile};
use crate::source::keyword_match_score;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

const LANGUAGE_BASE: f64 = 10.0;
const LANGUAGE_SPAN: f64 = 20.0;
const TOPIC_POINTS: f64 = 8.0;
const TOPIC_CAP: f64 = 20.0;
const FRAMEWORK_POINTS: f64 = 5.0;
const FRAMEWORK_CAP: f64 = 10.0;
const KEYWORD_CAP: f64 = 10.0;

/// A candidate with its score components and ranking score.
#[derive(Debug, Clone)]
pub struct ScoredRepo {
    pub repo: CandidateRepository,
    pub breakdown: ScoreBreakdown,
    /// Breakdown total, possibly rescaled by diversity.
    pub score: f64,
}

impl ScoredRepo {
    /// Score desc, then stars desc, then full name asc.
    pub fn rank_order(a: &Self, b: &Self) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.repo.stargazers_count.cmp(&a.repo.stargazers_count))
            .then_with(|| a.repo.full_name.cmp(&b.repo.full_name))
    }
}

/// Scores candidates against one profile. Pure: no I/O, never fails.
#[derive(Debug, Clone)]
pub struct RepoScorer<'a> {
    profile: &'a UserProfile,
    keywords: &'a BTreeSet<String>,
    policy: KeywordPolicy,
    now: DateTime<Utc>,
}

impl<'a> RepoScorer<'a> {
    pub fn new(
        profile: &'a UserProfile,
        keywords: &'a BTreeSet<String>,
        policy: KeywordPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            profile,
            keywords,
            policy,
            now,
        }
    }

    pub fn score(&self, repo: &CandidateRepository, signals: &RepoSignals) -> ScoreBreakdown {
        ScoreBreakdown {
            language: self.language_score(repo),
            topics: (self.shared_topics(repo).len() as f64 * TOPIC_POINTS).min(TOPIC_CAP),
            frameworks: (self.shared_frameworks(repo).len() as f64 * FRAMEWORK_POINTS)
                .min(FRAMEWORK_CAP),
            recency: recency_score(repo.days_since_activity(self.now)),
            keywords: if self.policy.scores_keywords() {
                (f64::from(keyword_match_score(repo, self.keywords)) / 10.0).min(KEYWORD_CAP)
            } else {
                0.0
            },
            signals: f64::from(signals.contribution_friendliness) / 10.0
                + f64::from(signals.maintenance_health) / 20.0,
        }
    }

    fn language_score(&self, repo: &CandidateRepository) -> f64 {
        let max = self.profile.max_language_weight();
        match repo
            .language
            .as_deref()
            .and_then(|l| self.profile.language_weight(l))
        {
            Some(weight) if max > 0 => {
                LANGUAGE_BASE + LANGUAGE_SPAN * f64::from(weight) / f64::from(max)
            }
            _ => 0.0,
        }
    }

    /// Repository topics also present in the profile, lowercased.
    pub fn shared_topics(&self, repo: &CandidateRepository) -> Vec<String> {
        let mut seen = HashSet::new();
        repo.topics
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| self.profile.topics.contains(t) && seen.insert(t.clone()))
            .collect()
    }

    pub fn shared_frameworks(&self, repo: &CandidateRepository) -> Vec<String> {
        detect_frameworks(repo)
            .intersection(&self.profile.frameworks)
            .cloned()
            .collect()
    }

    /// Score every candidate and rank with owner diversity applied. Missing
    /// signals fall back to [`RepoSignals::estimate`].
    pub fn rank(
        &self,
        candidates: &[CandidateRepository],
        signals: &HashMap<String, RepoSignals>,
        diversity: &OwnerDiversity,
    ) -> Vec<ScoredRepo> {
        let mut ranked: Vec<ScoredRepo> = candidates
            .iter()
            .map(|repo| {
                let repo_signals = signals
                    .get(&repo.full_name)
                    .copied()
                    .unwrap_or_else(|| RepoSignals::estimate(repo, self.now));
                let breakdown = self.score(repo, &repo_signals);
                ScoredRepo {
                    repo: repo.clone(),
                    score: breakdown.total(),
                    breakdown,
                }
            })
            .collect();
        ranked.sort_by(ScoredRepo::rank_order);
        diversity.apply(&mut ranked);
        ranked
    }
}

fn recency_score(days: Option<i64>) -> f64 {
    match days {
        Some(d) if d <= 7 => 15.0,
        Some(d) if d <= 30 => 10.0,
        Some(d) if d <= 90 => 5.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::repo;
    use proptest::prelude::*;

    fn profile() -> UserProfile {
        let mut p = UserProfile::default();
        p.languages.insert("Rust".into(), 12);
        p.languages.insert("Python".into(), 3);
        p.topics.insert("cli".into());
        p.topics.insert("parser".into());
        p.frameworks.insert("tokio".into());
        p
    }

    #[test]
    fn test_components() {
        let p = profile();
        let kw: BTreeSet<String> = ["parser".to_string()].into();
        let scorer = RepoScorer::new(&p, &kw, KeywordPolicy::PreSortAndScore, Utc::now());

        let mut r = repo(1, "o/fast-parser", Some("Rust"), 2_000, 3);
        r.topics = vec!["CLI".into(), "parser".into(), "tokio".into(), "cli".into()];
        let signals = RepoSignals {
            has_good_first_issue: true,
            has_help_wanted: false,
            maintenance_health: 80,
            contribution_friendliness: 60,
        };

        let b = scorer.score(&r, &signals);
        assert_eq!(b.language, 30.0);
        assert_eq!(b.topics, 16.0);
        assert_eq!(b.frameworks, 5.0);
        assert_eq!(b.recency, 15.0);
        assert_eq!(b.keywords, 1.0);
        assert_eq!(b.signals, 10.0);
        assert_eq!(b.match_score(), 77);
    }

    #[test]
    fn test_secondary_language_scores_proportionally() {
        let p = profile();
        let kw = BTreeSet::new();
        let scorer = RepoScorer::new(&p, &kw, KeywordPolicy::PreSortAndScore, Utc::now());
        let r = repo(1, "o/py", Some("python"), 2_000, 200);
        assert_eq!(scorer.score(&r, &RepoSignals::default()).language, 15.0);
    }

    #[test]
    fn test_pre_sort_only_policy_ignores_keywords() {
        let p = profile();
        let kw: BTreeSet<String> = ["parser".to_string()].into();
        let scorer = RepoScorer::new(&p, &kw, KeywordPolicy::PreSortOnly, Utc::now());
        let r = repo(1, "o/parser", Some("Go"), 2_000, 3);
        assert_eq!(scorer.score(&r, &RepoSignals::default()).keywords, 0.0);
    }

    #[test]
    fn test_empty_profile_scores_without_panicking() {
        let p = UserProfile::default();
        let kw = BTreeSet::new();
        let scorer = RepoScorer::new(&p, &kw, KeywordPolicy::default(), Utc::now());
        let mut r = repo(1, "o/x", None, 0, 0);
        r.pushed_at = None;
        r.updated_at = None;
        assert_eq!(scorer.score(&r, &RepoSignals::default()).total(), 0.0);
    }

    #[test]
    fn test_rank_breaks_ties_by_stars_then_name() {
        let p = UserProfile::default();
        let kw = BTreeSet::new();
        let scorer = RepoScorer::new(&p, &kw, KeywordPolicy::default(), Utc::now());
        let candidates = vec![
            repo(1, "b/same", None, 1_000, 400),
            repo(2, "a/same", None, 1_000, 400),
            repo(3, "c/more-stars", None, 9_000, 400),
        ];
        let flat: HashMap<String, RepoSignals> = candidates
            .iter()
            .map(|r| (r.full_name.clone(), RepoSignals::default()))
            .collect();

        let ranked = scorer.rank(&candidates, &flat, &OwnerDiversity::default());
        let names: Vec<_> = ranked.iter().map(|s| s.repo.full_name.as_str()).collect();
        assert_eq!(names, vec!["c/more-stars", "a/same", "b/same"]);
    }

    proptest! {
        #[test]
        fn score_is_always_within_bounds(
            weight in 0u32..1000,
            stars in 0u64..1_000_000,
            days in 0i64..2000,
            health in 0u8..=100,
            friendly in 0u8..=100,
            topics in proptest::collection::vec("[a-z]{1,8}", 0..10),
        ) {
            let mut p = UserProfile::default();
            p.languages.insert("Rust".into(), weight);
            p.topics.extend(topics.iter().cloned());
            let kw: BTreeSet<String> = topics.iter().cloned().collect();
            let scorer = RepoScorer::new(&p, &kw, KeywordPolicy::PreSortAndScore, Utc::now());
            let mut r = repo(1, "o/x", Some("Rust"), stars, days);
            r.topics = topics;
            let signals = RepoSignals {
                has_good_first_issue: false,
                has_help_wanted: false,
                maintenance_health: health,
                contribution_friendliness: friendly,
            };
            let total = scorer.score(&r, &signals).total();
            prop_assert!((0.0..=100.0).contains(&total));
        }
    }
}
