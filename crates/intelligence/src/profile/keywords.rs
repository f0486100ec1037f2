//! Extract keywords from recent commit messages.

use crate::github::GitHubApi;
use std::collections::BTreeSet;
use tracing::{debug, warn};

const EVENT_WINDOW: u32 = 30;
const MAX_COMMITS: usize = 10;
const MAX_TOKENS_PER_COMMIT: usize = 5;
const MIN_TOKEN_CHARS: usize = 4;

/// Commit keywords for `handle`. Any failure yields an empty set.
pub async fn extract_commit_keywords(api: &dyn GitHubApi, handle: &str) -> BTreeSet<String> {
    let events = match api.list_public_events(handle, EVENT_WINDOW).await {
        Ok(events) => events,
        Err(e) => {
            warn!(handle, error = %e, "commit keywords unavailable");
            return BTreeSet::new();
        }
    };

    let messages = events
        .iter()
        .filter(|event| event.is_push())
        .flat_map(|event| event.payload.commits.iter())
        .map(|commit| commit.message.as_str());
    let keywords = keywords_from_messages(messages);
    debug!(handle, count = keywords.len(), "extracted commit keywords");
    keywords
}

/// Tokenize at most ten commit messages into a keyword set.
pub fn keywords_from_messages<'a, I>(messages: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keywords = BTreeSet::new();
    for message in messages.into_iter().take(MAX_COMMITS) {
        let message = strip_conventional_prefix(message.trim());
        let tokens = message
            .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
            .map(|word| word.trim_matches(|c| c == '-' || c == '_').to_lowercase())
            .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS && !is_commit_stop_word(word))
            .take(MAX_TOKENS_PER_COMMIT);
        keywords.extend(tokens);
    }
    keywords
}

/// Strip conventional commit prefixes like "feat:" or "fix(scope):".
fn strip_conventional_prefix(line: &str) -> &str {
    const TYPES: &[&str] = &[
        "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore",
        "revert",
    ];

    let lower = line.to_ascii_lowercase();
    for kind in TYPES {
        let Some(rest) = lower.strip_prefix(kind) else {
            continue;
        };
        let offset = line.len() - rest.len();
        if rest.starts_with(':') || rest.starts_with("!:") {
            return line[offset..].trim_start_matches(['!', ':']).trim_start();
        }
        if rest.starts_with('(') {
            if let Some(idx) = rest.find("):") {
                return line[offset + idx + 2..].trim_start();
            }
        }
    }
    line
}

/// Generic verbs, their inflections, and merge-commit boilerplate.
fn is_commit_stop_word(word: &str) -> bool {
    const STOP_WORDS: &[&str] = &[
        "fix",
        "fixes",
        "fixed",
        "fixing",
        "add",
        "adds",
        "added",
        "adding",
        "update",
        "updates",
        "updated",
        "updating",
        "remove",
        "removes",
        "removed",
        "removing",
        "change",
        "changes",
        "changed",
        "changing",
        "refactor",
        "refactors",
        "refactored",
        "refactoring",
        // Merge commits
        "merge",
        "merged",
        "merging",
        "pull",
        "request",
        "branch",
        "from",
        "into",
        "main",
        "master",
    ];
    STOP_WORDS.contains(&word)
}
