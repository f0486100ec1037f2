//! Shared test utilities for repopicks crates.
//!
//! This crate provides common fixtures used across the workspace: GitHub and
//! chat-completion payloads shaped like the real APIs, environment guards, a
//! temporary repopicks home, and the in-memory [`FakeGitHub`] and
//! [`ScriptedChat`] backends.

pub use repopicks_intelligence::test_support::{FakeGitHub, ScriptedChat};

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Serialize tests that mutate process-global state (env vars, cwd, etc).
///
/// Acquire this guard at the start of any test that modifies environment
/// variables to prevent race conditions between parallel tests.
pub fn env_guard() -> MutexGuard<'static, ()> {
    static TEST_SERIAL: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for environment variables - restores original value on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        if let Some(v) = &self.previous {
            std::env::set_var(self.key, v);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

/// Set an environment variable and return a guard that restores the original on drop.
///
/// # Example
/// ```
/// let _guard = repopicks_test_utils::set_env_var("MY_VAR", Some("value"));
/// // MY_VAR is set to "value"
/// // When _guard drops, MY_VAR is restored to its original value
/// ```
pub fn set_env_var(key: &'static str, value: Option<&str>) -> EnvVarGuard {
    let previous = std::env::var(key).ok();
    if let Some(val) = value {
        std::env::set_var(key, val);
    } else {
        std::env::remove_var(key);
    }
    EnvVarGuard { key, previous }
}

/// A repository object as returned by search and listing endpoints, pushed
/// `days_ago` days before now.
pub fn repo_json(id: u64, full_name: &str, stars: u64, days_ago: i64) -> Value {
    let (owner, name) = full_name.split_once('/').unwrap_or(("owner", full_name));
    let pushed = (Utc::now() - Duration::days(days_ago)).to_rfc3339();
    json!({
        "id": id,
        "name": name,
        "full_name": full_name,
        "description": format!("The {name} project"),
        "language": "Rust",
        "stargazers_count": stars,
        "forks_count": stars / 10,
        "open_issues_count": 12,
        "topics": [],
        "html_url": format!("https://github.com/{full_name}"),
        "owner": {
            "login": owner,
            "avatar_url": format!("https://avatars.githubusercontent.com/{owner}")
        },
        "archived": false,
        "fork": false,
        "pushed_at": pushed,
        "updated_at": pushed
    })
}

/// A `/users/{login}` response.
pub fn user_json(login: &str, id: u64) -> Value {
    json!({
        "login": login,
        "id": id,
        "public_repos": 8,
        "html_url": format!("https://github.com/{login}")
    })
}

/// A `PushEvent` from `/users/{login}/events/public`.
pub fn push_event_json(repo_name: &str, messages: &[&str], days_ago: i64) -> Value {
    let commits: Vec<Value> = messages.iter().map(|m| json!({ "message": m })).collect();
    json!({
        "type": "PushEvent",
        "repo": { "name": repo_name },
        "payload": { "commits": commits },
        "created_at": (Utc::now() - Duration::days(days_ago)).to_rfc3339()
    })
}

/// An OpenAI-compatible chat-completion response carrying `content`.
pub fn chat_completion_json(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Temporary repopicks home directory.
///
/// Holds the tempdir and provides access to common paths.
/// The tempdir is automatically cleaned up when this struct is dropped.
pub struct TestHome {
    pub tempdir: tempfile::TempDir,
    /// `$REPOPICKS_HOME/config.toml`
    pub config_file: PathBuf,
    /// `$REPOPICKS_HOME/cache.json`
    pub cache_file: PathBuf,
}

impl TestHome {
    pub fn new() -> std::io::Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let config_file = tempdir.path().join("config.toml");
        let cache_file = tempdir.path().join("cache.json");
        Ok(Self {
            tempdir,
            config_file,
            cache_file,
        })
    }

    pub fn path(&self) -> &Path {
        self.tempdir.path()
    }

    /// Point `REPOPICKS_HOME` at this directory until the guard drops.
    pub fn home_guard(&self) -> EnvVarGuard {
        set_env_var("REPOPICKS_HOME", self.path().to_str())
    }

    pub fn write_config(&self, toml: &str) -> std::io::Result<&Path> {
        std::fs::write(&self.config_file, toml)?;
        Ok(&self.config_file)
    }
}
