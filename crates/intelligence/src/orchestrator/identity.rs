//! Who a cycle is for, and which GitHub handle it runs against.

use crate::error::PicksError;
use crate::github::{GitHubApi, GitHubError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAX_HANDLE_LEN: usize = 39;
const NOREPLY_DOMAIN: &str = "@users.noreply.github.com";

/// An authenticated user as supplied by the session provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub provider_account_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The caller of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Session(SessionUser),
    Guest,
}

impl Identity {
    /// Stable key for cache and ledger entries.
    pub fn key(&self, handle: &str) -> String {
        match self {
            Self::Session(user) => user.id.clone(),
            Self::Guest => format!("guest:{}", handle.to_lowercase()),
        }
    }
}

/// GitHub login syntax: 1-39 ASCII alphanumerics or single hyphens, not
/// starting or ending with a hyphen.
pub fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && !handle.starts_with('-')
        && !handle.ends_with('-')
        && !handle.contains("--")
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Login for a noreply address (`12345+login@users.noreply.github.com` or
/// `login@users.noreply.github.com`).
pub fn handle_from_noreply(email: &str) -> Option<String> {
    let email = email.trim().to_ascii_lowercase();
    let local = email.strip_suffix(NOREPLY_DOMAIN)?;
    let login = match local.split_once('+') {
        Some((id, login)) if id.chars().all(|c| c.is_ascii_digit()) => login,
        Some(_) => return None,
        None => local,
    };
    is_valid_handle(login).then(|| login.to_string())
}

/// Outcome of checking a handle against GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleCheck {
    /// The account exists; carries its canonical login.
    Resolved(String),
    /// GitHub could not answer (rate limit, network).
    Unavailable,
}

/// Check an explicitly supplied handle. Bad syntax and unknown accounts are
/// input errors.
pub async fn verify_handle(api: &dyn GitHubApi, handle: &str) -> Result<HandleCheck, PicksError> {
    if !is_valid_handle(handle) {
        return Err(PicksError::InvalidHandle(handle.to_string()));
    }
    match api.get_user(handle).await {
        Ok(user) => Ok(HandleCheck::Resolved(user.login)),
        Err(e) if is_not_found(&e) => Err(PicksError::InvalidHandle(handle.to_string())),
        Err(e) => {
            warn!(handle, error = %e, "handle lookup failed");
            Ok(HandleCheck::Unavailable)
        }
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<GitHubError>()
        .is_some_and(GitHubError::is_not_found)
}

/// Login of `candidate` when it names a real account.
async fn lookup(api: &dyn GitHubApi, candidate: &str) -> Option<String> {
    if !is_valid_handle(candidate) {
        return None;
    }
    match api.get_user(candidate).await {
        Ok(user) => Some(user.login),
        Err(e) => {
            debug!(candidate, error = %e, "handle candidate rejected");
            None
        }
    }
}

/// One way of deriving a handle from a session.
#[async_trait]
pub trait HandleStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn resolve(&self, user: &SessionUser, api: &dyn GitHubApi) -> Option<String>;
}

/// The handle stored at sign-in.
pub struct StoredHandle;

#[async_trait]
impl HandleStrategy for StoredHandle {
    fn name(&self) -> &'static str {
        "stored_handle"
    }

    async fn resolve(&self, user: &SessionUser, _api: &dyn GitHubApi) -> Option<String> {
        user.github_username
            .as_deref()
            .map(str::trim)
            .filter(|h| is_valid_handle(h))
            .map(str::to_string)
    }
}

/// The OAuth provider account id, when it is a login GitHub recognizes.
pub struct ProviderAccount;

#[async_trait]
impl HandleStrategy for ProviderAccount {
    fn name(&self) -> &'static str {
        "provider_account"
    }

    async fn resolve(&self, user: &SessionUser, api: &dyn GitHubApi) -> Option<String> {
        lookup(api, user.provider_account_id.as_deref()?.trim()).await
    }
}

/// A GitHub noreply e-mail address.
pub struct NoreplyEmail;

#[async_trait]
impl HandleStrategy for NoreplyEmail {
    fn name(&self) -> &'static str {
        "noreply_email"
    }

    async fn resolve(&self, user: &SessionUser, api: &dyn GitHubApi) -> Option<String> {
        let candidate = handle_from_noreply(user.email.as_deref()?)?;
        lookup(api, &candidate).await
    }
}

/// The display name, lowercased with whitespace removed.
pub struct DisplayName;

#[async_trait]
impl HandleStrategy for DisplayName {
    fn name(&self) -> &'static str {
        "display_name"
    }

    async fn resolve(&self, user: &SessionUser, api: &dyn GitHubApi) -> Option<String> {
        let candidate: String = user
            .name
            .as_deref()?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        lookup(api, &candidate).await
    }
}

pub fn default_strategies() -> Vec<Box<dyn HandleStrategy>> {
    vec![
        Box::new(StoredHandle),
        Box::new(ProviderAccount),
        Box::new(NoreplyEmail),
        Box::new(DisplayName),
    ]
}

/// First handle any strategy produces, tried in order.
pub async fn resolve_session_handle(
    strategies: &[Box<dyn HandleStrategy>],
    user: &SessionUser,
    api: &dyn GitHubApi,
) -> Option<String> {
    for strategy in strategies {
        if let Some(handle) = strategy.resolve(user, api).await {
            debug!(strategy = strategy.name(), handle = %handle, "resolved session handle");
            return Some(handle);
        }
    }
    None
}
