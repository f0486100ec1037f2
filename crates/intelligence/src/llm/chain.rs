//! Ordered model fallback.

use super::client::{redact_secrets, ChatBackend, ChatRequest};
use anyhow::Result;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Why one model attempt did not win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub model: String,
    pub error: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("no models configured")]
    NoModels,
    #[error("all {} models failed: {}", .attempts.len(), summarize(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of the first model whose response was accepted.
#[derive(Debug, Clone)]
pub struct ChainSuccess<T> {
    pub model: String,
    pub value: T,
}

/// Backend models tried in order; the first accepted response wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    models: Vec<String>,
}

impl ModelChain {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Try each model under `timeout`. `accept` turns completion text into a
    /// value or rejects it, in which case the next model is tried.
    pub async fn run<T, F>(
        &self,
        backend: &dyn ChatBackend,
        request: &ChatRequest,
        timeout: Duration,
        accept: F,
    ) -> Result<ChainSuccess<T>, ChainError>
    where
        F: Fn(&str) -> Result<T>,
    {
        if self.models.is_empty() {
            return Err(ChainError::NoModels);
        }

        let mut attempts = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let error = match tokio::time::timeout(timeout, backend.complete(model, request)).await
            {
                Err(_) => format!("timed out after {}ms", timeout.as_millis()),
                Ok(Err(e)) => redact_secrets(&format!("{e:#}")),
                Ok(Ok(text)) => match accept(&text) {
                    Ok(value) => {
                        info!(model = %model, "model attempt succeeded");
                        return Ok(ChainSuccess {
                            model: model.clone(),
                            value,
                        });
                    }
                    Err(e) => redact_secrets(&format!("unusable response: {e:#}")),
                },
            };
            warn!(model = %model, error = %error, "model attempt failed");
            attempts.push(AttemptFailure {
                model: model.clone(),
                error,
            });
        }
        Err(ChainError::Exhausted { attempts })
    }
}
