//! Ranking-model integration: chat backend, model fallback, parsing and
//! candidate selection.

mod chain;
mod client;
mod parse;
mod prompts;
mod selector;

pub use chain::{AttemptFailure, ChainError, ChainSuccess, ModelChain};
pub use client::{redact_secrets, ChatBackend, ChatClient, ChatRequest};
pub use parse::{parse_explanation, parse_selections, strip_code_fences, AiSelection};
pub use prompts::{batch_prompt, profile_summary, single_prompt, SYSTEM_PROMPT};
pub use selector::{explanation_from, validate_selections, AiPick, AiSelector, ModelExplanation};
