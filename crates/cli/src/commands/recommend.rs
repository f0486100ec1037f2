//! Handler for the `recommend` command.

use crate::cli::RecommendArgs;
use anyhow::{Context, Result};
use repopicks_intelligence::{
    Identity, LogProgress, Orchestrator, PicksConfig, RecommendationRequest, SessionUser,
};
use repopicks_state::{default_cache_file, FileKvStore, KvStore, MemoryKvStore};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Exit status for input errors (missing identity, invalid handle).
const EXIT_INPUT_ERROR: u8 = 2;

pub(crate) fn handle_recommend_command(args: RecommendArgs, config: PicksConfig) -> Result<ExitCode> {
    let store = open_store(&args)?;
    let request = build_request(&args);
    let orchestrator = Orchestrator::from_config(config, store)?;

    let rt = Runtime::new()?;
    let outcome = rt.block_on(orchestrator.recommend_with_progress(request, &LogProgress));

    match outcome {
        Ok(recommendations) => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&recommendations)?
            } else {
                serde_json::to_string(&recommendations)?
            };
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(ExitCode::from(EXIT_INPUT_ERROR))
        }
    }
}

fn open_store(args: &RecommendArgs) -> Result<Arc<dyn KvStore>> {
    if args.no_cache {
        return Ok(Arc::new(MemoryKvStore::new()));
    }
    let path = match &args.cache_file {
        Some(path) => path.clone(),
        None => default_cache_file().context("cannot locate the cache file")?,
    };
    Ok(Arc::new(FileKvStore::new(path)))
}

fn build_request(args: &RecommendArgs) -> RecommendationRequest {
    let identity = match &args.user_id {
        Some(id) => Identity::Session(SessionUser {
            id: id.clone(),
            github_username: args.github_username.clone(),
            provider_account_id: args.provider_account_id.clone(),
            email: args.email.clone(),
            name: args.name.clone(),
        }),
        None => Identity::Guest,
    };
    RecommendationRequest {
        identity,
        handle: args.handle.clone(),
        force_refresh: args.refresh,
        include_progress: args.progress,
    }
}
