use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the `repopicks` application.
#[derive(Debug, Parser)]
#[command(
    name = "repopicks",
    version,
    about = "Personalized open-source contribution picks for a GitHub account"
)]
pub struct Cli {
    /// TOML configuration file (defaults to `~/.repopicks/config.toml` when present).
    #[arg(long, global = true, value_name = "FILE", env = "REPOPICKS_CONFIG_PATH")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

/// Available `repopicks` commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Runs one recommendation cycle and prints the picks as JSON.
    Recommend(RecommendArgs),
    /// Prints the effective configuration as TOML.
    Config,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// GitHub handle to recommend for (guest mode unless a session is given).
    #[arg(long, value_name = "HANDLE")]
    pub handle: Option<String>,
    /// Session user id; enables handle derivation from the session fields below.
    #[arg(long, value_name = "ID")]
    pub user_id: Option<String>,
    /// Handle stored with the session at sign-in.
    #[arg(long, value_name = "HANDLE", requires = "user_id")]
    pub github_username: Option<String>,
    /// OAuth provider account id of the session.
    #[arg(long, value_name = "ID", requires = "user_id")]
    pub provider_account_id: Option<String>,
    /// Session e-mail address.
    #[arg(long, value_name = "EMAIL", requires = "user_id")]
    pub email: Option<String>,
    /// Session display name.
    #[arg(long, value_name = "NAME", requires = "user_id")]
    pub name: Option<String>,
    /// Discard cached picks and avoid recently shown repositories.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
    /// Include progress checkpoints in the output.
    #[arg(long, default_value_t = false)]
    pub progress: bool,
    /// Cache file (defaults to `~/.repopicks/cache.json`).
    #[arg(long, value_name = "FILE", conflicts_with = "no_cache")]
    pub cache_file: Option<PathBuf>,
    /// Keep the result cache and rotation ledger in memory for this run only.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
    /// Pretty-print the JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_guest_recommend() {
        let cli = Cli::try_parse_from(["repopicks", "recommend", "--handle", "octo", "--refresh"])
            .unwrap();
        match cli.command {
            Commands::Recommend(args) => {
                assert_eq!(args.handle.as_deref(), Some("octo"));
                assert!(args.refresh);
                assert!(args.user_id.is_none());
            }
            Commands::Config => panic!("expected recommend"),
        }
    }

    #[test]
    fn test_session_fields_require_user_id() {
        assert!(Cli::try_parse_from(["repopicks", "recommend", "--email", "a@b.c"]).is_err());
        assert!(Cli::try_parse_from([
            "repopicks",
            "recommend",
            "--user-id",
            "u1",
            "--email",
            "a@b.c"
        ])
        .is_ok());
    }

    #[test]
    fn test_cache_file_conflicts_with_no_cache() {
        assert!(Cli::try_parse_from([
            "repopicks",
            "recommend",
            "--cache-file",
            "/tmp/x.json",
            "--no-cache"
        ])
        .is_err());
    }
}
