//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hubcas - download CAS-backed files from a model hub
#[derive(Parser)]
#[command(name = "hubcas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Download CAS-backed files from a model hub")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (JSON on stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hub endpoint, overriding the config file and HF_ENDPOINT
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Hub access token
    #[arg(long, global = true, env = "HF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a repository file to its content descriptor
    Resolve {
        /// Repository: owner/name or {models|datasets|spaces}/owner/name
        repo: String,

        /// File path inside the repository
        path: String,

        /// Branch, tag or commit
        #[arg(short, long)]
        revision: Option<String>,
    },

    /// Request a short-lived CAS access token
    Token {
        repo: String,

        #[arg(short, long)]
        revision: Option<String>,

        /// Request an upload-scoped token
        #[arg(long)]
        upload: bool,
    },

    /// Download repository files into a directory
    #[command(alias = "dl")]
    Download {
        repo: String,

        /// File paths inside the repository
        #[arg(required = true)]
        paths: Vec<String>,

        /// Destination directory
        #[arg(short, long, value_name = "DIR")]
        dest: PathBuf,

        #[arg(short, long)]
        revision: Option<String>,

        /// Keep files that succeeded when others fail
        #[arg(long)]
        partial: bool,
    },

    /// Remove staging files left behind by interrupted downloads
    Sweep {
        dir: PathBuf,

        /// Minimum age in seconds [default: transfer.staging_grace_secs]
        #[arg(long, value_name = "SECS")]
        grace_secs: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_download_with_globals() {
        let cli = Cli::try_parse_from([
            "hubcas",
            "download",
            "Qwen/Qwen3-0.6B",
            "tokenizer.json",
            "config.json",
            "--dest",
            "out",
            "--partial",
            "--json",
            "--endpoint",
            "http://localhost:8080",
        ])
        .unwrap();

        assert!(cli.global.json);
        assert_eq!(cli.global.endpoint.as_deref(), Some("http://localhost:8080"));
        match cli.command {
            Commands::Download {
                repo,
                paths,
                dest,
                partial,
                revision,
            } => {
                assert_eq!(repo, "Qwen/Qwen3-0.6B");
                assert_eq!(paths, vec!["tokenizer.json", "config.json"]);
                assert_eq!(dest, PathBuf::from("out"));
                assert!(partial);
                assert!(revision.is_none());
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn download_requires_paths() {
        assert!(Cli::try_parse_from(["hubcas", "download", "a/b", "--dest", "out"]).is_err());
    }
}
