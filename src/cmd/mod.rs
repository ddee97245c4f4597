//! dist - CLI surface
//!
//! One module per subcommand; `Cli` is the clap entry point the binary
//! parses and hands back to [`execute`].

pub mod clean;
pub mod completions;
pub mod info;
pub mod install;
pub mod list;
pub mod proof;
pub mod run;
pub mod uninstall;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "dist")]
#[command(author, version, about = "Install pre-built binaries from GitHub and GitLab releases")]
pub struct Cli {
    /// Configuration file to use
    #[arg(long, short = 'c', global = true, env = "DISTILLERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (pretty or json)
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a binary: [provider/]owner/repo[@version]
    Install(install::InstallArgs),
    /// List installed binaries and versions
    List,
    /// Emit a Distfile reproducing the installed set
    #[command(alias = "export")]
    Proof {
        /// Include only the latest version of each binary
        #[arg(long, short = 'l', env = "DISTILLERY_PROOF_LATEST_ONLY")]
        latest_only: bool,
    },
    /// Run a Distfile to install binaries
    Run {
        /// Distfile path; defaults to ./Distfile then $HOME/Distfile
        distfile: Option<PathBuf>,
        /// Number of parallel installs to run
        #[arg(long, short = 'p', default_value_t = 1)]
        parallel: usize,
    },
    /// Uninstall a binary and all of its versions
    Uninstall {
        /// Target to uninstall: [provider/]owner/repo
        spec: String,
        /// Perform all actions instead of the default dry run
        #[arg(long)]
        no_dry_run: bool,
    },
    /// General information about the tool and its configuration
    Info,
    /// Remove cached downloads and metadata
    Clean,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Load config and dispatch the parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let config_file = cli.config.clone().unwrap_or_else(Config::default_file);
    let config = Config::load(&config_file)?;

    match cli.command {
        Commands::Install(args) => install::execute(&config, args).await,
        Commands::List => list::execute(&config),
        Commands::Proof { latest_only } => proof::execute(&config, latest_only),
        Commands::Run { distfile, parallel } => run::execute(&config, distfile, parallel).await,
        Commands::Uninstall { spec, no_dry_run } => uninstall::execute(&config, &spec, no_dry_run),
        Commands::Info => info::execute(&config),
        Commands::Clean => clean::execute(&config),
        Commands::Completions { shell } => {
            completions::execute(shell);
            Ok(())
        }
    }
}
