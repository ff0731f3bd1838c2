//! labelord CLI
//!
//! Command line tool for keeping GitHub labels in sync across repositories

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use labelord::config::{load_config, parse_repository};
use labelord::error::{EXIT_FAILURE, EXIT_SUCCESS};
use labelord::server::{self, AppState};
use labelord::{Config, Execution, GitHubClient, LabelService, Mode, Result, RunProcessor, Verbosity};

/// labelord CLI
///
/// Global label management for GitHub repositories
#[derive(Parser)]
#[command(
    name = "labelord",
    version,
    about = "Global label management for GitHub repositories",
    long_about = "Synchronize label names and colors across many GitHub repositories, \
    once from the command line or continuously through a label webhook."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path of the auth config file (.toml, .yaml or .yml)
    #[arg(short = 'c', long, env = "LABELORD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// GitHub API token
    #[arg(short = 't', long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listing accessible repositories
    ListRepos,

    /// Listing labels of desired repository
    ListLabels {
        /// Repository (owner/repo)
        repository: String,
    },

    /// Run labels processing
    Run {
        /// Keep extra labels (update) or delete them (replace)
        #[arg(value_enum)]
        mode: ModeArg,

        /// Repository which serves as labels template
        #[arg(short = 'r', long)]
        template_repo: Option<String>,

        /// Proceed with just dry run
        #[arg(short = 'd', long)]
        dry_run: bool,

        /// Really exhaustive output
        #[arg(short, long)]
        verbose: bool,

        /// No output at all
        #[arg(short, long)]
        quiet: bool,

        /// Run for all repositories available
        #[arg(short, long)]
        all_repos: bool,
    },

    /// Run master-to-master replication server
    RunServer {
        /// The interface to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// The port to bind to
        #[arg(short, long, default_value_t = 5000)]
        port: u16,

        /// Turns on DEBUG mode
        #[arg(short, long)]
        debug: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Update,
    Replace,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Update => Mode::Update,
            ModeArg::Replace => Mode::Replace,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::RunServer { debug: true, .. }));

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            e.exit_code()
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Install the stderr log subscriber; `RUST_LOG` takes precedence
fn init_tracing(debug: bool) {
    let default = if debug { "labelord=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Execute a command and return the process exit code
async fn dispatch(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?.with_token(cli.token);

    match cli.command {
        Commands::ListRepos => {
            let client = github_client(&config)?;
            for repo in client.list_repositories().await? {
                println!("{repo}");
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::ListLabels { repository } => {
            parse_repository(&repository)?;
            let client = github_client(&config)?;
            for (name, color) in client.list_labels(&repository).await? {
                println!("#{color} {name}");
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Run {
            mode,
            template_repo,
            dry_run,
            verbose,
            quiet,
            all_repos,
        } => {
            let client = github_client(&config)?;
            let source = config.label_source(template_repo.as_deref())?;
            let repos = if all_repos {
                client.list_repositories().await?
            } else {
                config.repositories()?
            };
            let labels = source.resolve(&client).await?;

            let reporter = Verbosity::from_flags(verbose, quiet).stdout_reporter();
            let mut processor =
                RunProcessor::with_execution(&client, reporter, Execution::from_dry_run(dry_run));
            let status = processor.run(&repos, &labels, mode.into()).await;
            Ok(status.exit_code())
        }

        Commands::RunServer { host, port, .. } => {
            let client = github_client(&config)?;
            let state = AppState::new(Arc::new(client), config)?;
            if let Err(e) = server::serve(state, &host, port).await {
                eprintln!("{}", format!("Server error: {e:#}").red());
                return Ok(EXIT_FAILURE);
            }
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Build the API client from the configured token
fn github_client(config: &Config) -> Result<GitHubClient> {
    GitHubClient::new(config.token()?)
}
