//! # labelord
//!
//! Keep issue labels consistent across many GitHub repositories
//!
//! ## Features
//! - One-shot reconciliation of labels in `update` or `replace` mode
//! - Labels from the configuration or from a template repository
//! - Dry-run mode
//! - Webhook server replicating label changes between repositories

pub mod config;
pub mod error;
pub mod github;
pub mod pagination;
pub mod plan;
pub mod report;
pub mod server;
pub mod signature;
pub mod sync;
pub mod webhook;

pub use config::{Config, LabelSource};
pub use error::{ConfigError, Error, Result};
pub use github::{GitHubClient, LabelService, LabelSet};
pub use plan::{ActionSet, LabelChange, LabelSpec, Mode};
pub use report::{Event, EventKind, Outcome, Reporter, Verbosity};
pub use sync::{Execution, RunProcessor, RunStatus};

/// Reconcile the labels of `repositories` with `labels`
///
/// # Examples
///
/// ```rust,no_run
/// use labelord::{GitHubClient, Mode, Verbosity};
///
/// #[tokio::main]
/// async fn main() -> labelord::Result<()> {
///     let client = GitHubClient::new("your_github_token")?;
///     let labels = [("bug".to_string(), "d73a4a".to_string())].into_iter().collect();
///     let repos = vec!["owner/repo".to_string()];
///
///     let status = labelord::sync_labels(&client, &repos, &labels, Mode::Update, false).await;
///     std::process::exit(status.exit_code());
/// }
/// ```
pub async fn sync_labels(
    service: &dyn LabelService,
    repositories: &[String],
    labels: &LabelSpec,
    mode: Mode,
    dry_run: bool,
) -> RunStatus {
    let mut processor = RunProcessor::with_execution(
        service,
        Verbosity::Default.stdout_reporter(),
        Execution::from_dry_run(dry_run),
    );
    processor.run(repositories, labels, mode).await
}
