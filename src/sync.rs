//! Label Synchronization Functionality
//!
//! Runs the reconciliation over a list of repositories: fetch the current
//! labels, plan, then apply creates, updates and deletes in that order.
//! Repositories are processed one after another; a failure is reported and
//! never stops the remaining actions or repositories.

use indexmap::IndexMap;

use crate::error::{EXIT_RUN_ERRORS, EXIT_SUCCESS};
use crate::github::LabelService;
use crate::plan::{LabelChange, LabelSpec, Mode};
use crate::report::{Event, EventKind, Outcome, Reporter};

/// Whether planned actions are sent to GitHub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Perform the mutations
    #[default]
    Apply,

    /// Only report what would be done
    DryRun,
}

impl Execution {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Execution::DryRun
        } else {
            Execution::Apply
        }
    }
}

/// Remote mutation applied for a planned change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    fn event_kind(self) -> EventKind {
        match self {
            Action::Create => EventKind::Create,
            Action::Update => EventKind::Update,
            Action::Delete => EventKind::Delete,
        }
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed { errors: usize },
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => EXIT_SUCCESS,
            RunStatus::Failed { .. } => EXIT_RUN_ERRORS,
        }
    }

    fn from_errors(errors: usize) -> Self {
        if errors == 0 {
            RunStatus::Success
        } else {
            RunStatus::Failed { errors }
        }
    }
}

/// Label Synchronization Engine
///
/// Drives planning and execution over repositories and feeds every outcome
/// to the reporter.
pub struct RunProcessor<'a> {
    service: &'a dyn LabelService,
    reporter: Box<dyn Reporter>,
    execution: Execution,
}

impl<'a> RunProcessor<'a> {
    /// Create a processor that applies changes
    pub fn new(service: &'a dyn LabelService, reporter: Box<dyn Reporter>) -> Self {
        Self::with_execution(service, reporter, Execution::Apply)
    }

    /// Create a processor that only reports planned changes
    pub fn dry_run(service: &'a dyn LabelService, reporter: Box<dyn Reporter>) -> Self {
        Self::with_execution(service, reporter, Execution::DryRun)
    }

    pub fn with_execution(
        service: &'a dyn LabelService,
        reporter: Box<dyn Reporter>,
        execution: Execution,
    ) -> Self {
        Self {
            service,
            reporter,
            execution,
        }
    }

    /// The reporter collecting this processor's events
    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// Synchronize labels of every repository, then print the summary
    ///
    /// # Returns
    /// [`RunStatus::Success`] if and only if no error was reported
    pub async fn run(&mut self, slugs: &[String], desired: &LabelSpec, mode: Mode) -> RunStatus {
        tracing::info!(
            repos = slugs.len(),
            labels = desired.len(),
            %mode,
            execution = ?self.execution,
            "starting run"
        );

        for slug in slugs {
            self.run_one(slug, desired, mode).await;
        }

        self.reporter.summary();
        RunStatus::from_errors(self.reporter.error_count())
    }

    async fn run_one(&mut self, slug: &str, desired: &LabelSpec, mode: Mode) {
        self.reporter.add_repo(slug);

        let current = match self.service.list_labels(slug).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(%slug, error = %e, "cannot list labels, skipping repository");
                self.reporter.event(Event::new(
                    EventKind::ListLabels,
                    Outcome::Error,
                    slug,
                    vec![e.event_detail()],
                ));
                return;
            }
        };

        let actions = mode.plan(&current, desired);
        tracing::info!(
            %slug,
            create = actions.create.len(),
            update = actions.update.len(),
            delete = actions.delete.len(),
            "planned repository"
        );

        self.process(slug, Action::Create, &actions.create).await;
        self.process(slug, Action::Update, &actions.update).await;
        self.process(slug, Action::Delete, &actions.delete).await;
    }

    async fn process(
        &mut self,
        slug: &str,
        action: Action,
        changes: &IndexMap<String, LabelChange>,
    ) {
        for (old_name, change) in changes {
            let mut details = vec![change.name.clone(), change.color.clone()];

            let outcome = match self.execution {
                Execution::DryRun => Outcome::Dry,
                Execution::Apply => match self.execute(slug, action, old_name, change).await {
                    Ok(()) => Outcome::Success,
                    Err(e) => {
                        tracing::warn!(%slug, label = %old_name, error = %e, "label action failed");
                        details.push(e.event_detail());
                        Outcome::Error
                    }
                },
            };

            self.reporter
                .event(Event::new(action.event_kind(), outcome, slug, details));
        }
    }

    async fn execute(
        &self,
        slug: &str,
        action: Action,
        old_name: &str,
        change: &LabelChange,
    ) -> crate::Result<()> {
        match action {
            Action::Create => {
                self.service
                    .create_label(slug, &change.name, &change.color)
                    .await
            }
            Action::Update => {
                self.service
                    .update_label(slug, &change.name, &change.color, Some(old_name))
                    .await
            }
            Action::Delete => self.service.delete_label(slug, old_name).await,
        }
    }
}
