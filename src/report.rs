//! Run Reporting
//!
//! Reporters receive one event per remote action, count errors and processed
//! repositories, and render output according to the chosen verbosity. The
//! counts are identical for every verbosity; only the printed lines differ.

use std::collections::HashSet;
use std::fmt;
use std::io::Write;

/// Kind of action an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Update,
    Delete,
    /// Listing the labels of a repository
    ListLabels,
}

impl EventKind {
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::Create => "ADD",
            EventKind::Update => "UPD",
            EventKind::Delete => "DEL",
            EventKind::ListLabels => "LBL",
        }
    }
}

/// Outcome of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    /// Planned but not executed
    Dry,
}

impl Outcome {
    pub fn tag(self) -> &'static str {
        match self {
            Outcome::Success => "SUC",
            Outcome::Error => "ERR",
            Outcome::Dry => "DRY",
        }
    }
}

/// One reported action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub outcome: Outcome,
    pub repo: String,
    /// Free-form details: label name, color, and on errors the remote message
    pub details: Vec<String>,
}

impl Event {
    pub fn new<R: Into<String>>(
        kind: EventKind,
        outcome: Outcome,
        repo: R,
        details: Vec<String>,
    ) -> Self {
        Self {
            kind,
            outcome,
            repo: repo.into(),
            details,
        }
    }

    fn joined(&self, head: String) -> String {
        std::iter::once(head)
            .chain(self.details.iter().cloned())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Receives events during a run and renders the summary at its end
pub trait Reporter: Send {
    /// Counters of this run
    fn tally(&self) -> &Tally;

    fn tally_mut(&mut self) -> &mut Tally;

    /// Record one action outcome
    fn event(&mut self, event: Event);

    /// Render (and print, depending on verbosity) the final summary line
    fn summary(&mut self) -> String;

    /// Count a repository as processed
    fn add_repo(&mut self, slug: &str) {
        self.tally_mut().add_repo(slug);
    }

    /// Number of error events so far
    fn error_count(&self) -> usize {
        self.tally().errors()
    }

    /// Number of distinct processed repositories
    fn repo_count(&self) -> usize {
        self.tally().repo_count()
    }
}

/// Counters shared by every reporter
#[derive(Debug, Default)]
pub struct Tally {
    repos: HashSet<String>,
    errors: usize,
}

impl Tally {
    pub fn add_repo(&mut self, slug: &str) {
        self.repos.insert(slug.to_string());
    }

    pub fn record(&mut self, event: &Event) {
        if event.outcome == Outcome::Error {
            self.errors += 1;
        }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn repo_count(&self) -> usize {
        self.repos.len()
    }

    /// Summary sentence without the verbosity-specific prefix
    pub fn summary_text(&self) -> String {
        if self.errors > 0 {
            format!("{} error(s) in total, please check log above", self.errors)
        } else {
            format!("{} repo(s) updated successfully", self.repos.len())
        }
    }
}

/// Output sink of printing reporters
pub type Output = Box<dyn Write + Send>;

fn emit(out: &mut Output, line: &str) {
    if let Err(e) = writeln!(out, "{line}") {
        tracing::warn!(error = %e, "failed to write report line");
    }
}

/// Prints error events and the summary
pub struct DefaultReporter {
    tally: Tally,
    out: Output,
}

impl DefaultReporter {
    pub fn new(out: Output) -> Self {
        Self {
            tally: Tally::default(),
            out,
        }
    }

    /// Line printed for an event, if any
    pub fn render(event: &Event) -> Option<String> {
        (event.outcome == Outcome::Error).then(|| {
            event.joined(format!("ERROR: {}; {}", event.kind.tag(), event.repo))
        })
    }
}

impl Reporter for DefaultReporter {
    fn tally(&self) -> &Tally {
        &self.tally
    }

    fn tally_mut(&mut self) -> &mut Tally {
        &mut self.tally
    }

    fn event(&mut self, event: Event) {
        self.tally.record(&event);
        if let Some(line) = Self::render(&event) {
            emit(&mut self.out, &line);
        }
    }

    fn summary(&mut self) -> String {
        let line = format!("SUMMARY: {}", self.tally.summary_text());
        emit(&mut self.out, &line);
        line
    }
}

/// Prints every event and the summary
pub struct VerboseReporter {
    tally: Tally,
    out: Output,
}

impl VerboseReporter {
    pub fn new(out: Output) -> Self {
        Self {
            tally: Tally::default(),
            out,
        }
    }

    pub fn render(event: &Event) -> String {
        event.joined(format!(
            "[{}][{}] {}",
            event.kind.tag(),
            event.outcome.tag(),
            event.repo
        ))
    }
}

impl Reporter for VerboseReporter {
    fn tally(&self) -> &Tally {
        &self.tally
    }

    fn tally_mut(&mut self) -> &mut Tally {
        &mut self.tally
    }

    fn event(&mut self, event: Event) {
        self.tally.record(&event);
        emit(&mut self.out, &Self::render(&event));
    }

    fn summary(&mut self) -> String {
        let line = format!("[SUMMARY] {}", self.tally.summary_text());
        emit(&mut self.out, &line);
        line
    }
}

/// Counts without printing
#[derive(Debug, Default)]
pub struct QuietReporter {
    tally: Tally,
}

impl QuietReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for QuietReporter {
    fn tally(&self) -> &Tally {
        &self.tally
    }

    fn tally_mut(&mut self) -> &mut Tally {
        &mut self.tally
    }

    fn event(&mut self, event: Event) {
        self.tally.record(&event);
    }

    fn summary(&mut self) -> String {
        self.tally.summary_text()
    }
}

/// Output verbosity chosen on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Default,
    Verbose,
    Quiet,
}

impl Verbosity {
    /// Resolve the `--verbose` / `--quiet` flags; both together cancel out
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, false) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            _ => Verbosity::Default,
        }
    }

    /// Build the matching reporter writing to `out`
    pub fn reporter(self, out: Output) -> Box<dyn Reporter> {
        match self {
            Verbosity::Default => Box::new(DefaultReporter::new(out)),
            Verbosity::Verbose => Box::new(VerboseReporter::new(out)),
            Verbosity::Quiet => Box::new(QuietReporter::new()),
        }
    }

    /// Build the matching reporter writing to stdout
    pub fn stdout_reporter(self) -> Box<dyn Reporter> {
        self.reporter(Box::new(std::io::stdout()))
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::Default => f.write_str("default"),
            Verbosity::Verbose => f.write_str("verbose"),
            Verbosity::Quiet => f.write_str("quiet"),
        }
    }
}
