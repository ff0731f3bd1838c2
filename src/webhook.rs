//! Label Event Replication
//!
//! A `label` webhook from one configured repository is mirrored to every
//! other configured repository. Mirroring a change makes GitHub emit the same
//! event for each target; those echoes are recognized and dropped so changes
//! do not bounce between repositories.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::config::Config;
use crate::github::LabelService;
use crate::Result;

/// What happened to the label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Created,
    Edited,
    Deleted,
}

impl fmt::Display for LabelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelAction::Created => f.write_str("created"),
            LabelAction::Edited => f.write_str("edited"),
            LabelAction::Deleted => f.write_str("deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventRepository {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventLabel {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreviousValue {
    pub from: String,
}

/// Previous values of an edited label
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabelChanges {
    pub name: Option<PreviousValue>,
    pub color: Option<PreviousValue>,
}

/// Payload of a `label` webhook event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelEvent {
    pub action: LabelAction,
    pub repository: EventRepository,
    pub label: EventLabel,
    #[serde(default)]
    pub changes: Option<LabelChanges>,
}

impl LabelEvent {
    /// Parse a raw payload
    ///
    /// # Errors
    /// If the payload is not a well-formed label event
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Name the label had before the event
    pub fn previous_name(&self) -> &str {
        self.changes
            .as_ref()
            .and_then(|changes| changes.name.as_ref())
            .map(|name| name.from.as_str())
            .unwrap_or(&self.label.name)
    }

    fn echo_key(&self, repo: &str) -> EchoKey {
        EchoKey {
            repo: repo.to_string(),
            action: self.action,
            name: self.label.name.to_lowercase(),
            // A deleted label's color in the target may differ from the source
            color: match self.action {
                LabelAction::Deleted => None,
                _ => Some(self.label.color.to_lowercase()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EchoKey {
    repo: String,
    action: LabelAction,
    name: String,
    color: Option<String>,
}

/// How long a mirrored mutation waits for its webhook before it is dropped
pub const ECHO_TTL: Duration = Duration::from_secs(120);

/// Mutations this server performed and whose webhooks are still expected
///
/// Each key is counted once per mutation and expires after a TTL, so a lost
/// delivery neither leaks memory nor swallows a later event from a user.
#[derive(Debug)]
pub struct EchoRegistry {
    ttl: Duration,
    pending: Mutex<HashMap<EchoKey, Vec<Instant>>>,
}

impl Default for EchoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoRegistry {
    pub fn new() -> Self {
        Self::with_ttl(ECHO_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn expect(&self, key: EchoKey) {
        let now = Instant::now();
        let mut pending = self.lock();
        self.prune(&mut pending, now);
        pending.entry(key).or_default().push(now);
    }

    /// Drop the most recent expectation for `key`
    fn forget(&self, key: &EchoKey) {
        let mut pending = self.lock();
        if let Some(stamps) = pending.get_mut(key) {
            stamps.pop();
            if stamps.is_empty() {
                pending.remove(key);
            }
        }
    }

    /// Whether `event` is the echo of a replicated change; consumes one entry
    fn consume(&self, event: &LabelEvent) -> bool {
        let key = event.echo_key(&event.repository.full_name);
        let mut pending = self.lock();
        self.prune(&mut pending, Instant::now());

        let Some(stamps) = pending.get_mut(&key) else {
            return false;
        };
        stamps.remove(0);
        if stamps.is_empty() {
            pending.remove(&key);
        }
        true
    }

    /// Number of echoes still expected
    pub fn pending(&self) -> usize {
        let mut pending = self.lock();
        self.prune(&mut pending, Instant::now());
        pending.values().map(Vec::len).sum()
    }

    fn prune(&self, pending: &mut HashMap<EchoKey, Vec<Instant>>, now: Instant) {
        pending.retain(|_, stamps| {
            stamps.retain(|stamp| now.saturating_duration_since(*stamp) < self.ttl);
            !stamps.is_empty()
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EchoKey, Vec<Instant>>> {
        // The map holds no invariants a panicking holder could break
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Result of handling one label event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replication {
    /// The source repository is not configured
    Ignored,

    /// The event was caused by an earlier replication
    Echo,

    /// The change was sent to the other repositories
    Mirrored { succeeded: usize, failed: usize },
}

/// Everything one webhook request works with
pub struct WebhookContext {
    service: Arc<dyn LabelService>,
    config: Arc<Config>,
    targets: Vec<String>,
}

impl WebhookContext {
    /// Build a request context from the configuration snapshot
    ///
    /// # Errors
    /// If the configuration has no `[repos]` section
    pub fn new(service: Arc<dyn LabelService>, config: Arc<Config>) -> Result<Self> {
        let targets = config.repositories()?;
        Ok(Self {
            service,
            config,
            targets,
        })
    }

    /// Repositories kept in sync
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Configuration snapshot the context was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mirror a label event to every other configured repository
    ///
    /// Failures in single target repositories are logged and counted; they do
    /// not stop the remaining targets.
    pub async fn replicate(&self, event: &LabelEvent, echoes: &EchoRegistry) -> Replication {
        let source = &event.repository.full_name;

        if !self.targets.contains(source) {
            tracing::debug!(repo = %source, "ignoring event from unconfigured repository");
            return Replication::Ignored;
        }

        if echoes.consume(event) {
            tracing::debug!(repo = %source, action = %event.action, label = %event.label.name, "ignoring replication echo");
            return Replication::Echo;
        }

        tracing::info!(
            repo = %source,
            action = %event.action,
            label = %event.label.name,
            "replicating label event"
        );

        let (mut succeeded, mut failed) = (0, 0);
        for target in self.targets.iter().filter(|t| *t != source) {
            let key = event.echo_key(target);
            echoes.expect(key.clone());

            match self.mirror(target, event).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    echoes.forget(&key);
                    tracing::warn!(repo = %target, error = %e, "failed to replicate label event");
                    failed += 1;
                }
            }
        }

        Replication::Mirrored { succeeded, failed }
    }

    async fn mirror(&self, target: &str, event: &LabelEvent) -> Result<()> {
        let label = &event.label;
        match event.action {
            LabelAction::Created => {
                self.service
                    .create_label(target, &label.name, &label.color)
                    .await
            }
            LabelAction::Edited => {
                self.service
                    .update_label(target, &label.name, &label.color, Some(event.previous_name()))
                    .await
            }
            LabelAction::Deleted => self.service.delete_label(target, &label.name).await,
        }
    }
}
