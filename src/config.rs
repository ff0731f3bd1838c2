//! Configuration Management
//!
//! The configuration file lists the GitHub credentials, the repositories to
//! keep in sync, and the desired labels (or a template repository to copy
//! them from).
//!
//! ```toml
//! [github]
//! token = "ghp_..."
//! webhook_secret = "..."
//!
//! [repos]
//! "octo/website" = true
//! "octo/archive" = false
//!
//! [labels]
//! bug = "d73a4a"
//! enhancement = "a2eeef"
//!
//! [others]
//! template-repo = "octo/labels"
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::github::LabelService;
use crate::plan::LabelSpec;

/// Configuration file used when none is given
pub const DEFAULT_CONFIG_FILE: &str = "./config.toml";

/// `[github]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GitHubSection {
    /// Personal access token
    pub token: Option<String>,

    /// Shared secret of the label webhook
    pub webhook_secret: Option<String>,
}

/// `[others]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OthersSection {
    /// Repository whose labels serve as the specification
    #[serde(rename = "template-repo")]
    pub template_repo: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubSection,

    /// Repository slug to participation flag
    pub repos: Option<IndexMap<String, bool>>,

    /// Label name to color, in file order
    pub labels: Option<LabelSpec>,

    #[serde(default)]
    pub others: OthersSection,
}

/// Where the desired labels come from
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSource {
    /// Live labels of a template repository
    Template(String),

    /// Labels listed in the configuration
    Static(LabelSpec),
}

impl LabelSource {
    /// Produce the label specification, fetching the template if needed
    ///
    /// # Errors
    /// Returns the remote error if the template repository cannot be listed
    pub async fn resolve(self, service: &dyn LabelService) -> Result<LabelSpec> {
        match self {
            LabelSource::Template(slug) => {
                tracing::info!(template = %slug, "loading labels from template repository");
                service.list_labels(&slug).await
            }
            LabelSource::Static(labels) => Ok(labels),
        }
    }
}

impl Config {
    /// Validate the configuration and normalize label colors
    ///
    /// # Errors
    /// - If a repository key is not `owner/repo`
    /// - If a label name is empty or its color is not 6 hex digits
    pub fn validated(mut self) -> Result<Self> {
        if let Some(repos) = &self.repos {
            for slug in repos.keys() {
                parse_repository(slug)?;
            }
        }

        if let Some(labels) = &mut self.labels {
            for (name, color) in labels.iter_mut() {
                if name.trim().is_empty() {
                    return Err(Error::label_validation("Label name cannot be empty"));
                }
                let normalized = normalize_color(color);
                if !is_valid_hex_color(&normalized) {
                    return Err(Error::InvalidLabelColor(format!("{name} = {color}")));
                }
                *color = normalized;
            }
        }

        if let Some(template) = &self.others.template_repo {
            parse_repository(template)?;
        }

        Ok(self)
    }

    /// Override the configured token, e.g. from `--token` or `GITHUB_TOKEN`
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token {
            self.github.token = Some(token);
        }
        self
    }

    /// The GitHub token
    ///
    /// # Errors
    /// [`ConfigError::MissingToken`] if no non-empty token is configured
    pub fn token(&self) -> Result<&str> {
        non_empty(self.github.token.as_deref()).ok_or_else(|| ConfigError::MissingToken.into())
    }

    /// The webhook secret
    ///
    /// # Errors
    /// [`ConfigError::MissingWebhookSecret`] if no non-empty secret is configured
    pub fn webhook_secret(&self) -> Result<&str> {
        non_empty(self.github.webhook_secret.as_deref())
            .ok_or_else(|| ConfigError::MissingWebhookSecret.into())
    }

    /// Repositories enabled in the `[repos]` section, in file order
    ///
    /// # Errors
    /// [`ConfigError::MissingRepos`] if there is no `[repos]` section
    pub fn repositories(&self) -> Result<Vec<String>> {
        let repos = self.repos.as_ref().ok_or(ConfigError::MissingRepos)?;
        Ok(repos
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(slug, _)| slug.clone())
            .collect())
    }

    /// Pick the label source: explicit template, configured template, then
    /// the `[labels]` section
    ///
    /// # Errors
    /// - [`ConfigError::MissingLabels`] if none of them is available
    /// - [`Error::InvalidRepositoryFormat`] for a malformed template repository
    pub fn label_source(&self, template_repo: Option<&str>) -> Result<LabelSource> {
        if let Some(template) = template_repo.or(self.others.template_repo.as_deref()) {
            parse_repository(template)?;
            return Ok(LabelSource::Template(template.to_string()));
        }
        self.labels
            .clone()
            .map(LabelSource::Static)
            .ok_or_else(|| ConfigError::MissingLabels.into())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Some(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }
}

/// Parse and validate configuration content
///
/// # Errors
/// If parsing or validation fails
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config> {
    let config: Config = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Yaml if content.trim().is_empty() => Config::default(),
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };
    config.validated()
}

/// Load configuration from a file, detecting format by extension
///
/// # Errors
/// If the file is missing, unreadable, has an unsupported extension, or
/// fails parsing or validation
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path).ok_or_else(|| {
        Error::config_invalid(format!(
            "Configuration file must be .toml, .yaml, or .yml: {}",
            path.display()
        ))
    })?;
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, format)
}

/// Load the configuration the CLI runs with
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is read
/// if present, else the configuration is empty.
///
/// # Errors
/// If loading an existing or explicitly named file fails
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config_from_file(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                load_config_from_file(default)
            } else {
                tracing::debug!("no configuration file found, using empty configuration");
                Ok(Config::default())
            }
        }
    }
}

/// Parse repository string into owner and name
///
/// Both parts may only contain ASCII letters, digits, `-`, `_` and `.`, and
/// neither may be `.` or `..`, so a slug is always safe to put in a URL path.
///
/// # Errors
/// Returns an error if the format is not `owner/repo`
pub fn parse_repository(repo: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || !parts.iter().all(|part| is_valid_slug_part(part)) {
        return Err(Error::InvalidRepositoryFormat(repo.to_string()));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

fn is_valid_slug_part(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Strip a leading `#`; the case of hex digits is kept as written
pub fn normalize_color(color: &str) -> String {
    color.trim().trim_start_matches('#').to_string()
}

/// Validate hex color code (6 hex digits, without #)
fn is_valid_hex_color(color: &str) -> bool {
    color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit())
}
