//! Error Handling
//!
//! Error type definitions used in labelord, and the mapping from errors to
//! process exit codes

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Exit code of a run without errors
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for malformed configuration and other fatal failures
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when no GitHub token has been provided
pub const EXIT_NO_TOKEN: i32 = 3;

/// Exit code when GitHub rejects the credentials
pub const EXIT_BAD_CREDENTIALS: i32 = 4;

/// Exit code when a GitHub resource does not exist
pub const EXIT_NOT_FOUND: i32 = 5;

/// Exit code when no labels specification has been found
pub const EXIT_NO_LABELS: i32 = 6;

/// Exit code when no repositories specification has been found
pub const EXIT_NO_REPOS: i32 = 7;

/// Exit code when the webhook secret is missing
pub const EXIT_NO_WEBHOOK_SECRET: i32 = 8;

/// Exit code of a run that recorded at least one error
pub const EXIT_RUN_ERRORS: i32 = 10;

/// Fatal configuration problems, detected before any repository is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No GitHub token has been provided")]
    MissingToken,

    #[error("No repositories specification has been found")]
    MissingRepos,

    #[error("No labels specification has been found")]
    MissingLabels,

    #[error("No webhook secret has been provided")]
    MissingWebhookSecret,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Process exit code for this configuration problem
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::MissingToken => EXIT_NO_TOKEN,
            ConfigError::MissingRepos => EXIT_NO_REPOS,
            ConfigError::MissingLabels => EXIT_NO_LABELS,
            ConfigError::MissingWebhookSecret => EXIT_NO_WEBHOOK_SECRET,
            ConfigError::Invalid(_) => EXIT_FAILURE,
        }
    }
}

/// Error types for labelord
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub answered with an unexpected status code
    #[error("GitHub: ERROR {status} - {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Label validation error: {0}")]
    LabelValidation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository format: {0} (expected 'owner/repo')")]
    InvalidRepositoryFormat(String),

    #[error("Invalid label color: {0} (expected 6-digit hex)")]
    InvalidLabelColor(String),
}

impl Error {
    /// Create a new remote error from a status code and GitHub's message
    pub fn remote<S: Into<String>>(status: u16, message: S) -> Self {
        Error::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn config_invalid<S: Into<String>>(message: S) -> Self {
        Error::Config(ConfigError::Invalid(message.into()))
    }

    /// Create a new label validation error
    pub fn label_validation<S: Into<String>>(message: S) -> Self {
        Error::LabelValidation(message.into())
    }

    /// Status and message joined as `<status> - <message>`, the form used in
    /// reporter lines. `None` for errors that did not come from GitHub.
    pub fn code_message(&self) -> Option<String> {
        match self {
            Error::Remote { status, message } => Some(format!("{status} - {message}")),
            _ => None,
        }
    }

    /// Detail line for reporter events; falls back to the display form
    pub fn event_detail(&self) -> String {
        self.code_message().unwrap_or_else(|| self.to_string())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(config) => config.exit_code(),
            Error::Remote { status: 401, .. } => EXIT_BAD_CREDENTIALS,
            Error::Remote { status: 404, .. } => EXIT_NOT_FOUND,
            Error::Remote { .. } | Error::Http(_) => EXIT_RUN_ERRORS,
            Error::Json(_)
            | Error::Yaml(_)
            | Error::Toml(_)
            | Error::LabelValidation(_)
            | Error::Io(_)
            | Error::InvalidRepositoryFormat(_)
            | Error::InvalidLabelColor(_) => EXIT_FAILURE,
        }
    }
}
