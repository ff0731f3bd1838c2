//! GitHub API Client
//!
//! Module for managing interactions with the GitHub label API

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::parse_repository;
use crate::error::{ConfigError, Error, Result};
use crate::pagination::{next_page_url, PER_PAGE};

/// Public GitHub API endpoint
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Client identifier sent with every request
pub const USER_AGENT: &str = concat!("labelord/", env!("CARGO_PKG_VERSION"));

/// Labels of one repository: name (as GitHub returns it) to color
pub type LabelSet = IndexMap<String, String>;

/// Encode a string for use in URL path segments (RFC 3986 with UTF-8 support)
///
/// Only unreserved characters (A-Z, a-z, 0-9, -, ., _, ~) are left unencoded.
pub fn encode_path_segment(input: &str) -> String {
    input
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Label as returned by the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteLabel {
    /// Label name
    pub name: String,

    /// Label color (6-digit hexadecimal, without #)
    pub color: String,
}

/// Repository as returned by `GET /user/repos`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRepository {
    /// Repository slug (`owner/name`)
    pub full_name: String,
}

#[derive(Debug, Serialize)]
struct LabelBody<'a> {
    name: &'a str,
    color: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Label operations on a repository
///
/// Implemented by [`GitHubClient`]; the run processor and the webhook
/// replication only talk to this trait.
#[async_trait]
pub trait LabelService: Send + Sync {
    /// Slugs of all repositories accessible to the authenticated user
    async fn list_repositories(&self) -> Result<Vec<String>>;

    /// All labels of a repository
    async fn list_labels(&self, slug: &str) -> Result<LabelSet>;

    /// Create a label; an already existing label is an error
    async fn create_label(&self, slug: &str, name: &str, color: &str) -> Result<()>;

    /// Update a label, addressed by `old_name` when renaming, else by `name`
    async fn update_label(
        &self,
        slug: &str,
        name: &str,
        color: &str,
        old_name: Option<&str>,
    ) -> Result<()>;

    /// Delete a label
    async fn delete_label(&self, slug: &str, name: &str) -> Result<()>;
}

/// GitHub API Client
///
/// Every request carries the bearer token given at construction time.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Create a client for the public GitHub API
    ///
    /// # Errors
    /// Returns an error if the token cannot be used as a header value or the
    /// HTTP client cannot be built
    pub fn new(access_token: &str) -> Result<Self> {
        Self::with_base_url(access_token, GITHUB_API_URL)
    }

    /// Create a client for an API served at `base_url`
    ///
    /// # Errors
    /// Returns an error if the base URL or token is invalid
    pub fn with_base_url(access_token: &str, base_url: &str) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| Error::config_invalid(format!("invalid API URL {base_url}: {e}")))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| ConfigError::Invalid("GitHub token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::config_invalid(format!("invalid API path {path}: {e}")))
    }

    /// `/repos/{owner}/{repo}/labels`, rejecting slugs that would alter the path
    fn labels_path(slug: &str) -> Result<String> {
        let (owner, repo) = parse_repository(slug)?;
        Ok(format!("/repos/{owner}/{repo}/labels"))
    }

    fn label_endpoint(&self, slug: &str, name: &str) -> Result<Url> {
        self.endpoint(&format!(
            "{}/{}",
            Self::labels_path(slug)?,
            encode_path_segment(name)
        ))
    }

    /// Fetch a complete collection, following `next` links until exhausted
    ///
    /// Any page answered with something other than 200 fails the whole fetch;
    /// no partial data is returned.
    ///
    /// # Errors
    /// Returns [`Error::Remote`] on an unexpected status, or a transport /
    /// decoding error
    pub async fn fetch_all<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>> {
        let mut url = self.endpoint(resource)?;
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", "1");

        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(page_url) = next {
            tracing::debug!(url = %page_url, "fetching page");
            let response = self.http.get(&page_url).send().await?;
            let response = expect_status(response, StatusCode::OK).await?;
            next = next_page_url(response.headers());
            let page: Vec<T> = response.json().await?;
            items.extend(page);
        }

        Ok(items)
    }
}

/// Pass the response through if it has the expected status, else turn it
/// into a remote error carrying GitHub's message
async fn expect_status(response: Response, expected: StatusCode) -> Result<Response> {
    if response.status() == expected {
        return Ok(response);
    }
    Err(remote_error(response).await)
}

async fn remote_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| "No message provided".to_string());
    tracing::debug!(status, %message, "unexpected GitHub response");
    Error::remote(status, message)
}

#[async_trait]
impl LabelService for GitHubClient {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let repos: Vec<RemoteRepository> = self.fetch_all("/user/repos").await?;
        Ok(repos.into_iter().map(|repo| repo.full_name).collect())
    }

    async fn list_labels(&self, slug: &str) -> Result<LabelSet> {
        let labels: Vec<RemoteLabel> = self.fetch_all(&Self::labels_path(slug)?).await?;
        Ok(labels
            .into_iter()
            .map(|label| (label.name, label.color))
            .collect())
    }

    async fn create_label(&self, slug: &str, name: &str, color: &str) -> Result<()> {
        let url = self.endpoint(&Self::labels_path(slug)?)?;
        tracing::debug!(%slug, %name, %color, "creating label");
        let response = self
            .http
            .post(url)
            .json(&LabelBody { name, color })
            .send()
            .await?;
        expect_status(response, StatusCode::CREATED).await?;
        Ok(())
    }

    async fn update_label(
        &self,
        slug: &str,
        name: &str,
        color: &str,
        old_name: Option<&str>,
    ) -> Result<()> {
        let url = self.label_endpoint(slug, old_name.unwrap_or(name))?;
        tracing::debug!(%slug, %name, %color, ?old_name, "updating label");
        let response = self
            .http
            .patch(url)
            .json(&LabelBody { name, color })
            .send()
            .await?;
        expect_status(response, StatusCode::OK).await?;
        Ok(())
    }

    async fn delete_label(&self, slug: &str, name: &str) -> Result<()> {
        let url = self.label_endpoint(slug, name)?;
        tracing::debug!(%slug, %name, "deleting label");
        let response = self.http.delete(url).send().await?;
        expect_status(response, StatusCode::NO_CONTENT).await?;
        Ok(())
    }
}
