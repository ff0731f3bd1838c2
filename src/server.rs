//! Replication Webhook Server
//!
//! - `GET /` - page listing the repositories kept in sync
//! - `POST /` - GitHub webhook endpoint; `ping` and `label` events are handled

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;

use crate::config::Config;
use crate::github::LabelService;
use crate::signature::verify_signature;
use crate::webhook::{EchoRegistry, LabelEvent, Replication, WebhookContext};

/// Header carrying the event type
pub const HEADER_EVENT: &str = "x-github-event";

/// Header carrying the HMAC-SHA1 payload signature
pub const HEADER_SIGNATURE: &str = "x-hub-signature";

/// Errors answered to the webhook sender
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(crate::Error),

    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error(transparent)]
    Internal(#[from] crate::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_)
            | WebhookError::InvalidPayload(_)
            | WebhookError::UnsupportedEvent(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Shared, read-only server state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: Arc<dyn LabelService>,
    config: Arc<Config>,
    webhook_secret: Vec<u8>,
    echoes: EchoRegistry,
}

impl AppState {
    /// Create the state, checking the configuration up front
    ///
    /// # Errors
    /// If the webhook secret or the `[repos]` section is missing
    pub fn new(service: Arc<dyn LabelService>, config: Config) -> crate::Result<Self> {
        let webhook_secret = config.webhook_secret()?.as_bytes().to_vec();
        config.repositories()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                service,
                config: Arc::new(config),
                webhook_secret,
                echoes: EchoRegistry::new(),
            }),
        })
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn echoes(&self) -> &EchoRegistry {
        &self.inner.echoes
    }

    /// Request-scoped context
    fn context(&self) -> crate::Result<WebhookContext> {
        WebhookContext::new(self.inner.service.clone(), self.inner.config.clone())
    }
}

/// Builds the axum Router with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler).post(webhook_handler))
        .with_state(state)
}

/// Bind and serve until the process is stopped
///
/// # Errors
/// If the address cannot be bound or serving fails
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(address = %listener.local_addr()?, "replication server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, WebhookError> {
    let context = state.context()?;
    let rows: String = context
        .targets()
        .iter()
        .map(|slug| {
            format!(
                "<li><a href=\"https://github.com/{0}\">{0}</a></li>",
                escape_html(slug)
            )
        })
        .collect();

    Ok(Html(format!(
        "<!doctype html>\n<html><head><title>labelord</title></head><body>\
         <h1>labelord: master-to-master label replication</h1>\
         <p>Repositories kept in sync:</p><ul>{rows}</ul></body></html>"
    )))
}

/// Webhook handler
///
/// The signature is verified before the body is parsed; a rejected request
/// never causes a mutation.
///
/// # Response
/// - 200: event handled (or ignored)
/// - 400: missing header, malformed payload, or unsupported event
/// - 401: invalid signature
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature = get_header(&headers, HEADER_SIGNATURE)?;

    if !verify_signature(&body, signature, state.webhook_secret()) {
        tracing::warn!(event = %event_type, "rejected webhook with invalid signature");
        return Err(WebhookError::InvalidSignature);
    }

    match event_type {
        "ping" => Ok((StatusCode::OK, "OK")),
        "label" => {
            let event = LabelEvent::from_slice(&body).map_err(WebhookError::InvalidPayload)?;
            let context = state.context()?;
            match context.replicate(&event, state.echoes()).await {
                Replication::Mirrored { failed, .. } if failed > 0 => {
                    tracing::warn!(failed, "label event partially replicated");
                }
                outcome => tracing::debug!(?outcome, "label event handled"),
            }
            Ok((StatusCode::OK, "OK"))
        }
        other => Err(WebhookError::UnsupportedEvent(other.to_string())),
    }
}

fn get_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
