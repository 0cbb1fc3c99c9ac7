//! HTTP client for the ranking service REST API.
//!
//! Wraps `reqwest` with the service's error envelope, session cookies, the
//! CSRF header on state-changing requests, and typed response decoding.

use std::sync::Arc;
use std::time::Duration;

use rankgrid_core::AppConfig;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;
use crate::retry::retry_with_backoff;
use crate::session::Session;

/// Header Django reads the anti-forgery token from.
pub(crate) const CSRF_HEADER: &str = "X-CSRFToken";

const DEFAULT_USER_AGENT: &str = "rankgrid/0.1 (local-ranking-grid)";
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Client for the ranking service.
///
/// All requests share one [`Session`]: its cookie jar is installed as the
/// `reqwest` cookie provider, and its CSRF slot caches the anti-forgery
/// token. Use [`RankingClient::new`] with loaded configuration or
/// [`RankingClient::with_base_url`] to point at a mock server in tests.
pub struct RankingClient {
    client: Client,
    base_url: Url,
    session: Arc<Session>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl RankingClient {
    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidUrl`] if the configured
    /// base URL does not parse.
    pub fn new(config: &AppConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        let client = Self::build(
            &config.base_url,
            config.request_timeout_secs,
            &config.user_agent,
            session,
        )?;
        Ok(client.with_retry_policy(config.max_retries, config.retry_backoff_base_ms))
    }

    /// Creates a client with a custom base URL and no read retries.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidUrl`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        session: Arc<Session>,
    ) -> Result<Self, ClientError> {
        Self::build(base_url, timeout_secs, DEFAULT_USER_AGENT, session)
    }

    fn build(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        session: Arc<Session>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .cookie_provider(Arc::clone(&session))
            .build()?;

        // Exactly one trailing slash, so relative endpoint paths extend any
        // prefix in the base URL instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            session,
            max_retries: 0,
            backoff_base_ms: 0,
        })
    }

    /// Sets how many times idempotent reads are retried on transient errors.
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Resolves an endpoint path (no leading slash) against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_owned(),
                reason: e.to_string(),
            })
    }

    /// GET with query parameters, retried on transient errors.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url).send().await?;
                Self::decode(response, path).await
            }
        })
        .await
    }

    /// POST a state-changing request exactly once.
    ///
    /// Attaches the session's CSRF token, fetching it first if none is cached.
    pub(crate) async fn post_once<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let token = self.csrf_token().await?;
        let response = self
            .client
            .post(url)
            .header(CSRF_HEADER, token)
            .json(body)
            .send()
            .await?;
        self.csrf_checked(Self::decode(response, path).await).await
    }

    /// POST a read-only query. Safe to replay, so it is retried like a GET.
    pub(crate) async fn post_idempotent<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let token = self.csrf_token().await?;
        let result = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let token = token.clone();
            async move {
                let response = self
                    .client
                    .post(url)
                    .header(CSRF_HEADER, token)
                    .json(body)
                    .send()
                    .await?;
                Self::decode(response, path).await
            }
        })
        .await;
        self.csrf_checked(result).await
    }

    /// A 403 mentioning CSRF means the cached token went stale: drop it so
    /// the next action fetches a fresh one.
    async fn csrf_checked<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        match result {
            Err(ClientError::Unauthenticated(message)) if message.contains("CSRF") => {
                self.forget_csrf_token().await;
                Err(ClientError::CsrfUnavailable(message))
            }
            other => other,
        }
    }

    /// Maps the HTTP status and body onto the client's error taxonomy and
    /// decodes successful bodies.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Unauthenticated`] on 401 or 403.
    /// - [`ClientError::Remote`] on any other non-2xx status.
    /// - [`ClientError::Deserialize`] if a 2xx body does not match `T`.
    pub(crate) async fn decode<T: DeserializeOwned>(
        response: Response,
        context: &str,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message =
                remote_message(&body).unwrap_or_else(|| "authentication required".to_owned());
            tracing::debug!(status = status.as_u16(), context, "request rejected as unauthenticated");
            return Err(ClientError::Unauthenticated(message));
        }
        if !status.is_success() {
            let message = remote_message(&body)
                .unwrap_or_else(|| format!("request failed with HTTP {}", status.as_u16()));
            return Err(ClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// The service answers with `{"error": ..., "message": ...}`, with
/// `{"error": ..., "details": {field: [...]}}` for rejected input, or with
/// DRF's `{"detail": ...}`. Anything else non-empty is passed through as text.
pub(crate) fn remote_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect());
    };
    let field = |key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let detail = field("message")
        .or_else(|| field("detail"))
        .map(str::to_owned)
        .or_else(|| match value.get("details") {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Some(v @ serde_json::Value::Object(map)) if !map.is_empty() => Some(v.to_string()),
            _ => None,
        });
    match (field("error"), detail) {
        (Some(error), Some(detail)) => Some(format!("{error}: {detail}")),
        (Some(error), None) => Some(error.to_owned()),
        (None, Some(detail)) => Some(detail),
        (None, None) => first_field_error(&value),
    }
}

/// DRF serializer errors: `{"field": ["message", ...]}`. `non_field_errors`
/// is preferred since it carries messages like bad credentials.
fn first_field_error(value: &serde_json::Value) -> Option<String> {
    let map = value.as_object()?;
    let first = |v: &serde_json::Value| {
        v.as_array()?
            .first()?
            .as_str()
            .map(str::to_owned)
    };
    if let Some(message) = map.get("non_field_errors").and_then(first) {
        return Some(message);
    }
    map.iter()
        .find_map(|(field, v)| first(v).map(|message| format!("{field}: {message}")))
}
