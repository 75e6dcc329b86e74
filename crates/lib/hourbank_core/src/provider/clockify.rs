//! Clockify REST client.
//!
//! Paginated `GET` calls against the v1 API authenticated with `X-Api-Key`,
//! retried according to [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::retry::{RetryPolicy, is_retryable_status, sleep_cancellable};
use super::{ExternalEntry, ExternalUser, ProviderConnector, ProviderError, TimeProvider};

pub const CLOCKIFY_BASE_URL: &str = "https://api.clockify.me/api/v1";

/// Items requested per page; a shorter page ends pagination.
pub const PAGE_SIZE: usize = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_BYTES: usize = 1 << 20;
const API_KEY_HEADER: &str = "X-Api-Key";

/// Client bound to one API key.
pub struct ClockifyClient {
    http: Client,
    base_url: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl ClockifyClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ProviderError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            retry,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch every page of a list endpoint.
    async fn get_all(
        &self,
        url: &Url,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut query = params.to_vec();
            query.push(("page", page.to_string()));
            query.push(("page-size", PAGE_SIZE.to_string()));

            let batch: Vec<serde_json::Value> =
                self.get_json(url, &query, cancel).await?.unwrap_or_default();
            let count = batch.len();
            items.extend(batch);
            if count < PAGE_SIZE {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// Single `GET` with retry. An empty success body yields `None`.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Option<T>, ProviderError> {
        let mut attempt = 1u32;
        loop {
            let request = self
                .http
                .get(url.clone())
                .header(API_KEY_HEADER, &self.api_key)
                .header(ACCEPT, "application/json")
                .query(query);

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                sent = request.send() => sent,
            };

            let delay = match sent {
                Ok(resp) if resp.status().is_success() => {
                    let body = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        body = resp.bytes() => body?,
                    };
                    if body.iter().all(u8::is_ascii_whitespace) {
                        return Ok(None);
                    }
                    return serde_json::from_slice(&body)
                        .map(Some)
                        .map_err(|e| ProviderError::Decode(e.to_string()));
                }
                Ok(resp) => {
                    let code = resp.status();
                    let status = code.as_u16();
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let mut message = read_error_body(resp).await;
                    if message.is_empty() {
                        message = code.canonical_reason().unwrap_or_default().to_string();
                    }
                    if !is_retryable_status(status) || !self.retry.has_attempts_left(attempt) {
                        return Err(ProviderError::Status { status, message });
                    }
                    let delay = self.retry.delay(attempt, retry_after.as_deref(), Utc::now());
                    warn!(
                        status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        path = url.path(),
                        "provider request rejected, retrying"
                    );
                    delay
                }
                Err(e) => {
                    if !self.retry.has_attempts_left(attempt) {
                        return Err(ProviderError::Transport(e));
                    }
                    let delay = self.retry.delay(attempt, None, Utc::now());
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        path = url.path(),
                        "provider request failed, retrying"
                    );
                    delay
                }
            };

            sleep_cancellable(delay, cancel).await?;
            attempt += 1;
        }
    }
}

/// Read at most [`MAX_ERROR_BODY_BYTES`] of an error response for the message.
async fn read_error_body(mut resp: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = resp.chunk().await {
        let room = MAX_ERROR_BODY_BYTES - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= MAX_ERROR_BODY_BYTES {
            break;
        }
    }
    String::from_utf8_lossy(&body).trim().to_string()
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl TimeProvider for ClockifyClient {
    async fn list_users(
        &self,
        workspace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalUser>, ProviderError> {
        let url = self.endpoint(&["workspaces", workspace_id, "users"])?;
        let raw = self.get_all(&url, &[], cancel).await?;
        let users = raw
            .into_iter()
            .map(serde_json::from_value::<ExternalUser>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        debug!(workspace_id, users = users.len(), "listed provider users");
        Ok(users)
    }

    async fn list_entries(
        &self,
        workspace_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalEntry>, ProviderError> {
        let url = self.endpoint(&["workspaces", workspace_id, "user", user_id, "time-entries"])?;
        let params = [
            ("start", rfc3339(start)),
            ("end", rfc3339(end)),
            ("hydrated", "false".to_string()),
        ];
        let raw = self.get_all(&url, &params, cancel).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for value in raw {
            let mut entry: ExternalEntry = serde_json::from_value(value.clone())
                .map_err(|e| ProviderError::Decode(e.to_string()))?;
            entry.raw = value;
            entries.push(entry);
        }
        debug!(workspace_id, user_id, entries = entries.len(), "listed provider time entries");
        Ok(entries)
    }
}

/// Creates [`ClockifyClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct ClockifyConnector {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ClockifyConnector {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl ProviderConnector for ClockifyConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TimeProvider>, ProviderError> {
        let client = ClockifyClient::new(self.http.clone(), &self.base_url, api_key, self.retry)?;
        Ok(Arc::new(client))
    }
}
