//! External time provider client.
//!
//! The [`TimeProvider`] trait is the seam between the ingestor and the
//! provider's HTTP API. [`clockify::ClockifyClient`] is the production
//! implementation; tests substitute in-memory fakes.

pub mod clockify;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors returned by provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider response could not be decoded: {0}")]
    Decode(String),

    #[error("invalid provider url: {0}")]
    InvalidUrl(String),

    #[error("provider call cancelled")]
    Cancelled,
}

/// Coarse classification used to map provider failures onto client responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    InvalidCredential,
    WorkspaceNotFound,
    RateLimited,
    RequestFailed,
    ConnectionFailed,
    Cancelled,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Status { status: 401 | 403, .. } => ProviderErrorKind::InvalidCredential,
            Self::Status { status: 404, .. } => ProviderErrorKind::WorkspaceNotFound,
            Self::Status { status: 429, .. } => ProviderErrorKind::RateLimited,
            Self::Status { .. } | Self::Decode(_) | Self::InvalidUrl(_) => {
                ProviderErrorKind::RequestFailed
            }
            Self::Transport(_) => ProviderErrorKind::ConnectionFailed,
            Self::Cancelled => ProviderErrorKind::Cancelled,
        }
    }
}

/// A user of the provider workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExternalUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Start/end/duration block of a provider time entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeInterval {
    pub start: String,
    pub end: Option<String>,
    /// ISO-8601 duration such as `PT1H30M`.
    pub duration: Option<String>,
}

/// A tracked time segment as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalEntry {
    pub id: String,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub billable: bool,
    pub time_interval: TimeInterval,
    /// Payload exactly as received.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// Read access to one provider account.
#[async_trait]
pub trait TimeProvider: Send + Sync {
    /// All users of the workspace, following pagination to the end.
    async fn list_users(
        &self,
        workspace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalUser>, ProviderError>;

    /// Entries of one user that start in `[start, end)`.
    async fn list_entries(
        &self,
        workspace_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalEntry>, ProviderError>;
}

/// Builds a [`TimeProvider`] for a tenant's credential.
pub trait ProviderConnector: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TimeProvider>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> ProviderError {
        ProviderError::Status {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn classifies_status_codes() {
        assert_eq!(status(401).kind(), ProviderErrorKind::InvalidCredential);
        assert_eq!(status(403).kind(), ProviderErrorKind::InvalidCredential);
        assert_eq!(status(404).kind(), ProviderErrorKind::WorkspaceNotFound);
        assert_eq!(status(429).kind(), ProviderErrorKind::RateLimited);
        assert_eq!(status(400).kind(), ProviderErrorKind::RequestFailed);
        assert_eq!(status(503).kind(), ProviderErrorKind::RequestFailed);
        assert_eq!(ProviderError::Cancelled.kind(), ProviderErrorKind::Cancelled);
    }

    #[test]
    fn decodes_entry_payload() {
        let json = serde_json::json!({
            "id": "e1",
            "userId": "u1",
            "projectId": "p1",
            "tagIds": ["t1", "t2"],
            "billable": true,
            "timeInterval": {"start": "2026-02-09T08:00:00Z", "end": null, "duration": null}
        });
        let entry: ExternalEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.id, "e1");
        assert_eq!(entry.project_id.as_deref(), Some("p1"));
        assert_eq!(entry.tag_ids, vec!["t1", "t2"]);
        assert!(entry.billable);
        assert!(entry.time_interval.end.is_none());
        assert!(entry.task_id.is_none());
    }
}
