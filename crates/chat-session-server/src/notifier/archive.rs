use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Archive rejected session: HTTP {status}")]
    Rejected { status: u16 },
}

/// Long-term store for sessions that expired out of the session store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn store(&self, key: &str, expired_at: DateTime<Utc>) -> Result<(), ArchiveError>;
}

/// Records expiries in the service log only.
#[derive(Debug, Default, Clone)]
pub struct LogArchiveSink;

#[async_trait]
impl ArchiveSink for LogArchiveSink {
    async fn store(&self, key: &str, expired_at: DateTime<Utc>) -> Result<(), ArchiveError> {
        info!(
            key,
            expired_at = %expired_at.format("%Y-%m-%d %H:%M:%S"),
            "Session expired, archived to log"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArchivePayload<'a> {
    key: &'a str,
    expired_at: DateTime<Utc>,
}

/// POSTs `{key, expiredAt}` to an HTTP endpoint.
#[derive(Clone)]
pub struct WebhookArchiveSink {
    client: Client,
    url: String,
}

impl WebhookArchiveSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ArchiveError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
        })
    }
}

#[async_trait]
impl ArchiveSink for WebhookArchiveSink {
    async fn store(&self, key: &str, expired_at: DateTime<Utc>) -> Result<(), ArchiveError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ArchivePayload { key, expired_at })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ArchiveError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
