//! Component wiring shared by the server and the standalone listener.
//!
//! Clients are built once here at process start and injected downward.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{Settings, StoreBackendKind};
use crate::notifier::{
    ArchiveSink, ExpiryEventSource, ExpiryNotifier, LogArchiveSink, MemoryExpirySource,
    NotifierError, RedisExpirySource, ReconnectPolicy, WebhookArchiveSink,
};
use crate::store::{KeyValueBackend, MemoryBackend, RedisBackend, SessionStore, StoreError};

pub struct StoreHandle {
    pub store: SessionStore,
    /// Set when the in-process backend is in use; owns the expiry event channel.
    pub memory: Option<Arc<MemoryBackend>>,
}

/// Connect the configured backend. Failure means the store is unavailable.
pub async fn connect_store(settings: &Settings) -> Result<StoreHandle, StoreError> {
    let ttl = settings.session_ttl();
    match settings.store.backend {
        StoreBackendKind::Redis => {
            let backend: Arc<dyn KeyValueBackend> =
                Arc::new(RedisBackend::connect(&settings.store.redis_url).await?);
            Ok(StoreHandle {
                store: SessionStore::new(backend, ttl),
                memory: None,
            })
        }
        StoreBackendKind::Memory => {
            info!("Using in-memory session store");
            let memory = Arc::new(MemoryBackend::default());
            Ok(StoreHandle {
                store: SessionStore::new(memory.clone(), ttl),
                memory: Some(memory),
            })
        }
    }
}

pub fn archive_sink(settings: &Settings) -> Result<Arc<dyn ArchiveSink>> {
    match &settings.archive.webhook_url {
        Some(url) => {
            info!(url = %url, "Archiving expired sessions to webhook");
            let sink = WebhookArchiveSink::new(
                url.clone(),
                Duration::from_secs(settings.archive.timeout_seconds),
            )
            .context("Failed to build archive webhook client")?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogArchiveSink)),
    }
}

pub fn expiry_source(
    settings: &Settings,
    memory: Option<&Arc<MemoryBackend>>,
) -> Result<Arc<dyn ExpiryEventSource>> {
    match memory {
        Some(backend) => Ok(Arc::new(MemoryExpirySource::new(backend.clone()))),
        None => {
            let source = RedisExpirySource::new(
                &settings.store.redis_url,
                settings.expiry_channel()?,
                settings.notifier.configure_keyspace_events,
            )?;
            Ok(Arc::new(source))
        }
    }
}

pub fn expiry_notifier(
    settings: &Settings,
    source: Arc<dyn ExpiryEventSource>,
) -> Result<ExpiryNotifier> {
    Ok(ExpiryNotifier::new(
        source,
        archive_sink(settings)?,
        &settings.tenant()?,
        ReconnectPolicy::from_config(&settings.notifier),
    ))
}

pub type NotifierTask = JoinHandle<Result<(), NotifierError>>;

/// Resolves when the embedded notifier stops; pending forever when none runs.
///
/// Clears `task` once it has been joined. A notifier that ends cleanly before
/// shutdown was requested is reported as an error as well.
pub async fn notifier_exit(task: &mut Option<NotifierTask>) -> Result<()> {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };
    let outcome = handle.await;
    *task = None;
    match outcome {
        Ok(Ok(())) => Err(anyhow!("expiry notifier stopped")),
        Ok(Err(e)) => Err(anyhow!(e).context("expiry notifier failed")),
        Err(e) => Err(anyhow!("expiry notifier task panicked: {e}")),
    }
}
