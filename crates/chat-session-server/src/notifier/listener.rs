use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::archive::ArchiveSink;
use super::source::{ExpiryEventSource, ExpirySubscription};
use super::NotifierError;
use crate::config::NotifierConfig;
use crate::models::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Disconnected,
    Connecting,
    Subscribed,
    Terminated,
}

/// Exponential backoff between subscribe attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Consecutive failures tolerated before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.backoff_initial_ms),
            max: Duration::from_millis(config.backoff_max_ms),
            max_attempts: (config.max_reconnect_attempts > 0)
                .then_some(config.max_reconnect_attempts),
        }
    }

    /// Delay before the attempt following `failures` consecutive failures (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial.saturating_mul(1u32 << exponent).min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

/// Long-lived expiry subscriber.
///
/// `Disconnected -> Connecting -> Subscribed`, back to `Disconnected` on
/// transport failure, `Terminated` on shutdown or when reconnects run out.
/// Events emitted while not `Subscribed` are lost for good.
pub struct ExpiryNotifier {
    source: Arc<dyn ExpiryEventSource>,
    sink: Arc<dyn ArchiveSink>,
    prefix: String,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<NotifierState>,
}

impl ExpiryNotifier {
    pub fn new(
        source: Arc<dyn ExpiryEventSource>,
        sink: Arc<dyn ArchiveSink>,
        tenant: &TenantId,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _rx) = watch::channel(NotifierState::Disconnected);
        Self {
            source,
            sink,
            prefix: tenant.namespace_prefix(),
            policy,
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<NotifierState> {
        self.state_tx.subscribe()
    }

    /// True for keys inside the tenant's session namespace.
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Returns an error only when `max_attempts` consecutive subscribe attempts
    /// failed; callers treat that as fatal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), NotifierError> {
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(NotifierState::Connecting);
            let connect = tokio::select! {
                result = self.source.subscribe() => result,
                _ = stop_requested(&mut shutdown) => break,
            };

            match connect {
                Ok(mut subscription) => {
                    failures = 0;
                    self.set_state(NotifierState::Subscribed);
                    info!(prefix = %self.prefix, "Subscribed to session expiry events");

                    let stop = self.pump(subscription.as_mut(), &mut shutdown).await;
                    if stop {
                        subscription.close().await;
                        break;
                    }

                    self.set_state(NotifierState::Disconnected);
                    warn!("Expiry stream disconnected; expiries until resubscribe are lost");
                }
                Err(e) => {
                    failures += 1;
                    self.set_state(NotifierState::Disconnected);
                    error!(error = %e, attempt = failures, "Failed to subscribe to expiry events");

                    if let Some(max) = self.policy.max_attempts {
                        if failures >= max {
                            self.set_state(NotifierState::Terminated);
                            return Err(NotifierError::ReconnectExhausted { attempts: failures });
                        }
                    }
                }
            }

            let delay = self.policy.delay_for(failures.max(1));
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before resubscribe");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_requested(&mut shutdown) => break,
            }
        }

        self.set_state(NotifierState::Terminated);
        info!("Expiry notifier terminated");
        Ok(())
    }

    /// Forward events until the transport drops (`false`) or shutdown (`true`).
    async fn pump(
        &self,
        subscription: &mut dyn ExpirySubscription,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                biased;
                _ = stop_requested(shutdown) => return true,
                event = subscription.next_expired() => match event {
                    // Handled inline: an event being archived finishes before shutdown is seen.
                    Some(Ok(key)) => {
                        self.handle_expired(&key).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Expiry transport error");
                        return false;
                    }
                    None => return false,
                },
            }
        }
    }

    /// Archive one expired key if it belongs to the session namespace.
    /// Returns whether the sink accepted it.
    pub async fn handle_expired(&self, key: &str) -> bool {
        if !self.matches(key) {
            debug!(key, "Ignoring expiry outside session namespace");
            return false;
        }

        let expired_at = Utc::now();
        info!(
            key,
            expired_at = %expired_at.format("%Y-%m-%d %H:%M:%S"),
            "Session expired"
        );

        match self.sink.store(key, expired_at).await {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "Failed to archive expired session");
                false
            }
        }
    }

    fn set_state(&self, state: NotifierState) {
        self.state_tx.send_replace(state);
    }
}

/// Resolves once `true` is published or the sender is dropped. Other updates are ignored.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
