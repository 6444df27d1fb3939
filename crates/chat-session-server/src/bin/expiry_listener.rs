//! Standalone expiry listener.
//!
//! Requires Redis with `notify-keyspace-events` containing `Ex`, either set by
//! hand (`CONFIG SET notify-keyspace-events Ex`) or by enabling
//! `notifier.configure_keyspace_events`. Exits non-zero when it gives up
//! reconnecting so a supervisor can restart it.

use anyhow::{bail, Result};
use tokio::sync::watch;
use tracing::{error, info};

use chat_session_server::bootstrap;
use chat_session_server::config::{Settings, StoreBackendKind};
use chat_session_server::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_logger("info,chat_session_server=debug", "expiry-listener")?;

    info!("🚀 Starting expiry listener...");

    let settings = Settings::load()?;
    if settings.store.backend != StoreBackendKind::Redis {
        bail!("expiry-listener needs store.backend = \"redis\"; use notifier.embedded for the memory store");
    }

    let source = bootstrap::expiry_source(&settings, None)?;
    let notifier = bootstrap::expiry_notifier(&settings, source)?;
    info!(
        channel = %settings.expiry_channel()?,
        db = settings.redis_db()?,
        "👂 Expiry listener configured"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⏹️ Listener stopped by user");
                shutdown_tx.send_replace(true);
            }
            Err(e) => {
                // Keep the sender alive; dropping it would stop the listener.
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    notifier.run(shutdown_rx).await?;

    info!("🧹 Cleanup complete");
    Ok(())
}
