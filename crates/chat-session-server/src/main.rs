use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use chat_session_server::bootstrap;
use chat_session_server::config::{Settings, StoreBackendKind};
use chat_session_server::handlers::build_router;
use chat_session_server::services::{ChatService, OpenAiClient};
use chat_session_server::state::AppState;
use chat_session_server::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    init_logger("info,chat_session_server=debug", "chat-session-server")?;

    info!("🚀 Starting chat session server...");

    // Load configuration
    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    // Session store; unreachable store aborts startup
    let handle = bootstrap::connect_store(&settings)
        .await
        .context("Session store unavailable at startup")?;
    info!("✅ Session store ready");

    let completion = Arc::new(OpenAiClient::new(&settings.llm)?);
    let chat_service = Arc::new(ChatService::new(
        handle.store.clone(),
        completion,
        settings.llm.system_prompt.clone(),
        settings.completion_timeout(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper = handle.memory.as_ref().map(|memory| {
        memory.spawn_reaper(
            Duration::from_millis(settings.store.reaper_interval_ms),
            shutdown_rx.clone(),
        )
    });

    let mut notifier_task = if settings.notifier.embedded {
        let source = bootstrap::expiry_source(&settings, handle.memory.as_ref())?;
        let notifier = bootstrap::expiry_notifier(&settings, source)?;
        info!("✅ Embedded expiry notifier started");
        Some(tokio::spawn(notifier.run(shutdown_rx.clone())))
    } else {
        if settings.store.backend == StoreBackendKind::Memory {
            warn!("Memory store without embedded notifier: expiries will not be archived");
        }
        None
    };

    let app = build_router(AppState {
        chat_service,
        default_tenant: settings.tenant()?,
        default_history_limit: settings.session.default_history_limit,
    });

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .into_future();

    // A dead embedded notifier takes the server down so a supervisor restarts it.
    let outcome = tokio::select! {
        served = server => served.map_err(anyhow::Error::from),
        died = bootstrap::notifier_exit(&mut notifier_task) => died,
    };

    shutdown_tx.send_replace(true);

    if let Some(task) = notifier_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Expiry notifier failed: {}", e),
            Err(e) => error!("Expiry notifier task panicked: {}", e),
        }
    }
    if let Some(task) = reaper {
        let _ = task.await;
    }

    if let Err(e) = &outcome {
        error!("Server stopping: {:#}", e);
    } else {
        info!("👋 Server stopped");
    }
    outcome
}
