//! Process wiring: build collaborators from config and serve until shutdown

use std::future::Future;
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::coach::{CoachText, LlmCoach};
use crate::config::Config;
use crate::controller::SessionController;
use crate::llm::create_client;
use crate::messenger::{Messenger, TelegramMessenger};
use crate::morning;
use crate::state::{MemorySessionStore, SessionStore};
use crate::webhook;

/// Build the controller with production collaborators
pub fn build_controller(config: &Config) -> Result<Arc<SessionController>> {
    debug!("build_controller: called");
    let messenger: Arc<dyn Messenger> =
        Arc::new(TelegramMessenger::from_config(&config.telegram).context("Failed to create Telegram client")?);
    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let coach: Arc<dyn CoachText> = Arc::new(LlmCoach::new(client, config.coach.max_in_flight));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

    Ok(Arc::new(SessionController::new(
        store,
        coach,
        messenger,
        config.schedule.focus_interval(),
    )))
}

/// Validate config, bind the listener and serve until Ctrl-C / SIGTERM
pub async fn serve(config: &Config) -> Result<()> {
    debug!(bind = %config.server.bind, "serve: called");
    config.validate()?;

    let controller = build_controller(config)?;
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .context(format!("Failed to bind {}", config.server.bind))?;

    run(listener, controller, config.schedule.morning_hour_utc, shutdown_signal()).await
}

/// Serve the webhook and run the morning trigger until `shutdown` resolves
pub async fn run<F>(listener: TcpListener, controller: Arc<SessionController>, morning_hour: u32, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr().context("Failed to read listener address")?;
    debug!(%local_addr, %morning_hour, "run: called");

    let trigger = tokio::spawn(morning::run(controller.clone(), morning_hour));

    info!("nudgebot listening on http://{local_addr}");
    let result = axum::serve(listener, webhook::router(controller))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error");

    trigger.abort();
    info!("nudgebot stopped");
    result
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => warn!("SIGINT received"),
                    _ = sigterm.recv() => warn!("SIGTERM received"),
                }
            }
            _ => {
                warn!("Failed to install signal handlers; falling back to Ctrl-C");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to wait for Ctrl-C");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to wait for Ctrl-C");
        }
    }
}
