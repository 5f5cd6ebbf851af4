//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use crate::state::AppState;
use std::sync::Arc;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Wait for one signal. A handler that cannot be installed never fires.
async fn recv_or_pending(installed: std::io::Result<Signal>, name: &str) {
    match installed {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install {} handler", name);
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    tokio::select! {
        _ = recv_or_pending(signal(SignalKind::terminate()), "SIGTERM") => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = recv_or_pending(signal(SignalKind::interrupt()), "SIGINT") => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Secrets and the per-viewer buffer are swapped in place; league rules go
/// to the coordinator. The listen address and broadcast interval only take
/// effect after a restart. The task ends when `shutdown_rx` flips.
pub fn spawn_config_reload_handler(
    state: AppState,
    config_loader: Arc<ConfigLoader>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler, config reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            let mut league = loaded_config.league;
                            if loaded_config.lobby_code_generated {
                                league.lobby_code = state.coordinator.config().await.lobby_code;
                            }

                            {
                                let mut server = state.config.server.write().await;
                                if server.listen != loaded_config.server.listen {
                                    tracing::warn!(
                                        listen = %loaded_config.server.listen,
                                        "Listen address changed, restart to apply"
                                    );
                                }
                                *server = loaded_config.server;
                            }
                            *state.config.admin.write().await = loaded_config.admin;
                            *state.config.relay.write().await = loaded_config.relay;
                            state.coordinator.apply_config(league).await;

                            tracing::info!("Configuration reloaded successfully");
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!("Config reload handler shutting down");
                        break;
                    }
                }
            }
        }
    })
}
