use crate::config::Config;
use crate::server::{HttpServer, SharedState};
use crate::session::SessionStore;
use crate::telemetry::Metrics;
use papaya_prediction::{InferenceService, ModelService, OrtModelService, ServiceState, State};

use std::{error::Error, sync::Arc, time::Duration};
use tokio::{signal, sync::broadcast, task::JoinHandle};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let model_service: Arc<dyn ModelService> = match OrtModelService::new(&config.model) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to load model: {}", e);
            return Err(Box::new(e));
        }
    };

    let inference = match ServiceState::new(&config.labels)
        .and_then(|labels| InferenceService::from_shared(model_service, labels))
    {
        Ok(inference) => inference,
        Err(e) => {
            tracing::error!("Failed to initialize inference service: {}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Classifying into {:?}", inference.labels());

    let sessions = Arc::new(SessionStore::new(&config.session));
    let state = SharedState {
        inference,
        sessions: sessions.clone(),
        metrics: Arc::new(Metrics::new()?),
        upload: config.upload.clone(),
    };

    let server = HttpServer::new(state, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();
    let sweeper_shutdown_rx = shutdown_tx.subscribe();

    let sweeper_handle = spawn_session_sweeper(
        sessions,
        Duration::from_secs(config.session.sweep_interval_secs),
        sweeper_shutdown_rx,
    );

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;
    let _ = sweeper_handle.await;

    Ok(())
}

/// Ends idle sessions every `interval` until shutdown.
pub fn spawn_session_sweeper(
    sessions: Arc<SessionStore>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(10));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = sessions.purge_expired();
                    if purged > 0 {
                        tracing::debug!("Purged {} idle sessions, {} left", purged, sessions.len());
                    }
                },
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session sweeper received shutdown signal");
                    break;
                }
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
