use crate::{
    config::{ServerConfig, UploadConfig},
    routes::api_routes,
    session::SessionStore,
    telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use papaya_prediction::{InferenceService, ModelService, ServiceState};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

pub type PapayaInference = InferenceService<dyn ModelService, ServiceState>;

#[derive(Clone)]
pub struct SharedState {
    pub inference: PapayaInference,
    pub sessions: Arc<SessionStore>,
    pub metrics: Arc<Metrics>,
    pub upload: UploadConfig,
}

pub fn build_router(state: SharedState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.upload.max_bytes);

    Router::new()
        .merge(api_routes())
        .layer(body_limit)
        .with_state(state)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &ServerConfig) -> anyhow::Result<Self> {
        let addr = config.get_address();
        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let router = build_router(state).layer(metrics_layer);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", &self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
