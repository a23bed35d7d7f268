use crate::{error::WebError, server::SharedState};
use axum::{extract::State, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};

pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, WebError> {
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| WebError::Internal(format!("failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer).map_err(|e| WebError::Internal(e.to_string()))
}
