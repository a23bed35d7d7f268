mod health;
mod index;
mod metrics;
mod predict;
mod upload;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/image", get(index::preview_image))
        .route("/upload", post(upload::upload_image))
        .route("/predict", post(predict::predict_form))
        .route("/api/predict", post(predict::predict_api))
        .route("/api/labels", get(predict::class_labels))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
