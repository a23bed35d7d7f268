use crate::{
    error::WebError,
    page::NO_IMAGE_PROMPT,
    server::SharedState,
    session::ResultPanel,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::{IntoResponse, Json, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use papaya_prediction::{Prediction, PredictionError};
use serde::Serialize;
use std::time::Instant;
use tracing::instrument;

async fn run_prediction(
    state: &SharedState,
    image_data: Vec<u8>,
    route: &str,
) -> Result<Prediction, PredictionError> {
    let started = Instant::now();
    let result = state.inference.classify(image_data).await;
    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64, route);

    match &result {
        Ok(prediction) => {
            tracing::info!(
                "Predicted {} with confidence {:.3}",
                prediction.label,
                prediction.confidence
            );
            state.metrics.record_prediction(&prediction.label);
        }
        Err(e) => {
            tracing::warn!("Prediction failed: {}", e);
            state.metrics.record_prediction("error");
        }
    }

    result
}

#[instrument(skip(state, jar))]
pub async fn predict_form(State(state): State<SharedState>, jar: CookieJar) -> impl IntoResponse {
    state.metrics.record_request("/predict");
    let (jar, session_id) = state.sessions.resolve(jar);

    let panel = match state.sessions.current_image(session_id) {
        None => ResultPanel::Info(NO_IMAGE_PROMPT.to_string()),
        Some(image) => match run_prediction(&state, image.to_vec(), "/predict").await {
            Ok(prediction) => ResultPanel::Success {
                label: prediction.label,
                confidence: prediction.confidence,
            },
            Err(e) => ResultPanel::Error(format!("Prediction error: {}", e)),
        },
    };
    state.sessions.set_result(session_id, panel);

    (jar, Redirect::to("/"))
}

#[instrument(skip(state, image_data))]
pub async fn predict_api(
    State(state): State<SharedState>,
    image_data: Result<Bytes, BytesRejection>,
) -> Result<Json<Prediction>, WebError> {
    state.metrics.record_request("/api/predict");
    let image_data = image_data?;
    if image_data.is_empty() {
        return Err(WebError::BadRequest("no image provided".to_string()));
    }

    let prediction = run_prediction(&state, image_data.to_vec(), "/api/predict").await?;

    Ok(Json(prediction))
}

#[derive(Serialize)]
pub struct ClassLabels {
    class_labels: Vec<String>,
}

pub async fn class_labels(State(state): State<SharedState>) -> Json<ClassLabels> {
    Json(ClassLabels {
        class_labels: state.inference.labels().to_vec(),
    })
}
