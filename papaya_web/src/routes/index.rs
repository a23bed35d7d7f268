use crate::{error::WebError, page::render_page, server::SharedState};
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

#[instrument(skip(state, jar))]
pub async fn index(State(state): State<SharedState>, jar: CookieJar) -> impl IntoResponse {
    state.metrics.record_request("/");
    let (jar, session_id) = state.sessions.resolve(jar);
    let view = state.sessions.view(session_id);

    (jar, Html(render_page(&view, &state.upload.accept_attribute())))
}

#[instrument(skip(state, jar))]
pub async fn preview_image(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let (jar, session_id) = state.sessions.resolve(jar);
    let image = state
        .sessions
        .current_image(session_id)
        .ok_or_else(|| WebError::NotFound("no image selected".to_string()))?;

    let content_type = image::guess_format(&image)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok((
        jar,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store"),
        ],
        image,
    )
        .into_response())
}
