use crate::{server::SharedState, session::ResultPanel};
use axum::{
    extract::{Multipart, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use tracing::instrument;

struct UploadedFile {
    file_name: String,
    data: Bytes,
}

/// Reads the `camera` and `file` fields. Fields without data (nothing picked) are skipped.
async fn read_fields(
    multipart: &mut Multipart,
) -> Result<(Option<UploadedFile>, Option<UploadedFile>), String> {
    let mut camera = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| e.body_text())?;

        if data.is_empty() {
            continue;
        }

        let upload = UploadedFile { file_name, data };
        match name.as_str() {
            "camera" => camera = Some(upload),
            "file" => file = Some(upload),
            other => tracing::debug!("Ignoring unknown form field {}", other),
        }
    }

    Ok((camera, file))
}

#[instrument(skip(state, jar, multipart))]
pub async fn upload_image(
    State(state): State<SharedState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> impl IntoResponse {
    state.metrics.record_request("/upload");
    let (jar, session_id) = state.sessions.resolve(jar);

    match read_fields(&mut multipart).await {
        Ok((Some(camera), _)) => {
            tracing::info!("Camera capture received ({} bytes)", camera.data.len());
            state.sessions.set_image(session_id, camera.data);
        }
        Ok((None, Some(file))) if state.upload.is_allowed_file(&file.file_name) => {
            tracing::info!(
                "File {} received ({} bytes)",
                file.file_name,
                file.data.len()
            );
            state.sessions.set_image(session_id, file.data);
        }
        Ok((None, Some(file))) => {
            tracing::warn!("Rejected upload {}", file.file_name);
            state.sessions.set_result(
                session_id,
                ResultPanel::Error(format!(
                    "Error reading file: {} is not one of {}",
                    file.file_name,
                    state.upload.allowed_extensions.join(", ")
                )),
            );
        }
        Ok((None, None)) => {}
        Err(e) => {
            tracing::warn!("Failed to read upload: {}", e);
            state.sessions.set_result(
                session_id,
                ResultPanel::Error(format!("Error reading file: {}", e)),
            );
        }
    }

    (jar, Redirect::to("/"))
}
