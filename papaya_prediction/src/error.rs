use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Failed to load labels: {0}")]
    Labels(String),
    #[error("No image data provided")]
    EmptyImage,
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    Output(String),
}

impl PredictionError {
    /// True when the caller sent an image we cannot use.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictionError::EmptyImage
                | PredictionError::UnsupportedFormat(_)
                | PredictionError::Decode(_)
        )
    }
}
