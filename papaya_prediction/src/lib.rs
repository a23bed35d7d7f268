mod inference_service;
mod model_service;
mod ort_service;
mod prediction;
mod state;

pub mod config;
pub mod error;
pub mod preprocess;

pub use error::PredictionError;
pub use inference_service::InferenceService;
pub use model_service::ModelService;
pub use ort_service::OrtModelService;
pub use prediction::{select_top_class, to_probabilities, ClassScore, Prediction};
pub use state::{load_labels, ServiceState, State};
