use crate::{error::PredictionError, preprocess::InputSpec};
use ndarray::Array4;

pub trait ModelService: Send + Sync + 'static {
    fn input_spec(&self) -> InputSpec;

    /// Number of output classes, when the model has told us.
    fn num_classes(&self) -> Option<usize>;

    fn run_inference(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictionError>;
}
