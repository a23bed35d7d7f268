use crate::{
    config::{ModelConfig, Validatable},
    error::PredictionError,
    model_service::ModelService,
    preprocess::InputSpec,
};
use ndarray::{Array, Array4, Dimension};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[cfg(feature = "tensorrt")]
fn init_runtime() -> Result<(), PredictionError> {
    use ort::execution_providers::TensorRTExecutionProvider;

    ort::init()
        .with_execution_providers([TensorRTExecutionProvider::default()
            .with_engine_cache(true)
            .build()])
        .commit()
        .map_err(|e| PredictionError::ModelLoad(format!("runtime init failed: {}", e)))?;
    Ok(())
}

#[cfg(not(feature = "tensorrt"))]
fn init_runtime() -> Result<(), PredictionError> {
    Ok(())
}

/// Pulls the class scores of the single batch entry out of a raw output tensor.
fn batch_scores(dims: &[usize], data: &[f32]) -> Result<Vec<f32>, PredictionError> {
    match dims {
        [] => Err(PredictionError::Output("scalar output".to_string())),
        [classes] if *classes == data.len() => Ok(data.to_vec()),
        [batch, rest @ ..] if *batch == 1 && rest.iter().product::<usize>() == data.len() => {
            Ok(data.to_vec())
        }
        [batch, ..] if *batch != 1 => Err(PredictionError::Output(format!(
            "expected a batch of 1, got {}",
            batch
        ))),
        _ => Err(PredictionError::Output(format!(
            "shape {:?} does not match {} values",
            dims,
            data.len()
        ))),
    }
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    input_spec: InputSpec,
    num_classes: Option<usize>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, PredictionError> {
        model_config.validate().map_err(PredictionError::ModelLoad)?;
        init_runtime()?;

        let model_path = model_config.get_path();
        let sessions = (0..model_config.num_instances)
            .map(|_| {
                let session = Session::builder()
                    .and_then(|builder| {
                        builder.with_optimization_level(GraphOptimizationLevel::Level3)
                    })
                    .and_then(|builder| builder.commit_from_file(&model_path))
                    .map_err(|e| PredictionError::ModelLoad(e.to_string()))?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, PredictionError>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            sessions.len(),
            model_path
        );

        let mut service = Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            input_spec: InputSpec {
                size: model_config.input_size,
                layout: model_config.layout,
            },
            num_classes: None,
        };

        let warmup: Array4<f32> = Array::zeros(service.input_spec.shape());
        let scores = service
            .run_inference(&warmup)
            .map_err(|e| PredictionError::ModelLoad(format!("warm-up inference failed: {}", e)))?;
        if scores.is_empty() {
            return Err(PredictionError::ModelLoad(
                "model produced an empty output".to_string(),
            ));
        }
        tracing::info!("Model reports {} output classes", scores.len());
        service.num_classes = Some(scores.len());

        Ok(service)
    }
}

impl ModelService for OrtModelService {
    fn input_spec(&self) -> InputSpec {
        self.input_spec
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    fn run_inference(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictionError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| PredictionError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().into_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| PredictionError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| PredictionError::Inference(e.to_string()))?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| PredictionError::Output("model produced no outputs".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictionError::Output(format!("failed to extract tensor: {}", e)))?;

        let dims = shape.to_ixdyn();
        batch_scores(dims.slice(), data)
    }
}
