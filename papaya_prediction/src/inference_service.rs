use crate::{
    error::PredictionError,
    model_service::ModelService,
    prediction::{select_top_class, Prediction},
    preprocess::transform_image,
    state::State,
};
use std::sync::Arc;

/// Turns image bytes into a ripeness prediction.
///
/// The model is shared, so a single loaded model serves every caller. The
/// active labels are the first `num_classes` entries of the label state.
pub struct InferenceService<M: ModelService + ?Sized, S: State> {
    model_service: Arc<M>,
    service_state: Arc<S>,
    active_labels: usize,
}

impl<M: ModelService + ?Sized, S: State> Clone for InferenceService<M, S> {
    fn clone(&self) -> Self {
        Self {
            model_service: self.model_service.clone(),
            service_state: self.service_state.clone(),
            active_labels: self.active_labels,
        }
    }
}

impl<M: ModelService, S: State> InferenceService<M, S> {
    pub fn new(model_service: M, state: S) -> Result<Self, PredictionError> {
        Self::from_shared(Arc::new(model_service), state)
    }
}

impl<M: ModelService + ?Sized, S: State> InferenceService<M, S> {
    pub fn from_shared(model_service: Arc<M>, state: S) -> Result<Self, PredictionError> {
        let known_labels = state.get_labels().len();
        if known_labels == 0 {
            return Err(PredictionError::Labels("no class labels".to_string()));
        }

        let active_labels = match model_service.num_classes() {
            Some(num_classes) if num_classes > known_labels => {
                return Err(PredictionError::Labels(format!(
                    "model has {} classes but only {} labels are known",
                    num_classes, known_labels
                )));
            }
            Some(num_classes) => num_classes,
            None => known_labels,
        };

        if active_labels < known_labels {
            tracing::warn!(
                "Model has {} classes, ignoring the last {} labels",
                active_labels,
                known_labels - active_labels
            );
        }

        Ok(Self {
            model_service,
            service_state: Arc::new(state),
            active_labels,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.service_state.get_labels()[..self.active_labels]
    }

    pub fn classify_blocking(&self, image_data: &[u8]) -> Result<Prediction, PredictionError> {
        let input = transform_image(image_data, self.model_service.input_spec())?;
        let scores = self.model_service.run_inference(&input)?;
        let prediction = select_top_class(&scores, self.labels())?;

        tracing::debug!(
            "Predicted class {} ({}) with confidence {:.3}",
            prediction.class_index,
            prediction.label,
            prediction.confidence
        );

        Ok(prediction)
    }

    /// Same as [`Self::classify_blocking`], on the blocking thread pool.
    pub async fn classify(&self, image_data: Vec<u8>) -> Result<Prediction, PredictionError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.classify_blocking(&image_data))
            .await
            .map_err(|e| PredictionError::Inference(format!("inference task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TensorLayout, preprocess::InputSpec, state::ServiceState};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use ndarray::Array4;
    use std::io::Cursor;

    struct MockModelService {
        scores: Vec<f32>,
        num_classes: Option<usize>,
    }

    impl ModelService for MockModelService {
        fn input_spec(&self) -> InputSpec {
            InputSpec {
                size: 8,
                layout: TensorLayout::Nhwc,
            }
        }

        fn num_classes(&self) -> Option<usize> {
            self.num_classes
        }

        fn run_inference(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictionError> {
            assert_eq!(input.shape(), &[1, 8, 8, 3]);
            Ok(self.scores.clone())
        }
    }

    struct FailingModelService;

    impl ModelService for FailingModelService {
        fn input_spec(&self) -> InputSpec {
            InputSpec {
                size: 8,
                layout: TensorLayout::Nchw,
            }
        }

        fn num_classes(&self) -> Option<usize> {
            None
        }

        fn run_inference(&self, _input: &Array4<f32>) -> Result<Vec<f32>, PredictionError> {
            Err(PredictionError::Inference("runtime exploded".to_string()))
        }
    }

    fn papaya_state() -> ServiceState {
        ServiceState::from_labels(["matang", "mentah", "setengah"])
    }

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(20, 20, Rgb([230, 140, 20]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::from(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[tokio::test]
    async fn test_classify() -> Result<(), Box<dyn std::error::Error>> {
        let mock_model = MockModelService {
            scores: vec![0.9, 0.06, 0.04],
            num_classes: Some(3),
        };
        let inference_service = InferenceService::new(mock_model, papaya_state())?;

        let prediction = inference_service.classify(png_bytes()).await?;

        assert_eq!(prediction.label, "matang");
        assert_eq!(prediction.class_index, 0);
        assert_eq!(prediction.summary(), "MATANG (90.00%)");

        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_image_is_reported() {
        let mock_model = MockModelService {
            scores: vec![0.9, 0.06, 0.04],
            num_classes: Some(3),
        };
        let inference_service = InferenceService::new(mock_model, papaya_state()).unwrap();

        let err = inference_service
            .classify(b"\x89PNG\r\n\x1a\nbroken".to_vec())
            .await
            .unwrap_err();

        assert!(err.is_client_error());
    }

    #[test]
    fn test_inference_failure_is_reported() {
        let inference_service = InferenceService::new(FailingModelService, papaya_state()).unwrap();

        let err = inference_service.classify_blocking(&png_bytes()).unwrap_err();

        assert!(matches!(err, PredictionError::Inference(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_labels_follow_model_class_count() {
        let mock_model = MockModelService {
            scores: vec![0.3, 0.7],
            num_classes: Some(2),
        };
        let inference_service = InferenceService::new(mock_model, papaya_state()).unwrap();

        assert_eq!(inference_service.labels(), &["matang", "mentah"]);
        let prediction = inference_service.classify_blocking(&png_bytes()).unwrap();
        assert_eq!(prediction.label, "mentah");
    }

    #[test]
    fn test_more_classes_than_labels_is_rejected() {
        let mock_model = MockModelService {
            scores: vec![0.25; 4],
            num_classes: Some(4),
        };

        let result = InferenceService::new(mock_model, papaya_state());

        assert!(matches!(result, Err(PredictionError::Labels(_))));
    }

    #[test]
    fn test_shared_trait_object() {
        let model: Arc<dyn ModelService> = Arc::new(MockModelService {
            scores: vec![0.1, 0.1, 0.8],
            num_classes: None,
        });
        let inference_service = InferenceService::from_shared(model, papaya_state()).unwrap();

        let prediction = inference_service.classify_blocking(&png_bytes()).unwrap();

        assert_eq!(prediction.label, "setengah");
        assert_eq!(inference_service.labels().len(), 3);
    }
}
