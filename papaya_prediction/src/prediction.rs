use crate::error::PredictionError;
use serde::Serialize;

const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    pub label: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    pub confidence: f32,
    pub scores: Vec<ClassScore>,
}

impl Prediction {
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.
    }

    /// `"MATANG (97.53%)"`
    pub fn summary(&self) -> String {
        format!(
            "{} ({:.2}%)",
            self.label.to_uppercase(),
            self.confidence_percent()
        )
    }
}

/// Keeps a softmax output as is and turns raw logits into probabilities.
pub fn to_probabilities(raw: &[f32]) -> Result<Vec<f32>, PredictionError> {
    if raw.is_empty() {
        return Err(PredictionError::Output("no class scores".to_string()));
    }
    if raw.iter().any(|value| !value.is_finite()) {
        return Err(PredictionError::Output(
            "class scores contain non-finite values".to_string(),
        ));
    }

    let sum: f32 = raw.iter().sum();
    let is_distribution = raw.iter().all(|value| (0.0..=1.0).contains(value))
        && (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE;
    if is_distribution {
        return Ok(raw.to_vec());
    }

    let max_logit = raw.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = raw.iter().map(|&x| (x - max_logit).exp()).collect();
    let exp_sum: f32 = exps.iter().sum();

    Ok(exps.into_iter().map(|x| x / exp_sum).collect())
}

pub fn select_top_class(raw: &[f32], labels: &[String]) -> Result<Prediction, PredictionError> {
    if raw.len() != labels.len() {
        return Err(PredictionError::Output(format!(
            "model returned {} scores for {} labels",
            raw.len(),
            labels.len()
        )));
    }

    let probabilities = to_probabilities(raw)?;

    // first index wins on ties
    let (class_index, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
        .ok_or_else(|| PredictionError::Output("no class scores".to_string()))?;

    let scores = labels
        .iter()
        .zip(probabilities.iter())
        .map(|(label, probability)| ClassScore {
            label: label.clone(),
            probability: probability.clamp(0.0, 1.0),
        })
        .collect();

    Ok(Prediction {
        label: labels[class_index].clone(),
        class_index,
        confidence: confidence.clamp(0.0, 1.0),
        scores,
    })
}
