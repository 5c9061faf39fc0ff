use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ort::session::Session;
use ort::value::Tensor;

use super::embedding::SentenceEmbedder;
use super::error::PipelineError;
use super::utils::softmax;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Verdict of the room-validity filter for a single string.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityPrediction {
    /// Whether the string looks like a genuine room label
    pub is_room_label: bool,
    /// Probability assigned to the predicted class
    pub confidence: f32,
    /// Wall-clock time spent assessing the string
    pub elapsed: Duration,
}

/// Binary filter distinguishing genuine room-label strings from OCR noise.
///
/// This is the stage-1 seam of the pipeline; tests substitute stub
/// implementations for the ONNX-backed one.
pub trait ValidityFilter: Send + Sync {
    fn assess(&self, text: &str) -> Result<ValidityPrediction, PipelineError>;
}

/// Validity classifier backed by an ONNX binary head over sentence
/// embeddings: input `embedding` `[1, embedding_size]` f32, output `logits`
/// `[1, 2]` where index 1 is the "valid room label" class.
pub struct OnnxValidityClassifier {
    session: Arc<Session>,
    embedder: Arc<dyn SentenceEmbedder>,
}

impl std::fmt::Debug for OnnxValidityClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxValidityClassifier").finish_non_exhaustive()
    }
}

impl OnnxValidityClassifier {
    /// Loads the binary head from an ONNX file. The embedder is shared with
    /// the rest of the pipeline.
    ///
    /// # Errors
    /// - `ArtifactError` naming the path if the file is missing
    /// - `ModelError` if the session cannot be created
    pub fn from_file(
        model_path: &Path,
        embedder: Arc<dyn SentenceEmbedder>,
        config: &RuntimeConfig,
    ) -> Result<Self, PipelineError> {
        if !model_path.exists() {
            return Err(PipelineError::ArtifactError {
                path: model_path.display().to_string(),
                reason: "file not found".into(),
            });
        }

        let session = create_session_builder(config)?.commit_from_file(model_path)?;
        log::info!("Validity classifier loaded from {}", model_path.display());

        Ok(Self {
            session: Arc::new(session),
            embedder,
        })
    }
}

impl ValidityFilter for OnnxValidityClassifier {
    fn assess(&self, text: &str) -> Result<ValidityPrediction, PipelineError> {
        if text.is_empty() {
            return Err(PipelineError::ValidationError(
                "Input text cannot be empty".into(),
            ));
        }

        let start = Instant::now();
        let embedding = self.embedder.embed_one(text)?;

        let input = embedding
            .insert_axis(ndarray::Axis(0))
            .into_dyn();
        let input_layout = input.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            "embedding",
            Tensor::from_array(&input_layout).map_err(|e| {
                PipelineError::ModelError(format!("Failed to create embedding tensor: {}", e))
            })?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| PipelineError::ModelError(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::ModelError(format!("Failed to extract logits: {}", e)))?;

        if logits.len() < 2 {
            return Err(PipelineError::ModelError(format!(
                "Validity head produced {} logits, expected 2",
                logits.len()
            )));
        }

        let logit_values: Vec<f32> = logits.iter().take(2).copied().collect();
        let probs = softmax(&logit_values);
        let is_room_label = probs[1] >= probs[0];
        let confidence = if is_room_label { probs[1] } else { probs[0] };

        Ok(ValidityPrediction {
            is_room_label,
            confidence,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_names_path() {
        struct NoopEmbedder;
        impl SentenceEmbedder for NoopEmbedder {
            fn embed_batch(
                &self,
                _texts: &[String],
            ) -> Result<ndarray::Array2<f32>, PipelineError> {
                unreachable!("never embeds")
            }
            fn embedding_size(&self) -> usize {
                384
            }
        }

        let result = OnnxValidityClassifier::from_file(
            Path::new("/tmp/waypointer-test/no-such-classifier.onnx"),
            Arc::new(NoopEmbedder),
            &RuntimeConfig::default(),
        );
        match result {
            Err(PipelineError::ArtifactError { path, .. }) => {
                assert!(path.contains("no-such-classifier.onnx"));
            }
            other => panic!("expected ArtifactError, got {:?}", other.map(|_| ())),
        }
    }
}
