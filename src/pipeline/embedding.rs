use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};

use super::error::PipelineError;
use super::utils::normalize_rows;
use crate::models::ModelCharacteristics;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Turns raw text into fixed-length sentence embeddings.
///
/// Implementations must return one L2-normalized row per input string, in
/// input order. The pipeline treats embedding as a black box behind this
/// trait, which is also the seam used to stub it out in tests.
pub trait SentenceEmbedder: Send + Sync {
    /// Embeds an ordered batch of strings into an `[n, embedding_size]`
    /// matrix with one row per input, rows L2-normalized.
    ///
    /// # Errors
    /// - `ValidationError` if the batch is empty
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>, PipelineError>;

    /// Embeds a single string. Default implementation delegates to
    /// `embed_batch`.
    fn embed_one(&self, text: &str) -> Result<Array1<f32>, PipelineError> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string()))?;
        Ok(batch.row(0).to_owned())
    }

    /// Dimensionality of the produced vectors.
    fn embedding_size(&self) -> usize;
}

/// Sentence embedder backed by an ONNX export of a sentence-transformer
/// model (all-MiniLM-L6-v2 by default).
///
/// The model is expected to:
/// - Accept `input_ids` and `attention_mask`, both `[batch_size, sequence_length]`
/// - Output token embeddings of shape `[batch_size, sequence_length, embedding_size]`
///
/// Sequence embeddings are produced by mean pooling the token embeddings
/// over the attention mask, then L2-normalizing each row.
pub struct OnnxEmbedder {
    tokenizer: Arc<Tokenizer>,
    session: Arc<Session>,
    characteristics: ModelCharacteristics,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("characteristics", &self.characteristics)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbedder {
    /// Loads the embedder from a model and tokenizer file.
    ///
    /// # Errors
    /// - `ArtifactError` if either file is missing
    /// - `TokenizerError` / `ModelError` if loading fails
    /// - `ModelError` if the model does not expose the expected inputs
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        characteristics: ModelCharacteristics,
        config: &RuntimeConfig,
    ) -> Result<Self, PipelineError> {
        for path in [model_path, tokenizer_path] {
            if !path.exists() {
                return Err(PipelineError::ArtifactError {
                    path: path.display().to_string(),
                    reason: "file not found".into(),
                });
            }
        }

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| PipelineError::TokenizerError(e.to_string()))?;
        configure_truncation(&mut tokenizer, characteristics.max_sequence_length)?;

        let session = create_session_builder(config)?.commit_from_file(model_path)?;
        Self::validate_model(&session)?;
        log::info!("Embedding model loaded from {}", model_path.display());

        Ok(Self {
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            characteristics,
        })
    }

    /// Checks that the model has the two expected input tensors and at
    /// least one output.
    fn validate_model(session: &Session) -> Result<(), PipelineError> {
        if session.inputs.len() < 2 {
            return Err(PipelineError::ModelError(format!(
                "Embedding model must have at least 2 inputs (input_ids and attention_mask), found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(PipelineError::ModelError(
                "Embedding model must have at least 1 output for token embeddings".to_string(),
            ));
        }
        Ok(())
    }

    /// Tokenizes one string. Truncation to the model's maximum sequence
    /// length is handled by the tokenizer itself, so special tokens such
    /// as the trailing `[SEP]` survive on long input.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, PipelineError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| PipelineError::TokenizerError(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }
}

/// Caps the tokenizer's output at `max_len` tokens, keeping its
/// post-processing (special-token template) intact.
fn configure_truncation(tokenizer: &mut Tokenizer, max_len: usize) -> Result<(), PipelineError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| PipelineError::TokenizerError(e.to_string()))?;
    Ok(())
}

impl SentenceEmbedder for OnnxEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>, PipelineError> {
        if texts.is_empty() {
            return Err(PipelineError::ValidationError(
                "Cannot embed an empty batch".into(),
            ));
        }

        let token_batches: Vec<Vec<u32>> = texts
            .iter()
            .map(|text| self.tokenize(text))
            .collect::<Result<_, _>>()?;

        let batch_size = token_batches.len();
        let max_len = token_batches
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(1)
            .max(1);

        // Pad to the longest sequence in the batch, masking the padding.
        let mut input_ids = Array2::<i64>::zeros((batch_size, max_len));
        let mut attention_mask = Array2::<i64>::zeros((batch_size, max_len));
        for (row, tokens) in token_batches.iter().enumerate() {
            for (col, &id) in tokens.iter().enumerate() {
                input_ids[[row, col]] = id as i64;
                attention_mask[[row, col]] = 1;
            }
        }

        let input_dyn = input_ids.into_dyn();
        let input_ids_layout = input_dyn.as_standard_layout();
        let mask_dyn = attention_mask.clone().into_dyn();
        let mask_layout = mask_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            "input_ids",
            Tensor::from_array(&input_ids_layout).map_err(|e| {
                PipelineError::ModelError(format!("Failed to create input tensor: {}", e))
            })?,
        );
        input_tensors.insert(
            "attention_mask",
            Tensor::from_array(&mask_layout).map_err(|e| {
                PipelineError::ModelError(format!("Failed to create mask tensor: {}", e))
            })?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| PipelineError::ModelError(format!("Failed to run model: {}", e)))?;
        let token_embeddings = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let shape = token_embeddings.shape();
        if shape.len() != 3 || shape[0] != batch_size {
            return Err(PipelineError::ModelError(format!(
                "Unexpected embedding output shape {:?} for batch of {}",
                shape, batch_size
            )));
        }
        let hidden = shape[2];

        // Mean pooling over unmasked token positions.
        let mut embeddings = Array2::<f32>::zeros((batch_size, hidden));
        for row in 0..batch_size {
            let mut count = 0_usize;
            for col in 0..max_len {
                if attention_mask[[row, col]] == 1 {
                    count += 1;
                    for dim in 0..hidden {
                        embeddings[[row, dim]] += token_embeddings[[row, col, dim]];
                    }
                }
            }
            let denom = count.max(1) as f32;
            for dim in 0..hidden {
                embeddings[[row, dim]] /= denom;
            }
        }

        normalize_rows(&mut embeddings);
        Ok(embeddings)
    }

    fn embedding_size(&self) -> usize {
        self.characteristics.embedding_size
    }
}
