use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur in the waypoint pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Error occurred while loading or using the tokenizer
    TokenizerError(String),
    /// Error occurred while loading or running an ONNX model
    ModelError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
    /// The requested waypoint model is not one of the supported strategies
    UnsupportedModel(String),
    /// The validity filter rejected every input string
    NoValidLabels,
    /// Majority vote was asked to aggregate an empty prediction batch
    EmptyBatch,
    /// A persisted model artifact is missing or could not be read
    ArtifactError {
        path: String,
        reason: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenizerError(msg) => write!(f, "Tokenizer error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::UnsupportedModel(name) => write!(
                f,
                "Unsupported model '{}'. Supported models are: knn, random_forest",
                name
            ),
            Self::NoValidLabels => {
                write!(f, "No valid labels: the validity filter rejected every input string")
            }
            Self::EmptyBatch => {
                write!(f, "Empty batch: majority vote requires at least one prediction")
            }
            Self::ArtifactError { path, reason } => {
                write!(f, "Model artifact error at '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<OrtError> for PipelineError {
    fn from(err: OrtError) -> Self {
        PipelineError::ModelError(err.to_string())
    }
}
