/// The built-in sentence-embedding models the pipeline can download and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModel {
    /// all-MiniLM-L6-v2: 384-dimensional embeddings, 256-token sequences.
    /// Small and fast enough for on-device inference.
    MiniLM,
}

/// Static performance and shape characteristics of a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    /// Dimensionality of the produced sentence embeddings
    pub embedding_size: usize,
    /// Maximum number of tokens the model accepts per sequence
    pub max_sequence_length: usize,
    /// Approximate on-disk size of the model file
    pub model_size_mb: usize,
}

/// Download locations for a model's artifacts. Content digests are recorded
/// by the `ModelManager` when the files are first downloaded.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: &'static str,
    pub model_url: &'static str,
    pub tokenizer_url: &'static str,
}

impl BuiltinModel {
    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            BuiltinModel::MiniLM => ModelCharacteristics {
                embedding_size: 384,
                max_sequence_length: 256,
                model_size_mb: 85,
            },
        }
    }

    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            BuiltinModel::MiniLM => ModelInfo {
                name: "minilm",
                model_url: "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx",
                tokenizer_url: "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json",
            },
        }
    }
}
