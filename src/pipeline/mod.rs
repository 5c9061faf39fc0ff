//! The two-stage waypoint inference pipeline and its components.

use ndarray::ArrayView2;

pub mod artifact;
pub mod embedding;
mod error;
pub mod forest;
pub mod knn;
pub mod orchestrator;
mod utils;
pub mod validity;
mod vote;

pub use artifact::{load_artifact, save_artifact};
pub use embedding::{OnnxEmbedder, SentenceEmbedder};
pub use error::PipelineError;
pub use forest::{RandomForestClassifier, RandomForestParams, SplitCriterion};
pub use knn::KnnClassifier;
pub use orchestrator::{
    Pipeline, PipelineBuilder, PipelineOutcome, PipelineTimings, WaypointModel,
};
pub use validity::{OnnxValidityClassifier, ValidityFilter, ValidityPrediction};
pub use vote::majority_vote;

/// Common capability of the stage-2 classification strategies.
///
/// Both strategies operate on `(embedding, waypoint-id)` pairs: `fit`
/// trains on a labeled embedding matrix, `predict` maps each query row to
/// a waypoint ID.
pub trait WaypointClassifier {
    /// Trains the classifier on one embedding row per label.
    fn fit(&mut self, embeddings: ArrayView2<f32>, labels: &[i64]) -> Result<(), PipelineError>;

    /// Predicts one waypoint ID per embedding row, in row order.
    fn predict(&self, embeddings: ArrayView2<f32>) -> Result<Vec<i64>, PipelineError>;
}
