//! A two-stage pipeline that identifies building waypoints (rooms) from
//! noisy OCR'd signage text.
//!
//! Stage 1 filters candidate strings through a binary room-validity
//! classifier. Stage 2 embeds the survivors with a sentence-embedding ONNX
//! model, classifies each embedding against a catalog of known waypoints
//! (nearest-neighbor or random forest), and reduces the per-string
//! predictions to one answer by majority vote.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use std::sync::Arc;
//! use waypointer::pipeline::{
//!     load_artifact, OnnxEmbedder, OnnxValidityClassifier, Pipeline, WaypointModel,
//! };
//! use waypointer::runtime::RuntimeConfig;
//! use waypointer::models::BuiltinModel;
//!
//! let config = RuntimeConfig::default();
//! let embedder = Arc::new(OnnxEmbedder::from_files(
//!     Path::new("models/minilm/model.onnx"),
//!     Path::new("models/minilm/tokenizer.json"),
//!     BuiltinModel::MiniLM.characteristics(),
//!     &config,
//! )?);
//!
//! let pipeline = Pipeline::builder()
//!     .with_embedder(embedder.clone())
//!     .with_validity_filter(Box::new(OnnxValidityClassifier::from_file(
//!         Path::new("models/room_classifier.onnx"),
//!         embedder,
//!         &config,
//!     )?))
//!     .with_knn(load_artifact(Path::new("models/knn.json"))?)
//!     .with_random_forest(load_artifact(Path::new("models/random_forest.json"))?)
//!     .build()?;
//!
//! let labels = vec!["8259".to_string(), "Ra 8259".to_string()];
//! let outcome = pipeline.run(&labels, WaypointModel::Knn)?;
//! println!("Predicted waypoint: {}", outcome.waypoint);
//! # Ok(())
//! # }
//! ```
//!
//! # Aggregation
//!
//! The majority-vote aggregator is a pure function and usable on its own:
//!
//! ```rust
//! use waypointer::pipeline::majority_vote;
//!
//! assert_eq!(majority_vote(&[42, 17, 42]).unwrap(), 42);
//! ```

pub mod dataset;
pub mod model_manager;
pub mod models;
pub mod pipeline;
pub mod runtime;

pub use dataset::{build_training_set, load_waypoints, WaypointRecord};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use pipeline::{
    majority_vote, KnnClassifier, OnnxEmbedder, OnnxValidityClassifier, Pipeline,
    PipelineError, PipelineOutcome, RandomForestClassifier, RandomForestParams,
    SentenceEmbedder, SplitCriterion, ValidityFilter, ValidityPrediction, WaypointClassifier,
    WaypointModel,
};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}
