use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use super::embedding::SentenceEmbedder;
use super::error::PipelineError;
use super::forest::RandomForestClassifier;
use super::knn::KnnClassifier;
use super::validity::ValidityFilter;
use super::vote::majority_vote;
use super::WaypointClassifier;

/// The closed set of stage-2 classification strategies.
///
/// Adding a strategy means adding a variant here and handling it in
/// `Pipeline::run`; the compiler flags every dispatch site, so a new
/// strategy cannot silently fall through at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointModel {
    Knn,
    RandomForest,
}

impl FromStr for WaypointModel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knn" => Ok(WaypointModel::Knn),
            "random_forest" => Ok(WaypointModel::RandomForest),
            other => Err(PipelineError::UnsupportedModel(other.to_string())),
        }
    }
}

impl fmt::Display for WaypointModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointModel::Knn => write!(f, "knn"),
            WaypointModel::RandomForest => write!(f, "random_forest"),
        }
    }
}

/// Wall-clock durations of the pipeline stages. Diagnostic only; the
/// predicted waypoint never depends on these values.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineTimings {
    pub filter: Duration,
    pub embed: Duration,
    pub classify: Duration,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The aggregated waypoint prediction
    pub waypoint: i64,
    /// Per-string predictions, one per retained input, in input order
    pub per_string: Vec<i64>,
    /// Number of input strings that passed the validity filter
    pub retained: usize,
    /// Number of input strings the validity filter rejected
    pub rejected: usize,
    /// Stage timings for observability
    pub timings: PipelineTimings,
}

/// Sequences the two classification stages: validity filtering, sentence
/// embedding, waypoint classification, and majority-vote aggregation.
///
/// All models are injected at construction time and treated as immutable
/// shared state for the lifetime of the pipeline; `run` takes `&self` and
/// has no side effects beyond timing measurement.
pub struct Pipeline {
    validity: Box<dyn ValidityFilter>,
    embedder: Arc<dyn SentenceEmbedder>,
    knn: KnnClassifier,
    forest: RandomForestClassifier,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("knn", &self.knn)
            .field("forest", &self.forest)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a new PipelineBuilder for fluent construction
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the full pipeline over an ordered batch of label strings and
    /// returns the aggregated waypoint prediction.
    ///
    /// # Errors
    /// - `NoValidLabels` if the validity filter rejects every input string
    ///   (or the input is empty)
    /// - Any error surfaced by the embedding or classification stages
    pub fn run(
        &self,
        labels: &[String],
        model: WaypointModel,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut timings = PipelineTimings::default();

        // Stage 1: validity filtering, order preserved.
        let filter_start = Instant::now();
        let mut valid_labels = Vec::with_capacity(labels.len());
        for label in labels {
            let verdict = self.validity.assess(label)?;
            debug!(
                "validity: '{}' -> {} (confidence {:.3}, {:.2?})",
                label, verdict.is_room_label, verdict.confidence, verdict.elapsed
            );
            if verdict.is_room_label {
                valid_labels.push(label.clone());
            }
        }
        timings.filter = filter_start.elapsed();

        let rejected = labels.len() - valid_labels.len();
        if valid_labels.is_empty() {
            return Err(PipelineError::NoValidLabels);
        }

        // Stage 2a: embed the surviving strings as one batch.
        let embed_start = Instant::now();
        let embeddings = self.embedder.embed_batch(&valid_labels)?;
        timings.embed = embed_start.elapsed();

        // Stage 2b: classify each embedding with the selected strategy.
        let classify_start = Instant::now();
        let per_string = match model {
            WaypointModel::Knn => self.knn.predict(embeddings.view())?,
            WaypointModel::RandomForest => self.forest.predict(embeddings.view())?,
        };
        timings.classify = classify_start.elapsed();

        let waypoint = majority_vote(&per_string)?;

        Ok(PipelineOutcome {
            waypoint,
            per_string,
            retained: valid_labels.len(),
            rejected,
            timings,
        })
    }
}

/// A builder for constructing a Pipeline with a fluent interface.
#[derive(Default)]
pub struct PipelineBuilder {
    validity: Option<Box<dyn ValidityFilter>>,
    embedder: Option<Arc<dyn SentenceEmbedder>>,
    knn: Option<KnnClassifier>,
    forest: Option<RandomForestClassifier>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stage-1 validity filter
    pub fn with_validity_filter(mut self, filter: Box<dyn ValidityFilter>) -> Self {
        self.validity = Some(filter);
        self
    }

    /// Sets the sentence embedder shared by stage 2
    pub fn with_embedder(mut self, embedder: Arc<dyn SentenceEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Sets the trained nearest-neighbor classifier
    pub fn with_knn(mut self, knn: KnnClassifier) -> Self {
        self.knn = Some(knn);
        self
    }

    /// Sets the trained random-forest classifier
    pub fn with_random_forest(mut self, forest: RandomForestClassifier) -> Self {
        self.forest = Some(forest);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    /// - `ValidationError` if any component is missing or a classifier is
    ///   not fitted
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let validity = self
            .validity
            .ok_or_else(|| PipelineError::ValidationError("No validity filter set".into()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| PipelineError::ValidationError("No sentence embedder set".into()))?;
        let knn = self
            .knn
            .ok_or_else(|| PipelineError::ValidationError("No knn classifier set".into()))?;
        let forest = self
            .forest
            .ok_or_else(|| PipelineError::ValidationError("No random forest set".into()))?;

        if !knn.is_fitted() {
            return Err(PipelineError::ValidationError(
                "Knn classifier has not been fitted".into(),
            ));
        }
        if !forest.is_fitted() {
            return Err(PipelineError::ValidationError(
                "Random forest has not been fitted".into(),
            ));
        }

        Ok(Pipeline {
            validity,
            embedder,
            knn,
            forest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selector_parsing() {
        assert_eq!("knn".parse::<WaypointModel>().unwrap(), WaypointModel::Knn);
        assert_eq!(
            "random_forest".parse::<WaypointModel>().unwrap(),
            WaypointModel::RandomForest
        );
    }

    #[test]
    fn test_unsupported_selector_rejected() {
        match "svm".parse::<WaypointModel>() {
            Err(PipelineError::UnsupportedModel(name)) => assert_eq!(name, "svm"),
            other => panic!("expected UnsupportedModel, got {:?}", other),
        }
    }

    #[test]
    fn test_selector_round_trips_through_display() {
        for model in [WaypointModel::Knn, WaypointModel::RandomForest] {
            assert_eq!(model.to_string().parse::<WaypointModel>().unwrap(), model);
        }
    }

    #[test]
    fn test_builder_requires_all_components() {
        assert!(PipelineBuilder::new().build().is_err());
    }
}
