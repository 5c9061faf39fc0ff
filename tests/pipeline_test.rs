use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use waypointer::pipeline::{
    KnnClassifier, Pipeline, PipelineError, RandomForestClassifier, RandomForestParams,
    SentenceEmbedder, ValidityFilter, ValidityPrediction, WaypointClassifier, WaypointModel,
};

/// Deterministic embedder: strings containing "8259" or "ELECTRICAL" land
/// near (1, 0), everything else near (0, 1). Counts embed_batch calls so
/// tests can assert that embedding never ran.
struct StubEmbedder {
    calls: AtomicUsize,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

fn stub_vector(text: &str) -> [f32; 2] {
    if text.contains("8259") || text.contains("ELECTRICAL") {
        [1.0, 0.0]
    } else {
        [0.0, 1.0]
    }
}

impl SentenceEmbedder for StubEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.is_empty() {
            return Err(PipelineError::ValidationError(
                "Cannot embed an empty batch".into(),
            ));
        }
        let flat: Vec<f32> = texts.iter().flat_map(|t| stub_vector(t)).collect();
        Ok(Array2::from_shape_vec((texts.len(), 2), flat).unwrap())
    }

    fn embedding_size(&self) -> usize {
        2
    }
}

/// Validity filter that accepts exactly the strings in its allow set.
struct StubFilter {
    allowed: HashSet<String>,
}

impl StubFilter {
    fn allowing(labels: &[&str]) -> Self {
        Self {
            allowed: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn rejecting_everything() -> Self {
        Self {
            allowed: HashSet::new(),
        }
    }
}

impl ValidityFilter for StubFilter {
    fn assess(&self, text: &str) -> Result<ValidityPrediction, PipelineError> {
        Ok(ValidityPrediction {
            is_room_label: self.allowed.contains(text),
            confidence: 0.99,
            elapsed: Duration::from_micros(10),
        })
    }
}

/// Training data matching the stub embedder's geometry: waypoint 42 at
/// (1, 0), waypoint 7 at (0, 1).
fn training_data() -> (Array2<f32>, Vec<i64>) {
    let x = Array2::from_shape_vec(
        (4, 2),
        vec![1.0, 0.0, 0.9, 0.1, 0.0, 1.0, 0.1, 0.9],
    )
    .unwrap();
    (x, vec![42, 42, 7, 7])
}

fn fitted_knn() -> KnnClassifier {
    let (x, y) = training_data();
    let mut knn = KnnClassifier::new(1).unwrap();
    knn.fit(x.view(), &y).unwrap();
    knn
}

fn fitted_forest() -> RandomForestClassifier {
    let (x, y) = training_data();
    let mut forest = RandomForestClassifier::new(RandomForestParams::default()).unwrap();
    forest.fit(x.view(), &y).unwrap();
    forest
}

fn build_pipeline(filter: StubFilter, embedder: Arc<StubEmbedder>) -> Pipeline {
    Pipeline::builder()
        .with_embedder(embedder)
        .with_validity_filter(Box::new(filter))
        .with_knn(fitted_knn())
        .with_random_forest(fitted_forest())
        .build()
        .expect("pipeline should build with all components set")
}

#[test]
fn test_end_to_end_majority_prediction() {
    let labels = vec![
        "8259".to_string(),
        "Ra 8259".to_string(),
        "ELECTRICAL ROOM".to_string(),
    ];
    let filter = StubFilter::allowing(&["8259", "Ra 8259", "ELECTRICAL ROOM"]);
    let pipeline = build_pipeline(filter, Arc::new(StubEmbedder::new()));

    let outcome = pipeline.run(&labels, WaypointModel::Knn).unwrap();
    assert_eq!(outcome.waypoint, 42);
    assert_eq!(outcome.per_string, vec![42, 42, 42]);
    assert_eq!(outcome.retained, 3);
    assert_eq!(outcome.rejected, 0);
}

#[test]
fn test_random_forest_strategy_agrees_on_clean_input() {
    let labels = vec!["8259".to_string(), "ELECTRICAL ROOM".to_string()];
    let filter = StubFilter::allowing(&["8259", "ELECTRICAL ROOM"]);
    let pipeline = build_pipeline(filter, Arc::new(StubEmbedder::new()));

    let outcome = pipeline.run(&labels, WaypointModel::RandomForest).unwrap();
    assert_eq!(outcome.waypoint, 42);
}

#[test]
fn test_filtering_preserves_order_and_counts() {
    let labels = vec![
        "NOISE###".to_string(),
        "8259".to_string(),
        "garbage".to_string(),
        "ELECTRICAL ROOM".to_string(),
    ];
    let filter = StubFilter::allowing(&["8259", "ELECTRICAL ROOM"]);
    let pipeline = build_pipeline(filter, Arc::new(StubEmbedder::new()));

    let outcome = pipeline.run(&labels, WaypointModel::Knn).unwrap();
    assert_eq!(outcome.retained, 2);
    assert_eq!(outcome.rejected, 2);
    assert_eq!(outcome.per_string.len(), 2);
}

#[test]
fn test_all_rejected_raises_no_valid_labels() {
    let labels = vec!["noise".to_string(), "###".to_string()];
    let embedder = Arc::new(StubEmbedder::new());
    let pipeline = build_pipeline(StubFilter::rejecting_everything(), embedder.clone());

    match pipeline.run(&labels, WaypointModel::Knn) {
        Err(PipelineError::NoValidLabels) => {}
        other => panic!("expected NoValidLabels, got {:?}", other),
    }
    // The embedding stage must never have been reached.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_input_raises_no_valid_labels() {
    let pipeline = build_pipeline(
        StubFilter::rejecting_everything(),
        Arc::new(StubEmbedder::new()),
    );
    match pipeline.run(&[], WaypointModel::Knn) {
        Err(PipelineError::NoValidLabels) => {}
        other => panic!("expected NoValidLabels, got {:?}", other),
    }
}

#[test]
fn test_unsupported_selector_fails_before_any_work() {
    // The selector is validated at parse time, before a pipeline or any
    // embedding work exists.
    match "svm".parse::<WaypointModel>() {
        Err(PipelineError::UnsupportedModel(name)) => assert_eq!(name, "svm"),
        other => panic!("expected UnsupportedModel, got {:?}", other),
    }
}

#[test]
fn test_timings_are_reported() {
    let labels = vec!["8259".to_string()];
    let filter = StubFilter::allowing(&["8259"]);
    let pipeline = build_pipeline(filter, Arc::new(StubEmbedder::new()));

    let outcome = pipeline.run(&labels, WaypointModel::Knn).unwrap();
    // Durations are measured, not invented; they only need to be present.
    assert!(outcome.timings.filter >= Duration::ZERO);
    assert!(outcome.timings.embed >= Duration::ZERO);
    assert!(outcome.timings.classify >= Duration::ZERO);
}

#[test]
fn test_unfitted_classifier_rejected_at_build() {
    let result = Pipeline::builder()
        .with_embedder(Arc::new(StubEmbedder::new()))
        .with_validity_filter(Box::new(StubFilter::rejecting_everything()))
        .with_knn(KnnClassifier::new(1).unwrap())
        .with_random_forest(fitted_forest())
        .build();
    assert!(result.is_err());
}

#[test]
fn test_mixed_votes_resolve_by_majority() {
    // Two strings map to waypoint 42's region, one to waypoint 7's.
    let labels = vec![
        "8259".to_string(),
        "ELECTRICAL ROOM".to_string(),
        "other room".to_string(),
    ];
    let filter = StubFilter::allowing(&["8259", "ELECTRICAL ROOM", "other room"]);
    let pipeline = build_pipeline(filter, Arc::new(StubEmbedder::new()));

    let outcome = pipeline.run(&labels, WaypointModel::Knn).unwrap();
    assert_eq!(outcome.per_string, vec![42, 42, 7]);
    assert_eq!(outcome.waypoint, 42);
}
