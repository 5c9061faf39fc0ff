//! Loading of the waypoint catalog used to train the stage-2 classifiers.
//!
//! The catalog is a JSON array of records, one per physical waypoint:
//!
//! ```json
//! [
//!   { "id": 42, "texts": ["ELECTRICAL ROOM", "8259", "Ra 8259"] },
//!   { "id": 43, "texts": ["JANITOR", "8261"] }
//! ]
//! ```

use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineError, SentenceEmbedder};

/// One waypoint and the label strings observed at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub id: i64,
    pub texts: Vec<String>,
}

/// Parses a waypoint catalog from a JSON string.
///
/// # Errors
/// - `ValidationError` if the JSON is malformed or the catalog is empty
pub fn parse_waypoints(json: &str) -> Result<Vec<WaypointRecord>, PipelineError> {
    let records: Vec<WaypointRecord> = serde_json::from_str(json)
        .map_err(|e| PipelineError::ValidationError(format!("Malformed waypoint catalog: {}", e)))?;

    if records.is_empty() {
        return Err(PipelineError::ValidationError(
            "Waypoint catalog contains no records".into(),
        ));
    }
    Ok(records)
}

/// Loads a waypoint catalog from disk.
///
/// # Errors
/// - `ArtifactError` naming the path if the file cannot be read
/// - `ValidationError` if the content is malformed
pub fn load_waypoints(path: &Path) -> Result<Vec<WaypointRecord>, PipelineError> {
    let json = fs::read_to_string(path).map_err(|e| PipelineError::ArtifactError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_waypoints(&json)
}

/// Embeds every text in the catalog and returns the training set: one
/// embedding row per text, paired with the owning waypoint's ID.
///
/// # Errors
/// - `ValidationError` if any record has no texts
/// - Any embedding error
pub fn build_training_set(
    records: &[WaypointRecord],
    embedder: &dyn SentenceEmbedder,
) -> Result<(Array2<f32>, Vec<i64>), PipelineError> {
    let mut texts = Vec::new();
    let mut labels = Vec::new();
    for record in records {
        if record.texts.is_empty() {
            return Err(PipelineError::ValidationError(format!(
                "Waypoint {} has no label texts",
                record.id
            )));
        }
        for text in &record.texts {
            texts.push(text.clone());
            labels.push(record.id);
        }
    }

    let embeddings = embedder.embed_batch(&texts)?;
    Ok((embeddings, labels))
}
