use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::PipelineError;

/// Writes a trained classifier to disk as JSON.
///
/// # Errors
/// - `ArtifactError` naming the path if the directory cannot be created or
///   the file cannot be written
pub fn save_artifact<T: Serialize>(value: &T, path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::ArtifactError {
            path: path.display().to_string(),
            reason: format!("failed to create parent directory: {}", e),
        })?;
    }

    let file = File::create(path).map_err(|e| PipelineError::ArtifactError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::to_writer(BufWriter::new(file), value).map_err(|e| {
        PipelineError::ArtifactError {
            path: path.display().to_string(),
            reason: format!("serialization failed: {}", e),
        }
    })
}

/// Loads a previously saved classifier from disk.
///
/// # Errors
/// - `ArtifactError` naming the path if the file is missing or does not
///   deserialize to the expected type
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::ArtifactError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| PipelineError::ArtifactError {
        path: path.display().to_string(),
        reason: format!("deserialization failed: {}", e),
    })
}
