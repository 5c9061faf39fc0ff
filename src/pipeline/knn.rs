use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::vote::majority_vote;
use super::WaypointClassifier;

/// K-nearest-neighbor waypoint classifier over sentence embeddings.
///
/// Training simply stores the `(embedding, waypoint-id)` pairs; prediction
/// finds the `k` training rows closest to each query by squared Euclidean
/// distance and takes the majority label among them (ties resolved to the
/// smallest waypoint ID, like every vote in this crate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    k: usize,
    train_x: Array2<f32>,
    train_y: Vec<i64>,
}

impl KnnClassifier {
    /// Creates an untrained classifier with the given neighbor count.
    ///
    /// # Errors
    /// - `ValidationError` if `k` is zero
    pub fn new(k: usize) -> Result<Self, PipelineError> {
        if k == 0 {
            return Err(PipelineError::ValidationError(
                "Neighbor count k must be at least 1".into(),
            ));
        }
        Ok(Self {
            k,
            train_x: Array2::zeros((0, 0)),
            train_y: Vec::new(),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_fitted(&self) -> bool {
        !self.train_y.is_empty()
    }

    fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y) * (x - y))
            .sum()
    }

    fn predict_one(&self, query: ArrayView1<f32>) -> Result<i64, PipelineError> {
        let mut distances: Vec<(f32, i64)> = self
            .train_x
            .rows()
            .into_iter()
            .zip(self.train_y.iter())
            .map(|(row, &label)| (Self::squared_distance(query, row), label))
            .collect();

        distances
            .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let neighbors: Vec<i64> = distances
            .iter()
            .take(self.k.min(distances.len()))
            .map(|&(_, label)| label)
            .collect();

        majority_vote(&neighbors)
    }
}

impl WaypointClassifier for KnnClassifier {
    /// Stores the training embeddings and their waypoint IDs.
    ///
    /// # Errors
    /// - `ValidationError` if the training set is empty or the number of
    ///   labels does not match the number of embedding rows
    fn fit(&mut self, embeddings: ArrayView2<f32>, labels: &[i64]) -> Result<(), PipelineError> {
        if embeddings.nrows() == 0 {
            return Err(PipelineError::ValidationError(
                "Cannot fit on an empty training set".into(),
            ));
        }
        if embeddings.nrows() != labels.len() {
            return Err(PipelineError::ValidationError(format!(
                "Embedding count ({}) does not match label count ({})",
                embeddings.nrows(),
                labels.len()
            )));
        }

        self.train_x = embeddings.to_owned();
        self.train_y = labels.to_vec();
        Ok(())
    }

    fn predict(&self, embeddings: ArrayView2<f32>) -> Result<Vec<i64>, PipelineError> {
        if !self.is_fitted() {
            return Err(PipelineError::ValidationError(
                "Classifier has not been fitted".into(),
            ));
        }
        if embeddings.nrows() == 0 {
            return Err(PipelineError::ValidationError(
                "Cannot predict on an empty embedding batch".into(),
            ));
        }
        if embeddings.ncols() != self.train_x.ncols() {
            return Err(PipelineError::ValidationError(format!(
                "Query embedding size ({}) does not match training embedding size ({})",
                embeddings.ncols(),
                self.train_x.ncols()
            )));
        }

        embeddings
            .rows()
            .into_iter()
            .map(|row| self.predict_one(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fitted_classifier(k: usize) -> KnnClassifier {
        // Two clusters on a 2-d plane: waypoint 1 near the origin,
        // waypoint 2 near (10, 10).
        let x = array![
            [0.0_f32, 0.0],
            [0.5, 0.0],
            [0.0, 0.5],
            [10.0, 10.0],
            [10.5, 10.0],
            [10.0, 10.5],
        ];
        let y = vec![1, 1, 1, 2, 2, 2];
        let mut knn = KnnClassifier::new(k).unwrap();
        knn.fit(x.view(), &y).unwrap();
        knn
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(KnnClassifier::new(0).is_err());
    }

    #[test]
    fn test_nearest_cluster_wins() {
        let knn = fitted_classifier(3);
        let queries = array![[0.2_f32, 0.2], [9.8, 9.9]];
        let preds = knn.predict(queries.view()).unwrap();
        assert_eq!(preds, vec![1, 2]);
    }

    #[test]
    fn test_single_neighbor() {
        let knn = fitted_classifier(1);
        let queries = array![[10.1_f32, 10.1]];
        assert_eq!(knn.predict(queries.view()).unwrap(), vec![2]);
    }

    #[test]
    fn test_mismatched_labels_rejected() {
        let mut knn = KnnClassifier::new(1).unwrap();
        let x = array![[0.0_f32, 0.0], [1.0, 1.0]];
        assert!(knn.fit(x.view(), &[1]).is_err());
    }

    #[test]
    fn test_unfitted_prediction_rejected() {
        let knn = KnnClassifier::new(1).unwrap();
        let queries = array![[0.0_f32, 0.0]];
        assert!(knn.predict(queries.view()).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let knn = fitted_classifier(1);
        let queries = array![[0.0_f32, 0.0, 0.0]];
        assert!(knn.predict(queries.view()).is_err());
    }
}
