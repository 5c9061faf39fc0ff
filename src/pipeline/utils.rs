use ndarray::Array2;

pub(crate) fn normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.rows_mut() {
        let norm: f32 = row.iter().map(|&x| x * x).sum::<f32>().sqrt();
        if norm > 1e-10 {
            row.mapv_inplace(|x| x / norm);
        } else {
            row.fill(0.0);
        }
    }
}

pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_rows() {
        let mut m = array![[3.0_f32, 4.0], [0.0, 2.0]];
        normalize_rows(&mut m);
        for row in m.rows() {
            let norm: f32 = row.iter().map(|&x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_zero_row_stays_zero() {
        let mut m = array![[0.0_f32, 0.0], [1.0, 0.0]];
        normalize_rows(&mut m);
        assert!(m.row(0).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }
}
