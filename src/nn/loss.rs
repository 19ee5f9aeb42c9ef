//! Activations, losses, and metrics

use ndarray::{Array2, ArrayView1};
use std::cmp::Ordering;

pub fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

/// Derivative of relu evaluated at the pre-activation values
pub fn relu_grad(pre_activation: &Array2<f32>) -> Array2<f32> {
    pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

pub fn sigmoid(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Row-wise softmax with max subtraction for numerical stability
pub fn softmax_rows(x: &Array2<f32>) -> Array2<f32> {
    let mut out = x.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum().max(1e-12);
        row.mapv_inplace(|v| v / sum);
    }
    out
}

/// Mean squared error over all elements
pub fn mse(predictions: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    let n = predictions.len().max(1) as f32;
    let mut total = 0.0;
    for (&p, &t) in predictions.iter().zip(targets.iter()) {
        let diff = p - t;
        total += diff * diff;
    }
    total / n
}

/// Categorical cross-entropy, mean over rows. Expects `probs` to already be
/// a distribution (softmax output) and `targets` to be one-hot.
pub fn categorical_cross_entropy(probs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    let n = probs.nrows().max(1) as f32;
    let mut total = 0.0;
    for (prob_row, target_row) in probs.rows().into_iter().zip(targets.rows()) {
        for (&p, &t) in prob_row.iter().zip(target_row.iter()) {
            if t > 0.0 {
                total -= t * p.max(1e-12).ln();
            }
        }
    }
    total / n
}

/// Fraction of rows where the predicted argmax matches the target argmax
pub fn argmax_accuracy(probs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    let n = probs.nrows();
    if n == 0 {
        return 0.0;
    }
    let correct = probs
        .rows()
        .into_iter()
        .zip(targets.rows())
        .filter(|(prob_row, target_row)| argmax(*prob_row) == argmax(*target_row))
        .count();
    correct as f32 / n as f32
}

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_relu_clips_negatives() {
        let x = array![[-1.0, 0.0, 2.5]];
        assert_eq!(relu(&x), array![[0.0, 0.0, 2.5]]);
        assert_eq!(relu_grad(&x), array![[0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_sigmoid_bounds() {
        let x = array![[-50.0, 0.0, 50.0]];
        let y = sigmoid(&x);
        assert!(y[[0, 0]] >= 0.0 && y[[0, 0]] < 0.01);
        assert!((y[[0, 1]] - 0.5).abs() < 1e-6);
        assert!(y[[0, 2]] > 0.99 && y[[0, 2]] <= 1.0);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let x = array![[1.0, 2.0], [100.0, 100.0], [-500.0, 500.0]];
        let probs = softmax_rows(&x);
        for row in probs.rows() {
            let sum: f32 = row.sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
        assert!((probs[[1, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mse_known_value() {
        let pred = array![[0.5], [1.0]];
        let target = array![[0.0], [1.0]];
        assert!((mse(&pred, &target) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_perfect_prediction_near_zero() {
        let probs = array![[1.0, 0.0], [0.0, 1.0]];
        let targets = array![[1.0, 0.0], [0.0, 1.0]];
        assert!(categorical_cross_entropy(&probs, &targets) < 1e-5);
    }

    #[test]
    fn test_cross_entropy_uniform_prediction() {
        let probs = array![[0.5, 0.5]];
        let targets = array![[1.0, 0.0]];
        let expected = -(0.5f32.ln());
        assert!((categorical_cross_entropy(&probs, &targets) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_accuracy() {
        let probs = array![[0.9, 0.1], [0.3, 0.7], [0.6, 0.4]];
        let targets = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        assert!((argmax_accuracy(&probs, &targets) - 2.0 / 3.0).abs() < 1e-6);
    }
}
