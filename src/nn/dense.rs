//! Dense layer and dropout

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Fully connected layer with Glorot-normal initialized weights
#[derive(Debug, Clone)]
pub struct Dense {
    /// (fan_in, fan_out) weight matrix
    pub weights: Array2<f32>,
    /// (fan_out,) bias row, broadcast over samples
    pub bias: Array1<f32>,
}

impl Dense {
    /// Create a layer with Glorot-normal weights and zero bias
    pub fn glorot(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let std_dev = (2.0 / (fan_in + fan_out) as f32).sqrt();
        let normal = Normal::new(0.0, std_dev).expect("finite positive std dev");

        Self {
            weights: Array2::from_shape_fn((fan_in, fan_out), |_| normal.sample(rng)),
            bias: Array1::zeros(fan_out),
        }
    }

    pub fn fan_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn fan_out(&self) -> usize {
        self.weights.ncols()
    }

    /// Pre-activation forward pass: `x W + b`
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weights) + &self.bias
    }

    /// Backward pass given the forward input and the gradient at the
    /// pre-activation output. Returns (grad_input, grad_weights, grad_bias).
    pub fn backward(
        &self,
        input: &Array2<f32>,
        grad_output: &Array2<f32>,
    ) -> (Array2<f32>, Array2<f32>, Array1<f32>) {
        let grad_weights = input.t().dot(grad_output);
        let grad_bias = grad_output.sum_axis(Axis(0));
        let grad_input = grad_output.dot(&self.weights.t());
        (grad_input, grad_weights, grad_bias)
    }

    pub fn param_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// Inverted dropout: kept activations are scaled by 1/keep so eval-mode
/// forward passes need no rescaling
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    rate: f32,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        Self {
            rate: if rate.is_finite() {
                rate.clamp(0.0, 0.95)
            } else {
                0.0
            },
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Sample a multiplicative mask. Applied to both activations and, during
    /// backprop, to the incoming gradient.
    pub fn sample_mask(&self, rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f32> {
        let keep = 1.0 - self.rate;
        if keep >= 1.0 {
            return Array2::ones((rows, cols));
        }
        let scale = 1.0 / keep;
        Array2::from_shape_fn((rows, cols), |_| {
            if rng.gen::<f32>() < keep {
                scale
            } else {
                0.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_glorot_init_shape_and_spread() {
        let mut rng = StdRng::seed_from_u64(42);
        let layer = Dense::glorot(7, 128, &mut rng);

        assert_eq!(layer.weights.dim(), (7, 128));
        assert_eq!(layer.bias.len(), 128);
        assert_eq!(layer.param_count(), 7 * 128 + 128);

        // Weights should be spread around zero, not constant
        let mean = layer.weights.sum() / layer.weights.len() as f32;
        assert!(mean.abs() < 0.05);
        assert!(layer.weights.iter().any(|&w| w > 0.0));
        assert!(layer.weights.iter().any(|&w| w < 0.0));
    }

    #[test]
    fn test_forward_known_values() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Dense::glorot(2, 2, &mut rng);
        layer.weights = array![[1.0, 2.0], [3.0, 4.0]];
        layer.bias = array![0.5, -0.5];

        let out = layer.forward(&array![[1.0, 1.0]]);
        assert_eq!(out, array![[4.5, 5.5]]);
    }

    #[test]
    fn test_backward_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Dense::glorot(7, 32, &mut rng);
        let input = Array2::ones((5, 7));
        let grad_output = Array2::ones((5, 32));

        let (grad_input, grad_weights, grad_bias) = layer.backward(&input, &grad_output);
        assert_eq!(grad_input.dim(), (5, 7));
        assert_eq!(grad_weights.dim(), (7, 32));
        assert_eq!(grad_bias.len(), 32);
        // Bias gradient sums over the batch axis
        assert_eq!(grad_bias[0], 5.0);
    }

    #[test]
    fn test_dropout_mask_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let dropout = Dropout::new(0.3);
        let mask = dropout.sample_mask(50, 50, &mut rng);

        let scale = 1.0 / 0.7;
        for &v in mask.iter() {
            assert!(v == 0.0 || (v - scale).abs() < 1e-6);
        }
        let kept = mask.iter().filter(|&&v| v > 0.0).count() as f32;
        let keep_ratio = kept / mask.len() as f32;
        assert!((keep_ratio - 0.7).abs() < 0.1);
    }

    #[test]
    fn test_zero_rate_dropout_is_identity() {
        let mut rng = StdRng::seed_from_u64(9);
        let dropout = Dropout::new(0.0);
        let mask = dropout.sample_mask(4, 4, &mut rng);
        assert!(mask.iter().all(|&v| v == 1.0));
    }
}
