//! Adam optimizer
//!
//! Adaptive-moment gradient descent with bias-corrected first and second
//! moments. One `Adam` instance carries the moment state for exactly one
//! parameter tensor.

use ndarray::{Array, Dimension};

#[derive(Debug, Clone)]
pub struct Adam<D: Dimension> {
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: i32,
    m: Array<f32, D>,
    v: Array<f32, D>,
}

impl<D: Dimension> Adam<D> {
    /// Zeroed moment state shaped like the given parameter tensor
    pub fn for_param(param: &Array<f32, D>) -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    /// Apply one update step in place
    pub fn step(&mut self, params: &mut Array<f32, D>, grads: &Array<f32, D>, lr: f32) {
        if !lr.is_finite() || lr <= 0.0 {
            return;
        }
        if params.raw_dim() != grads.raw_dim() {
            return;
        }

        self.t = self.t.saturating_add(1);

        self.m = &self.m * self.beta1 + grads * (1.0 - self.beta1);
        self.v = &self.v * self.beta2 + &grads.mapv(|g| g * g) * (1.0 - self.beta2);

        let bias1 = (1.0 - self.beta1.powi(self.t)).max(1e-12);
        let bias2 = (1.0 - self.beta2.powi(self.t)).max(1e-12);

        let m_hat = self.m.mapv(|m| m / bias1);
        let v_hat = self.v.mapv(|v| v / bias2);

        let update = m_hat / v_hat.mapv(|v| v.sqrt() + self.eps);
        *params = &*params - &(update * lr);
    }
}
