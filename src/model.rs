//! Engagement model
//!
//! A feed-forward network with a shared trunk and two output heads:
//! a sigmoid score head predicting an engagement score in [0, 1], and a
//! softmax variant head predicting an A/B preference distribution. The two
//! losses (score MSE + variant cross-entropy) are summed and optimized
//! jointly through the shared trunk with a single Adam step per minibatch.
//!
//! `train` takes `&mut self` and `predict` takes `&self`, so the borrow
//! checker enforces the single-writer rule around the model parameters.

use ndarray::{Array2, Axis, Ix1, Ix2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::encoder::{FeatureEncoder, FEATURE_DIM};
use crate::error::PulseError;
use crate::nn::{loss, Adam, Dense, Dropout};
use crate::types::{EpochProgress, InteractionRecord, Prediction};

const TRUNK1_UNITS: usize = 128;
const TRUNK2_UNITS: usize = 64;
const TRUNK3_UNITS: usize = 32;
const SCORE_UNITS: usize = 1;
const VARIANT_UNITS: usize = 2;

const DROPOUT1_RATE: f32 = 0.3;
const DROPOUT2_RATE: f32 = 0.2;

/// Expected (fan_in, fan_out) per layer, trunk first, heads last
const LAYER_DIMS: [(usize, usize); 5] = [
    (FEATURE_DIM, TRUNK1_UNITS),
    (TRUNK1_UNITS, TRUNK2_UNITS),
    (TRUNK2_UNITS, TRUNK3_UNITS),
    (TRUNK3_UNITS, SCORE_UNITS),
    (TRUNK3_UNITS, VARIANT_UNITS),
];

/// Cooperative cancellation handle, checked between epochs
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Training hyperparameters
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of passes over the training split
    pub epochs: usize,
    /// Minibatch size
    pub batch_size: usize,
    /// Fraction of the batch held out for validation each epoch
    pub validation_split: f64,
    /// Adam learning rate
    pub learning_rate: f32,
    /// Reshuffle sample order every epoch
    pub shuffle: bool,
    /// Optional cancellation handle; training stops between epochs
    pub cancel: Option<CancelToken>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 0.001,
            shuffle: true,
            cancel: None,
        }
    }
}

struct LayerOpt {
    weights: Adam<Ix2>,
    bias: Adam<Ix1>,
}

impl LayerOpt {
    fn for_layer(layer: &Dense) -> Self {
        Self {
            weights: Adam::for_param(&layer.weights),
            bias: Adam::for_param(&layer.bias),
        }
    }
}

/// The dual-head engagement model
pub struct EngagementModel {
    trunk1: Dense,
    trunk2: Dense,
    trunk3: Dense,
    score_head: Dense,
    variant_head: Dense,

    dropout1: Dropout,
    dropout2: Dropout,

    opt_trunk1: LayerOpt,
    opt_trunk2: LayerOpt,
    opt_trunk3: LayerOpt,
    opt_score: LayerOpt,
    opt_variant: LayerOpt,

    rng: StdRng,
}

impl Default for EngagementModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EngagementModel {
    /// Create a model with entropy-seeded weight initialization
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a model with a fixed seed for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut rng: StdRng) -> Self {
        let trunk1 = Dense::glorot(FEATURE_DIM, TRUNK1_UNITS, &mut rng);
        let trunk2 = Dense::glorot(TRUNK1_UNITS, TRUNK2_UNITS, &mut rng);
        let trunk3 = Dense::glorot(TRUNK2_UNITS, TRUNK3_UNITS, &mut rng);
        let score_head = Dense::glorot(TRUNK3_UNITS, SCORE_UNITS, &mut rng);
        let variant_head = Dense::glorot(TRUNK3_UNITS, VARIANT_UNITS, &mut rng);

        Self {
            opt_trunk1: LayerOpt::for_layer(&trunk1),
            opt_trunk2: LayerOpt::for_layer(&trunk2),
            opt_trunk3: LayerOpt::for_layer(&trunk3),
            opt_score: LayerOpt::for_layer(&score_head),
            opt_variant: LayerOpt::for_layer(&variant_head),
            trunk1,
            trunk2,
            trunk3,
            score_head,
            variant_head,
            dropout1: Dropout::new(DROPOUT1_RATE),
            dropout2: Dropout::new(DROPOUT2_RATE),
            rng,
        }
    }

    pub fn param_count(&self) -> usize {
        self.trunk1.param_count()
            + self.trunk2.param_count()
            + self.trunk3.param_count()
            + self.score_head.param_count()
            + self.variant_head.param_count()
    }

    /// Train on a batch of records.
    ///
    /// Records are encoded with batch-relative normalization. A trailing
    /// validation slice is carved out once and never trained on; only the
    /// training portion is reshuffled each epoch. `on_epoch`
    /// receives one [`EpochProgress`] per completed epoch; with an empty
    /// validation split the `val_*` fields repeat the training metrics.
    ///
    /// A non-finite loss aborts training with [`PulseError::Training`].
    /// Cancellation via [`TrainConfig::cancel`] stops cleanly between epochs
    /// and returns `Ok`.
    pub fn train<F>(
        &mut self,
        records: &[InteractionRecord],
        config: &TrainConfig,
        mut on_epoch: F,
    ) -> Result<(), PulseError>
    where
        F: FnMut(&EpochProgress),
    {
        let batch = FeatureEncoder::encode_batch(records)?;
        let n = batch.len();

        let val_count = ((n as f64) * config.validation_split.clamp(0.0, 0.9)).round() as usize;
        let val_count = val_count.min(n.saturating_sub(1));
        let train_count = n - val_count;

        let batch_size = config.batch_size.max(1);

        // Fixed trailing holdout: validation rows stay out of every
        // training minibatch for the whole run
        let mut train_idx: Vec<usize> = (0..train_count).collect();
        let val_idx: Vec<usize> = (train_count..n).collect();

        for epoch in 0..config.epochs {
            if let Some(token) = &config.cancel {
                if token.is_cancelled() {
                    break;
                }
            }

            if config.shuffle {
                train_idx.shuffle(&mut self.rng);
            }

            let mut weighted_score_loss = 0.0f64;
            let mut weighted_accuracy = 0.0f64;
            let mut seen = 0.0f64;

            for chunk in train_idx.chunks(batch_size) {
                let x = batch.inputs.select(Axis(0), chunk);
                let score_targets = batch.score_targets.select(Axis(0), chunk);
                let variant_targets = batch.variant_targets.select(Axis(0), chunk);

                let (score_mse, variant_acc) = self.train_minibatch(
                    &x,
                    &score_targets,
                    &variant_targets,
                    config.learning_rate,
                    epoch,
                )?;

                let weight = chunk.len() as f64;
                weighted_score_loss += score_mse as f64 * weight;
                weighted_accuracy += variant_acc as f64 * weight;
                seen += weight;
            }

            let score_loss = weighted_score_loss / seen.max(1.0);
            let variant_accuracy = weighted_accuracy / seen.max(1.0);

            let (val_score_loss, val_variant_accuracy) = if val_idx.is_empty() {
                (score_loss, variant_accuracy)
            } else {
                let x_val = batch.inputs.select(Axis(0), &val_idx);
                let score_val = batch.score_targets.select(Axis(0), &val_idx);
                let variant_val = batch.variant_targets.select(Axis(0), &val_idx);
                let (score_pred, variant_pred) = self.forward_eval(&x_val);
                (
                    loss::mse(&score_pred, &score_val) as f64,
                    loss::argmax_accuracy(&variant_pred, &variant_val) as f64,
                )
            };

            on_epoch(&EpochProgress {
                epoch: epoch + 1,
                score_loss,
                variant_accuracy,
                val_score_loss,
                val_variant_accuracy,
            });
        }

        Ok(())
    }

    /// Predict the engagement score and variant preference for one record.
    ///
    /// Uses inference-mode normalization and an eval-mode forward pass
    /// (dropout disabled). Does not mutate model parameters.
    pub fn predict(&self, record: &InteractionRecord) -> Result<Prediction, PulseError> {
        let features = FeatureEncoder::encode_one(record)?;
        let input = Array2::from_shape_vec((1, FEATURE_DIM), features.to_vec())
            .map_err(|e| PulseError::InvalidValue(e.to_string()))?;

        let (score, variant) = self.forward_eval(&input);

        Ok(Prediction {
            score: score[[0, 0]] as f64,
            variant_a: variant[[0, 0]] as f64,
            variant_b: variant[[0, 1]] as f64,
        })
    }

    /// Forward pass without dropout. Inverted dropout masks make the
    /// eval-mode pass a plain composition of the layers.
    fn forward_eval(&self, input: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let a1 = loss::relu(&self.trunk1.forward(input));
        let a2 = loss::relu(&self.trunk2.forward(&a1));
        let a3 = loss::relu(&self.trunk3.forward(&a2));

        let score = loss::sigmoid(&self.score_head.forward(&a3));
        let variant = loss::softmax_rows(&self.variant_head.forward(&a3));
        (score, variant)
    }

    /// One forward/backward/update cycle on a minibatch. Returns the score
    /// MSE and variant accuracy for the batch.
    fn train_minibatch(
        &mut self,
        x: &Array2<f32>,
        score_targets: &Array2<f32>,
        variant_targets: &Array2<f32>,
        lr: f32,
        epoch: usize,
    ) -> Result<(f32, f32), PulseError> {
        let m = x.nrows() as f32;

        // Forward with dropout masks on the first two trunk activations
        let z1 = self.trunk1.forward(x);
        let a1 = loss::relu(&z1);
        let mask1 = self.dropout1.sample_mask(a1.nrows(), a1.ncols(), &mut self.rng);
        let a1_dropped = &a1 * &mask1;

        let z2 = self.trunk2.forward(&a1_dropped);
        let a2 = loss::relu(&z2);
        let mask2 = self.dropout2.sample_mask(a2.nrows(), a2.ncols(), &mut self.rng);
        let a2_dropped = &a2 * &mask2;

        let z3 = self.trunk3.forward(&a2_dropped);
        let a3 = loss::relu(&z3);

        let score_pred = loss::sigmoid(&self.score_head.forward(&a3));
        let variant_pred = loss::softmax_rows(&self.variant_head.forward(&a3));

        let score_mse = loss::mse(&score_pred, score_targets);
        let variant_ce = loss::categorical_cross_entropy(&variant_pred, variant_targets);
        let total_loss = score_mse + variant_ce;
        if !total_loss.is_finite() {
            return Err(PulseError::Training(format!(
                "non-finite loss at epoch {}",
                epoch + 1
            )));
        }

        // Backward: both head gradients flow into the shared trunk.
        // Sigmoid + MSE: dL/dz = 2 (p - y) p (1 - p) / m
        let grad_score_z =
            (&score_pred - score_targets) * &score_pred.mapv(|p| p * (1.0 - p)) * (2.0 / m);
        // Softmax + cross-entropy: dL/dz = (p - t) / m
        let grad_variant_z = (&variant_pred - variant_targets) / m;

        let (grad_a3_score, gw_score, gb_score) =
            self.score_head.backward(&a3, &grad_score_z);
        let (grad_a3_variant, gw_variant, gb_variant) =
            self.variant_head.backward(&a3, &grad_variant_z);
        let grad_a3 = grad_a3_score + grad_a3_variant;

        let grad_z3 = &grad_a3 * &loss::relu_grad(&z3);
        let (grad_a2_dropped, gw3, gb3) = self.trunk3.backward(&a2_dropped, &grad_z3);

        let grad_a2 = &grad_a2_dropped * &mask2;
        let grad_z2 = &grad_a2 * &loss::relu_grad(&z2);
        let (grad_a1_dropped, gw2, gb2) = self.trunk2.backward(&a1_dropped, &grad_z2);

        let grad_a1 = &grad_a1_dropped * &mask1;
        let grad_z1 = &grad_a1 * &loss::relu_grad(&z1);
        let (_, gw1, gb1) = self.trunk1.backward(x, &grad_z1);

        self.opt_trunk1.weights.step(&mut self.trunk1.weights, &gw1, lr);
        self.opt_trunk1.bias.step(&mut self.trunk1.bias, &gb1, lr);
        self.opt_trunk2.weights.step(&mut self.trunk2.weights, &gw2, lr);
        self.opt_trunk2.bias.step(&mut self.trunk2.bias, &gb2, lr);
        self.opt_trunk3.weights.step(&mut self.trunk3.weights, &gw3, lr);
        self.opt_trunk3.bias.step(&mut self.trunk3.bias, &gb3, lr);
        self.opt_score.weights.step(&mut self.score_head.weights, &gw_score, lr);
        self.opt_score.bias.step(&mut self.score_head.bias, &gb_score, lr);
        self.opt_variant.weights.step(&mut self.variant_head.weights, &gw_variant, lr);
        self.opt_variant.bias.step(&mut self.variant_head.bias, &gb_variant, lr);

        let accuracy = loss::argmax_accuracy(&variant_pred, variant_targets);
        Ok((score_mse, accuracy))
    }

    /// Snapshot the trained parameters
    pub fn to_checkpoint(&self) -> ModelCheckpoint {
        ModelCheckpoint {
            layers: self.layers().map(LayerCheckpoint::from_layer).to_vec(),
        }
    }

    /// Rebuild a model from a checkpoint. Optimizer state and dropout RNG
    /// start fresh; the architecture must match exactly.
    pub fn from_checkpoint(checkpoint: &ModelCheckpoint) -> Result<Self, PulseError> {
        if checkpoint.layers.len() != LAYER_DIMS.len() {
            return Err(PulseError::Checkpoint(format!(
                "expected {} layers, got {}",
                LAYER_DIMS.len(),
                checkpoint.layers.len()
            )));
        }

        let mut model = Self::new();
        let mut restored = Vec::with_capacity(LAYER_DIMS.len());
        for (layer, &(fan_in, fan_out)) in checkpoint.layers.iter().zip(LAYER_DIMS.iter()) {
            restored.push(layer.to_layer(fan_in, fan_out)?);
        }

        // Order matches LAYER_DIMS
        model.variant_head = restored.pop().expect("five layers restored");
        model.score_head = restored.pop().expect("five layers restored");
        model.trunk3 = restored.pop().expect("five layers restored");
        model.trunk2 = restored.pop().expect("five layers restored");
        model.trunk1 = restored.pop().expect("five layers restored");

        model.opt_trunk1 = LayerOpt::for_layer(&model.trunk1);
        model.opt_trunk2 = LayerOpt::for_layer(&model.trunk2);
        model.opt_trunk3 = LayerOpt::for_layer(&model.trunk3);
        model.opt_score = LayerOpt::for_layer(&model.score_head);
        model.opt_variant = LayerOpt::for_layer(&model.variant_head);

        Ok(model)
    }

    /// Serialize the parameters to JSON
    pub fn to_json(&self) -> Result<String, PulseError> {
        Ok(serde_json::to_string(&self.to_checkpoint())?)
    }

    /// Rebuild a model from checkpoint JSON
    pub fn from_json(json: &str) -> Result<Self, PulseError> {
        let checkpoint: ModelCheckpoint = serde_json::from_str(json)?;
        Self::from_checkpoint(&checkpoint)
    }

    fn layers(&self) -> [&Dense; 5] {
        [
            &self.trunk1,
            &self.trunk2,
            &self.trunk3,
            &self.score_head,
            &self.variant_head,
        ]
    }
}

/// Flat parameter snapshot of one dense layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerCheckpoint {
    pub fan_in: usize,
    pub fan_out: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl LayerCheckpoint {
    fn from_layer(layer: &Dense) -> Self {
        Self {
            fan_in: layer.fan_in(),
            fan_out: layer.fan_out(),
            weights: layer.weights.iter().copied().collect(),
            bias: layer.bias.iter().copied().collect(),
        }
    }

    fn to_layer(&self, fan_in: usize, fan_out: usize) -> Result<Dense, PulseError> {
        if self.fan_in != fan_in || self.fan_out != fan_out {
            return Err(PulseError::Checkpoint(format!(
                "layer shape mismatch: expected {}x{}, got {}x{}",
                fan_in, fan_out, self.fan_in, self.fan_out
            )));
        }
        if self.weights.len() != fan_in * fan_out || self.bias.len() != fan_out {
            return Err(PulseError::Checkpoint(format!(
                "layer parameter count mismatch for {}x{} layer",
                fan_in, fan_out
            )));
        }

        let weights = Array2::from_shape_vec((fan_in, fan_out), self.weights.clone())
            .map_err(|e| PulseError::Checkpoint(e.to_string()))?;
        let bias = ndarray::Array1::from_vec(self.bias.clone());
        Ok(Dense { weights, bias })
    }
}

/// Serializable snapshot of the full model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub layers: Vec<LayerCheckpoint>,
}
