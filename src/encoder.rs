//! Feature encoding
//!
//! This module turns interaction records into fixed-length numeric features
//! and training targets. Two normalization modes exist on purpose:
//!
//! - **Batch mode** (training): each numeric feature is divided by its max
//!   over the batch. A zero max makes normalization undefined and is rejected
//!   as [`PulseError::DegenerateBatch`].
//! - **Inference mode**: fixed denominators (200 clicks, 100s hover, 60s
//!   engagement) so a single record can be featurized without a reference
//!   population. Known limitation: batch-relative training statistics are not
//!   persisted, so train-time and inference-time scales can differ.

use ndarray::Array2;

use crate::error::PulseError;
use crate::types::{InteractionRecord, CLICK_TARGET_COUNT, VARIANT_COUNT};

/// Feature vector width: 3 normalized numerics + click target one-hot
pub const FEATURE_DIM: usize = 3 + CLICK_TARGET_COUNT;

/// Inference-mode normalization denominators
pub const INFER_MAX_CLICKS: f64 = 200.0;
pub const INFER_MAX_HOVER: f64 = 100.0;
pub const INFER_MAX_ENGAGEMENT: f64 = 60.0;

/// A conversion counts this many times a raw click in the score target
pub const CONVERSION_WEIGHT: f64 = 10.0;

/// Additive offset in the score target denominator, keeping targets well
/// inside [0, 1] even for the highest-engagement record in a batch
pub const SCORE_DENOMINATOR_OFFSET: f64 = 300.0;

/// Encoded training data: inputs plus both target heads, row-aligned
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    /// (n, 7) feature matrix
    pub inputs: Array2<f32>,
    /// (n, 1) engagement score targets in [0, 1]
    pub score_targets: Array2<f32>,
    /// (n, 2) variant one-hot targets
    pub variant_targets: Array2<f32>,
}

impl TrainingBatch {
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }
}

/// Encoder for converting records to feature vectors and targets
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Encode a batch of records with batch-relative normalization.
    ///
    /// Deterministic: repeated calls on the same records produce identical
    /// output. Fails on an empty batch, on out-of-domain record values, and
    /// on any zero per-feature max.
    pub fn encode_batch(records: &[InteractionRecord]) -> Result<TrainingBatch, PulseError> {
        if records.is_empty() {
            return Err(PulseError::DegenerateBatch("batch size"));
        }
        for record in records {
            record.validate()?;
        }

        let max_clicks = records
            .iter()
            .map(|r| r.click_count)
            .max()
            .unwrap_or(0) as f64;
        let max_hover = records.iter().map(|r| r.hover_time).fold(0.0, f64::max);
        let max_engagement = records
            .iter()
            .map(|r| r.engagement_duration)
            .fold(0.0, f64::max);

        if max_clicks == 0.0 {
            return Err(PulseError::DegenerateBatch("click_count"));
        }
        if max_hover == 0.0 {
            return Err(PulseError::DegenerateBatch("hover_time"));
        }
        if max_engagement == 0.0 {
            return Err(PulseError::DegenerateBatch("engagement_duration"));
        }

        let n = records.len();
        let mut inputs = Array2::zeros((n, FEATURE_DIM));
        let mut score_targets = Array2::zeros((n, 1));
        let mut variant_targets = Array2::zeros((n, VARIANT_COUNT));

        for (i, record) in records.iter().enumerate() {
            inputs[[i, 0]] = (record.click_count as f64 / max_clicks) as f32;
            inputs[[i, 1]] = (record.hover_time / max_hover) as f32;
            inputs[[i, 2]] = (record.engagement_duration / max_engagement) as f32;
            for (j, &indicator) in record.click_target.one_hot().iter().enumerate() {
                inputs[[i, 3 + j]] = indicator;
            }

            let score = (record.click_count as f64
                + record.conversions as f64 * CONVERSION_WEIGHT)
                / (max_clicks + SCORE_DENOMINATOR_OFFSET);
            score_targets[[i, 0]] = score as f32;

            variant_targets[[i, record.variant.index()]] = 1.0;
        }

        Ok(TrainingBatch {
            inputs,
            score_targets,
            variant_targets,
        })
    }

    /// Encode a single record with fixed inference-mode denominators.
    ///
    /// Values beyond the fixed ranges are clamped to 1.0 so features stay in
    /// [0, 1] regardless of input magnitude.
    pub fn encode_one(record: &InteractionRecord) -> Result<[f32; FEATURE_DIM], PulseError> {
        record.validate()?;

        let mut features = [0.0f32; FEATURE_DIM];
        features[0] = (record.click_count as f64 / INFER_MAX_CLICKS).clamp(0.0, 1.0) as f32;
        features[1] = (record.hover_time / INFER_MAX_HOVER).clamp(0.0, 1.0) as f32;
        features[2] = (record.engagement_duration / INFER_MAX_ENGAGEMENT).clamp(0.0, 1.0) as f32;
        for (j, &indicator) in record.click_target.one_hot().iter().enumerate() {
            features[3 + j] = indicator;
        }
        Ok(features)
    }
}
