//! Core types for the Blockpulse pipelines
//!
//! This module defines the interaction record schema shared by the predictive
//! model and the A/B aggregation engine, plus the closed categorical domains
//! for click targets and content variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PulseError;

/// Where a click landed inside a content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickTarget {
    Button,
    Image,
    Text,
    Link,
}

/// Number of click target categories (one-hot width)
pub const CLICK_TARGET_COUNT: usize = 4;

impl ClickTarget {
    /// Fixed one-hot position: [button, image, text, link]
    pub fn index(&self) -> usize {
        match self {
            ClickTarget::Button => 0,
            ClickTarget::Image => 1,
            ClickTarget::Text => 2,
            ClickTarget::Link => 3,
        }
    }

    pub fn one_hot(&self) -> [f32; CLICK_TARGET_COUNT] {
        let mut encoding = [0.0; CLICK_TARGET_COUNT];
        encoding[self.index()] = 1.0;
        encoding
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClickTarget::Button => "button",
            ClickTarget::Image => "image",
            ClickTarget::Text => "text",
            ClickTarget::Link => "link",
        }
    }
}

impl FromStr for ClickTarget {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "button" => Ok(ClickTarget::Button),
            "image" => Ok(ClickTarget::Image),
            "text" => Ok(ClickTarget::Text),
            "link" => Ok(ClickTarget::Link),
            other => Err(PulseError::UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for ClickTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content variant under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

/// Number of variants (one-hot width)
pub const VARIANT_COUNT: usize = 2;

impl Variant {
    /// Fixed one-hot position: [A, B]
    pub fn index(&self) -> usize {
        match self {
            Variant::A => 0,
            Variant::B => 1,
        }
    }

    pub fn one_hot(&self) -> [f32; VARIANT_COUNT] {
        let mut encoding = [0.0; VARIANT_COUNT];
        encoding[self.index()] = 1.0;
        encoding
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }
}

impl FromStr for Variant {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Variant::A),
            "B" => Ok(Variant::B),
            other => Err(PulseError::UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed interaction with a content block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Stable identifier of the content block
    pub block_id: String,
    /// Display title (not used numerically)
    pub title: String,
    /// Display content (not used numerically)
    pub content: String,
    /// Number of clicks observed
    pub click_count: u32,
    /// Cumulative hover time (seconds)
    pub hover_time: f64,
    /// Engagement duration (seconds)
    pub engagement_duration: f64,
    /// Where the click landed
    pub click_target: ClickTarget,
    /// Which content version this record observed
    pub variant: Variant,
    /// Cohort assignment, carried but not consumed by the core
    pub ab_test_group: Variant,
    /// Completed goal actions
    pub conversions: u32,
}

impl InteractionRecord {
    /// Check the value constraints the schema promises: durations must be
    /// finite and non-negative. Counts are non-negative by construction.
    pub fn validate(&self) -> Result<(), PulseError> {
        if !self.hover_time.is_finite() || self.hover_time < 0.0 {
            return Err(PulseError::InvalidValue(format!(
                "hover_time must be finite and >= 0, got {}",
                self.hover_time
            )));
        }
        if !self.engagement_duration.is_finite() || self.engagement_duration < 0.0 {
            return Err(PulseError::InvalidValue(format!(
                "engagement_duration must be finite and >= 0, got {}",
                self.engagement_duration
            )));
        }
        Ok(())
    }
}

/// Model output for a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted engagement score (0-1)
    pub score: f64,
    /// Probability that variant A performs better
    pub variant_a: f64,
    /// Probability that variant B performs better
    pub variant_b: f64,
}

/// Per-epoch training progress, emitted once per completed epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochProgress {
    /// Epoch number, 1-based
    pub epoch: usize,
    /// Mean squared error of the score head over the training split
    pub score_loss: f64,
    /// Classification accuracy of the variant head over the training split
    pub variant_accuracy: f64,
    /// Score MSE over the held-out validation split
    pub val_score_loss: f64,
    /// Variant accuracy over the held-out validation split
    pub val_variant_accuracy: f64,
}
