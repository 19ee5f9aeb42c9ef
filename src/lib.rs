//! Blockpulse - engagement prediction and A/B decision engine for content blocks
//!
//! Two decoupled pipelines share one record schema:
//!
//! - **Prediction**: records → feature encoding → dual-head network
//!   (engagement score + variant preference), trained jointly.
//! - **Aggregation**: records tagged with a test id → per-variant metric
//!   accumulation → winner decision.
//!
//! The model never consumes aggregation state and the aggregator never
//! consumes model output.

pub mod abtest;
pub mod encoder;
pub mod error;
pub mod model;
pub mod nn;
pub mod synth;
pub mod types;

pub use abtest::{AbTest, AbTestStore, TestResults, VariantMetrics};
pub use encoder::{FeatureEncoder, TrainingBatch, FEATURE_DIM};
pub use error::PulseError;
pub use model::{CancelToken, EngagementModel, ModelCheckpoint, TrainConfig};
pub use types::{ClickTarget, EpochProgress, InteractionRecord, Prediction, Variant};

/// Crate version embedded in CLI output
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");
