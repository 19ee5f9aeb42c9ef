//! Network building blocks
//!
//! Dense layers, inverted dropout, the Adam optimizer, and the loss and
//! activation kernels used by the engagement model. Everything operates on
//! `ndarray` matrices with rows as samples.

pub mod dense;
pub mod loss;
pub mod optimizer;

pub use dense::{Dense, Dropout};
pub use optimizer::Adam;
