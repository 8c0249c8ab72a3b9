//! Regression engines behind [`crate::core::Regressor`]

pub mod additive;

pub use additive::{AdditiveModel, AdditiveRegressor};
