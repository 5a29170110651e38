//! Validation (review) entities.

pub mod model;

pub use model::{CreateValidation, Validation, ValidationState};
