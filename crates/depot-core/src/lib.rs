//! # depot-core
//!
//! Core crate for Depot. Contains the unified error system, configuration
//! schemas, pagination types, the request context, and the object-store
//! capability trait.
//!
//! This crate has **no** internal dependencies on other Depot crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
