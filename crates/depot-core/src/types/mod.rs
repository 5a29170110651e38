//! Shared type definitions used across Depot crates.

pub mod context;
pub mod pagination;

pub use context::RequestContext;
pub use pagination::{PageRequest, PageResponse};
