//! Core types for the kiln GPU helper library.
//!
//! This crate provides the foundation shared by the loaders and the GPU
//! layer:
//! - Ref-counted immutable byte storage for file contents
//! - Axis-aligned bounding box math
//! - Common error types

pub mod error;
pub mod math;
pub mod storage;

pub use error::{Error, Result};
pub use math::Aabb;
pub use storage::ByteStorage;
