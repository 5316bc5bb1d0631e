//! Asset loading error types.

use thiserror::Error;

/// Errors produced while loading assets.
///
/// Every error aborts the load of that resource entirely; there is no
/// partial-failure or fallback-format behavior.
#[derive(Error, Debug)]
pub enum AssetError {
    /// File read failure.
    #[error(transparent)]
    Core(#[from] kiln_core::Error),

    /// File extension or pixel format the loaders do not handle.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// External parser failure, diagnostic passed through verbatim.
    #[error("Import of {path} failed: {message} (hint: make sure the asset pack is downloaded)")]
    Import { path: String, message: String },

    /// Structurally invalid container contents.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Offline conversion tool failure.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// GPU-side failure during upload or view/sampler creation.
    #[error("GPU error: {0}")]
    Gpu(#[from] kiln_gpu::GpuError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, AssetError>;
