//! Test harness for the kiln GPU helper library.
//!
//! Provides headless GPU bring-up and round-trip verification helpers for
//! tests that need a real Vulkan device, plus synthetic asset builders that
//! work without one.

pub mod harness;

pub use harness::{checkerboard_texture, quad_obj_source, HeadlessGpu};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("GPU error: {0}")]
    Gpu(String),
    #[error("Asset error: {0}")]
    Asset(String),
    #[error("Verification failed: {0}")]
    Mismatch(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TestError>;

/// Install a fmt subscriber honoring `RUST_LOG`, once per process.
///
/// Safe to call from every test; repeat installs are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
