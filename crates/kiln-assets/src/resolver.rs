//! Asset path resolution.
//!
//! An [`AssetResolver`] is constructed once by the owning application and
//! passed explicitly into loader calls. There is no global or lazily
//! initialized asset root.

use crate::error::{AssetError, Result};
use std::path::{Path, PathBuf};

/// Resolves relative asset paths against an ordered list of root
/// directories.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    roots: Vec<PathBuf>,
}

impl AssetResolver {
    /// Create a resolver with a single root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Append another root, searched after the existing ones.
    pub fn push_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    /// The configured roots, in search order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a relative path against the roots, returning the first hit.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        for root in &self.roots {
            let candidate = root.join(relative);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(AssetError::Core(kiln_core::Error::NotFound(format!(
            "{} (searched roots: {})",
            relative.display(),
            self.roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_against_first_matching_root() {
        // Tests run with the crate directory as cwd, so the manifest exists.
        let mut resolver = AssetResolver::new("/nonexistent");
        resolver.push_root(".");
        let path = resolver.resolve("Cargo.toml").unwrap();
        assert!(path.ends_with("Cargo.toml"));
    }

    #[test]
    fn missing_file_lists_roots() {
        let resolver = AssetResolver::new("/a/b/c");
        let err = resolver.resolve("missing.ktx2").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing.ktx2"));
        assert!(message.contains("/a/b/c"));
    }
}
