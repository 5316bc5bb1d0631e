//! Ref-counted immutable byte storage.
//!
//! File contents are read once into a shared allocation; loaders hold cheap
//! views into it while parsing. The backing bytes are freed when the last
//! view is dropped.

use crate::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Immutable, ref-counted byte buffer with zero-copy sub-range views.
#[derive(Clone)]
pub struct ByteStorage {
    bytes: Arc<Vec<u8>>,
    offset: usize,
    len: usize,
}

impl ByteStorage {
    /// Read an entire file into storage.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_vec(bytes))
    }

    /// Wrap an in-memory buffer.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            bytes: Arc::new(bytes),
            offset: 0,
            len,
        }
    }

    /// The viewed bytes.
    pub fn data(&self) -> &[u8] {
        &self.bytes[self.offset..self.offset + self.len]
    }

    /// Length of this view in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Create a sub-range view sharing the same backing allocation.
    pub fn view(&self, offset: usize, len: usize) -> Result<Self> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::OutOfBounds("view range overflows".to_string()))?;
        if end > self.len {
            return Err(Error::OutOfBounds(format!(
                "view {offset}..{end} exceeds storage of {} bytes",
                self.len
            )));
        }
        Ok(Self {
            bytes: Arc::clone(&self.bytes),
            offset: self.offset + offset,
            len,
        })
    }
}

impl std::fmt::Debug for ByteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStorage")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_roundtrip() {
        let storage = ByteStorage::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(storage.data(), &[1, 2, 3, 4]);
        assert_eq!(storage.len(), 4);
        assert!(!storage.is_empty());
    }

    #[test]
    fn view_shares_backing() {
        let storage = ByteStorage::from_vec(vec![0, 1, 2, 3, 4, 5]);
        let view = storage.view(2, 3).unwrap();
        assert_eq!(view.data(), &[2, 3, 4]);

        // Views of views compose offsets.
        let inner = view.view(1, 2).unwrap();
        assert_eq!(inner.data(), &[3, 4]);
    }

    #[test]
    fn view_out_of_range_is_error() {
        let storage = ByteStorage::from_vec(vec![0; 8]);
        assert!(storage.view(4, 5).is_err());
        assert!(storage.view(9, 0).is_err());
        assert!(storage.view(usize::MAX, 2).is_err());
    }

    #[test]
    fn empty_view_is_valid() {
        let storage = ByteStorage::from_vec(vec![1, 2]);
        let view = storage.view(2, 0).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn missing_file_carries_path() {
        let err = ByteStorage::from_file("/no/such/file.bin").unwrap_err();
        assert!(err.to_string().contains("/no/such/file.bin"));
    }
}
