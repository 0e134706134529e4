//! Immutable blob snapshots
//!
//! A [`Blob`] owns its bytes as a reference-counted [`Bytes`] buffer, so chunk
//! slices are zero-copy and safe to hand to concurrent uploads. Streaming
//! sources are read to the end once, before any slicing happens.

use crate::chunk::Chunks;
use crate::error::BlobError;
use bytes::Bytes;
use std::num::NonZeroUsize;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Asset content plus its declared MIME type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    mime_type: Option<String>,
}

impl Blob {
    /// Wrap in-memory content; no copy for `Bytes` input
    #[inline]
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: None,
        }
    }

    /// With declared MIME type
    #[inline]
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Drain a reader into a snapshot
    ///
    /// # Errors
    /// Returns `BlobError::Read` if the reader fails before EOF
    pub async fn from_reader<R>(mut reader: R) -> Result<Self, BlobError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(Self::new(buf))
    }

    /// Read a whole file into a snapshot
    ///
    /// # Errors
    /// Returns `BlobError::Io` if the file cannot be read
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, BlobError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| BlobError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "blob snapshot taken");
        Ok(Self::new(data))
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Declared MIME type, if any
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Content length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Split into ordered chunks of `chunk_size` bytes
    #[inline]
    #[must_use]
    pub fn chunks(&self, chunk_size: NonZeroUsize) -> Chunks {
        Chunks::new(self.bytes.clone(), chunk_size)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Blob {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

impl From<Bytes> for Blob {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_new_and_mime() {
        let blob = Blob::new(vec![1, 2, 3]).with_mime_type("image/png");
        assert_eq!(blob.len(), 3);
        assert_eq!(blob.mime_type(), Some("image/png"));
        assert!(!blob.is_empty());
    }

    #[test]
    fn blob_default_is_empty() {
        let blob = Blob::default();
        assert!(blob.is_empty());
        assert!(blob.mime_type().is_none());
    }

    #[tokio::test]
    async fn blob_from_reader() {
        let source: &[u8] = b"streamed content";
        let blob = Blob::from_reader(source).await.unwrap();
        assert_eq!(blob.bytes().as_ref(), b"streamed content");
    }

    #[tokio::test]
    async fn blob_from_missing_path() {
        let result = Blob::from_path("/definitely/not/here.bin").await;
        assert!(matches!(result, Err(BlobError::Io { .. })));
    }
}
