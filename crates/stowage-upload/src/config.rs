//! Upload configuration
//!
//! Defaults match the remote store's limits: 1,900,000-byte chunks (under the
//! transport payload ceiling) and 12 chunk uploads in flight.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Default chunk size in bytes
pub const UPLOAD_CHUNK_SIZE: usize = 1_900_000;

/// Default number of concurrent chunk uploads per window
pub const MAX_CONCURRENT_UPLOADS: usize = 12;

/// Pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Chunk size in bytes
    pub chunk_size: usize,
    /// Maximum chunk uploads in flight
    pub max_concurrent_uploads: usize,
}

impl UploadConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With chunk size
    #[inline]
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// With concurrency window
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max;
        self
    }

    /// Chunk size as a non-zero value
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroChunkSize` if `chunk_size` is zero
    #[inline]
    pub fn chunk_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.chunk_size).ok_or(ConfigError::ZeroChunkSize)
    }

    /// Concurrency window as a non-zero value
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroConcurrency` if `max_concurrent_uploads` is zero
    #[inline]
    pub fn concurrency(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.max_concurrent_uploads).ok_or(ConfigError::ZeroConcurrency)
    }

    /// Validate all fields
    ///
    /// # Errors
    /// Returns the first invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunk_size()?;
        self.concurrency()?;
        Ok(())
    }

    /// Parse and validate a TOML document; missing keys take defaults
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed TOML, or a validation error
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: UPLOAD_CHUNK_SIZE,
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = UploadConfig::new();
        assert_eq!(config.chunk_size, 1_900_000);
        assert_eq!(config.max_concurrent_uploads, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_rejected() {
        let config = UploadConfig::new().with_chunk_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroChunkSize)));

        let config = UploadConfig::new().with_max_concurrent_uploads(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroConcurrency)));
    }

    #[test]
    fn toml_partial_override() {
        let config = UploadConfig::from_toml_str("max_concurrent_uploads = 4").unwrap();
        assert_eq!(config.max_concurrent_uploads, 4);
        assert_eq!(config.chunk_size, UPLOAD_CHUNK_SIZE);
    }

    #[test]
    fn toml_invalid() {
        let result = UploadConfig::from_toml_str("chunk_size = \"big\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = UploadConfig::from_toml_str("chunk_size = 0");
        assert!(matches!(result, Err(ConfigError::ZeroChunkSize)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chunk_size = 1024\nmax_concurrent_uploads = 2").unwrap();

        let config = UploadConfig::load(file.path()).unwrap();
        assert_eq!(config, UploadConfig::new().with_chunk_size(1024).with_max_concurrent_uploads(2));
    }

    #[test]
    fn load_missing_file() {
        let result = UploadConfig::load("/no/such/stowage.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
