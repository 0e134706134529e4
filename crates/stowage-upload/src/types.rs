//! Core types for the upload pipeline
//!
//! Defines:
//! - Server-issued identifiers (batch, chunk, proposal)
//! - The caller's asset descriptor
//! - Wire-level chunk and commit payloads

use crate::blob::Blob;
use crate::headers::HeaderField;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Batch handle returned by `init`; scopes chunk uploads and the commit
    BatchId
);

numeric_id!(
    /// Identifier the remote store assigns to one uploaded chunk
    ChunkId
);

numeric_id!(
    /// Correlation id grouping staged writes for later activation
    ProposalId
);

/// Content encodings accepted by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingType {
    Identity,
    Gzip,
    Compress,
    Deflate,
    Br,
}

impl EncodingType {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Compress => "compress",
            Self::Deflate => "deflate",
            Self::Br => "br",
        }
    }
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingType {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Self::Identity),
            "gzip" => Ok(Self::Gzip),
            "compress" => Ok(Self::Compress),
            "deflate" => Ok(Self::Deflate),
            "br" => Ok(Self::Br),
            other => Err(UnknownEncoding(other.to_string())),
        }
    }
}

/// Encoding name outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown encoding type: '{0}' (expected identity, gzip, compress, deflate or br)")]
pub struct UnknownEncoding(pub String);

/// Asset to upload, as supplied by the caller
///
/// Consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// Display name of the asset
    pub filename: String,
    /// Destination namespace
    pub collection: String,
    /// Canonical destination path, starting with `/{collection}/`
    pub full_path: String,
    /// Content snapshot and declared MIME type
    pub data: Blob,
    /// Caller-supplied headers, in order
    pub headers: Vec<HeaderField>,
    /// Optional access token
    pub token: Option<String>,
    /// Optional content encoding of `data`
    pub encoding: Option<EncodingType>,
    /// Optional free-form description
    pub description: Option<String>,
}

impl AssetDescriptor {
    /// Create a descriptor stored at `/{collection}/{filename}`
    #[must_use]
    pub fn new(collection: impl Into<String>, filename: impl Into<String>, data: Blob) -> Self {
        let collection = collection.into();
        let filename = filename.into();
        Self {
            full_path: format!("/{collection}/{filename}"),
            filename,
            collection,
            data,
            headers: Vec::new(),
            token: None,
            encoding: None,
            description: None,
        }
    }

    /// With explicit destination path
    #[inline]
    #[must_use]
    pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
        self.full_path = full_path.into();
        self
    }

    /// Append one header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace all headers
    #[inline]
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<HeaderField>) -> Self {
        self.headers = headers;
        self
    }

    /// With access token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// With content encoding
    #[inline]
    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingType) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Payload of one chunk upload call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    pub batch_id: BatchId,
    pub order_id: u64,
    pub content: Bytes,
}

/// Server receipt for one chunk, keyed by its position in the blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkReceipt {
    pub order_id: u64,
    pub chunk_id: ChunkId,
}

/// Payload of the terminal commit call
///
/// `chunk_ids` must be in ascending `order_id` order: the store reassembles
/// the asset by trusting this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBatch {
    pub batch_id: BatchId,
    pub chunk_ids: Vec<ChunkId>,
    pub headers: Vec<HeaderField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_default_full_path() {
        let descriptor = AssetDescriptor::new("images", "logo.png", Blob::default());
        assert_eq!(descriptor.full_path, "/images/logo.png");
        assert_eq!(descriptor.filename, "logo.png");
        assert!(descriptor.headers.is_empty());
    }

    #[test]
    fn descriptor_builder() {
        let descriptor = AssetDescriptor::new("docs", "a.txt", Blob::default())
            .with_full_path("/docs/nested/a.txt")
            .with_header("Cache-Control", "no-cache")
            .with_token("secret")
            .with_encoding(EncodingType::Gzip)
            .with_description("readme");

        assert_eq!(descriptor.full_path, "/docs/nested/a.txt");
        assert_eq!(descriptor.headers.len(), 1);
        assert_eq!(descriptor.token.as_deref(), Some("secret"));
        assert_eq!(descriptor.encoding, Some(EncodingType::Gzip));
        assert_eq!(descriptor.description.as_deref(), Some("readme"));
    }

    #[test]
    fn encoding_parse_and_display() {
        for name in ["identity", "gzip", "compress", "deflate", "br"] {
            let encoding: EncodingType = name.parse().unwrap();
            assert_eq!(encoding.to_string(), name);
        }
        assert!("zstd".parse::<EncodingType>().is_err());
    }

    #[test]
    fn encoding_serde_lowercase() {
        let json = serde_json::to_string(&EncodingType::Br).unwrap();
        assert_eq!(json, "\"br\"");
    }

    #[test]
    fn ids_are_transparent_on_the_wire() {
        let commit = CommitBatch {
            batch_id: BatchId(3),
            chunk_ids: vec![ChunkId(10), ChunkId(11)],
            headers: vec![],
        };
        let json = serde_json::to_value(&commit).unwrap();
        assert_eq!(json["batch_id"], 3);
        assert_eq!(json["chunk_ids"][1], 11);
    }
}
