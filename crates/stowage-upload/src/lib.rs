//! Stowage Upload
//!
//! Chunked asset uploads to a remote content store.
//!
//! # Core Concepts
//!
//! - [`AssetDescriptor`]: what to upload and where
//! - [`ChunkPlan`] / [`Chunks`]: ordered, fixed-size partitioning of a [`Blob`]
//! - [`BatchUploader`]: sequential windows of bounded concurrent chunk uploads
//! - [`AssetUploader`]: `init` → chunks → `commit`, in direct or proposal mode
//! - [`StorageActor`] / [`ProposalStorageActor`]: the remote store's RPC triplets
//!
//! # Example
//!
//! ```rust,ignore
//! use stowage_upload::{upload_asset, AssetDescriptor, Blob, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! let blob = Blob::from_path("logo.png").await?.with_mime_type("image/png");
//! let descriptor = AssetDescriptor::new("images", "logo.png", blob);
//!
//! let summary = upload_asset(descriptor, &store).await?;
//! println!("committed {} chunks", summary.chunk_count);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod batch;
pub mod blob;
pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod headers;
pub mod memory;
pub mod metadata;
pub mod orchestrator;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use batch::{BatchUploader, WindowProgress};
pub use blob::Blob;
pub use chunk::{Chunk, ChunkPlan, ChunkRanges, Chunks};
pub use config::{UploadConfig, MAX_CONCURRENT_UPLOADS, UPLOAD_CHUNK_SIZE};
pub use error::{BlobError, ConfigError, StoreError, TransportError, UploadError};
pub use hash::{ContentHash, HashError};
pub use headers::{has_content_type, reconcile_headers, HeaderField, CONTENT_TYPE};
pub use memory::{InMemoryStore, StoredAsset};
pub use metadata::InitAssetUpload;
pub use orchestrator::{
    upload_asset, upload_asset_with_proposal, AssetUploader, UploadObserver, UploadState,
    UploadSummary,
};
pub use transport::{
    DirectUpload, ProposalStorageActor, StagedUpload, StorageActor, UploadMode, UploadTarget,
};
pub use types::{
    AssetDescriptor, BatchId, ChunkId, ChunkReceipt, CommitBatch, EncodingType, ProposalId,
    UnknownEncoding, UploadChunk,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for uploading assets
    pub use crate::{
        upload_asset, upload_asset_with_proposal, AssetDescriptor, AssetUploader, Blob,
        EncodingType, ProposalId, ProposalStorageActor, StorageActor, UploadConfig, UploadError,
        UploadSummary,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn upload_roundtrip_through_memory_store() {
        let store = InMemoryStore::new();
        let blob = Blob::new(b"hello stowage".to_vec()).with_mime_type("text/plain");
        let descriptor = AssetDescriptor::new("docs", "hello.txt", blob);

        let summary = AssetUploader::new(UploadConfig::new().with_chunk_size(4))
            .upload_asset(descriptor, &store)
            .await
            .unwrap();

        assert_eq!(summary.chunk_count, 4);
        let asset = store.asset("/docs/hello.txt").unwrap();
        assert_eq!(asset.content.as_ref(), b"hello stowage");
        assert!(has_content_type(&asset.headers));
    }
}
