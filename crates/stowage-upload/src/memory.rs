//! In-memory content store
//!
//! Implements both actor traits against process-local maps. Behaves like the
//! remote store at the protocol level:
//! - rejects paths outside `/{collection}/`
//! - rejects chunks for unknown batches and commits of foreign chunks
//! - reassembles content in `chunk_ids` order
//! - keeps staged commits hidden until [`InMemoryStore::activate_proposal`]
//!
//! Abandoned batches stay pending forever and never become visible.

use crate::error::{StoreError, TransportError};
use crate::hash::ContentHash;
use crate::headers::HeaderField;
use crate::metadata::InitAssetUpload;
use crate::transport::{ProposalStorageActor, StorageActor};
use crate::types::{BatchId, ChunkId, CommitBatch, EncodingType, ProposalId, UploadChunk};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A committed asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub collection: String,
    pub full_path: String,
    pub name: String,
    pub headers: Vec<HeaderField>,
    pub encoding_type: Option<EncodingType>,
    pub description: Option<String>,
    pub token: Option<String>,
    #[serde(skip)]
    pub content: Bytes,
    pub size: usize,
    pub hash: ContentHash,
}

#[derive(Debug)]
struct PendingBatch {
    request: InitAssetUpload,
    proposal_id: Option<ProposalId>,
}

#[derive(Debug)]
struct StoredChunk {
    batch_id: BatchId,
    content: Bytes,
}

/// Process-local store implementing [`StorageActor`] and [`ProposalStorageActor`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    next_batch_id: AtomicU64,
    next_chunk_id: AtomicU64,
    batches: DashMap<BatchId, PendingBatch>,
    chunks: DashMap<ChunkId, StoredChunk>,
    assets: DashMap<String, StoredAsset>,
    proposals: DashMap<ProposalId, Vec<StoredAsset>>,
}

impl InMemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible asset at `full_path`
    #[must_use]
    pub fn asset(&self, full_path: &str) -> Option<StoredAsset> {
        self.assets.get(full_path).map(|entry| entry.value().clone())
    }

    /// Number of visible assets
    #[inline]
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Assets committed under `proposal_id` and not yet activated
    #[must_use]
    pub fn staged_assets(&self, proposal_id: ProposalId) -> Vec<StoredAsset> {
        self.proposals
            .get(&proposal_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Batches opened but never committed
    #[inline]
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }

    /// Publish every asset staged under `proposal_id` at once
    ///
    /// # Errors
    /// Returns `StoreError::UnknownProposal` if nothing was staged
    pub fn activate_proposal(&self, proposal_id: ProposalId) -> Result<usize, StoreError> {
        let (_, staged) = self
            .proposals
            .remove(&proposal_id)
            .ok_or(StoreError::UnknownProposal(proposal_id))?;

        let count = staged.len();
        for asset in staged {
            self.assets.insert(asset.full_path.clone(), asset);
        }
        tracing::info!(%proposal_id, assets = count, "proposal activated");
        Ok(count)
    }

    fn open_batch(
        &self,
        request: InitAssetUpload,
        proposal_id: Option<ProposalId>,
    ) -> Result<BatchId, TransportError> {
        validate_destination(&request)?;

        let batch_id = BatchId(self.next_batch_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.batches.insert(
            batch_id,
            PendingBatch {
                request,
                proposal_id,
            },
        );
        Ok(batch_id)
    }

    fn store_chunk(&self, chunk: UploadChunk, staged: bool) -> Result<ChunkId, TransportError> {
        {
            let batch = self
                .batches
                .get(&chunk.batch_id)
                .ok_or_else(|| TransportError::rejected(format!("unknown batch {}", chunk.batch_id)))?;
            if batch.proposal_id.is_some() != staged {
                return Err(TransportError::rejected(format!(
                    "batch {} does not belong to this upload mode",
                    chunk.batch_id
                )));
            }
        }

        let chunk_id = ChunkId(self.next_chunk_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.chunks.insert(
            chunk_id,
            StoredChunk {
                batch_id: chunk.batch_id,
                content: chunk.content,
            },
        );
        Ok(chunk_id)
    }

    fn commit_batch(
        &self,
        commit: CommitBatch,
        proposal_id: Option<ProposalId>,
    ) -> Result<StoredAsset, TransportError> {
        if commit.chunk_ids.is_empty() {
            return Err(TransportError::rejected("commit without chunks"));
        }

        {
            let batch = self
                .batches
                .get(&commit.batch_id)
                .ok_or_else(|| TransportError::rejected(format!("unknown batch {}", commit.batch_id)))?;
            if batch.proposal_id != proposal_id {
                return Err(TransportError::rejected(format!(
                    "batch {} was not opened for this proposal",
                    commit.batch_id
                )));
            }
        }

        let mut content = BytesMut::new();
        for chunk_id in &commit.chunk_ids {
            let chunk = self
                .chunks
                .get(chunk_id)
                .ok_or_else(|| TransportError::rejected(format!("unknown chunk {chunk_id}")))?;
            if chunk.batch_id != commit.batch_id {
                return Err(TransportError::rejected(format!(
                    "chunk {chunk_id} belongs to batch {}",
                    chunk.batch_id
                )));
            }
            content.extend_from_slice(&chunk.content);
        }

        let (_, batch) = self
            .batches
            .remove(&commit.batch_id)
            .ok_or_else(|| TransportError::rejected(format!("batch {} already committed", commit.batch_id)))?;
        self.chunks.retain(|_, chunk| chunk.batch_id != commit.batch_id);

        let content = content.freeze();
        let request = batch.request;
        Ok(StoredAsset {
            collection: request.collection,
            full_path: request.full_path,
            name: request.name,
            headers: commit.headers,
            encoding_type: request.encoding_type,
            description: request.description,
            token: request.token,
            size: content.len(),
            hash: ContentHash::compute(&content),
            content,
        })
    }
}

fn validate_destination(request: &InitAssetUpload) -> Result<(), TransportError> {
    if request.collection.is_empty() {
        return Err(TransportError::rejected("collection must not be empty"));
    }

    let prefix = format!("/{}/", request.collection);
    match request.full_path.strip_prefix(&prefix) {
        Some(rest) if !rest.is_empty() => Ok(()),
        _ => Err(TransportError::rejected(format!(
            "path '{}' is not inside collection '{}'",
            request.full_path, request.collection
        ))),
    }
}

#[async_trait]
impl StorageActor for InMemoryStore {
    async fn init_asset_upload(&self, request: InitAssetUpload) -> Result<BatchId, TransportError> {
        self.open_batch(request, None)
    }

    async fn upload_asset_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError> {
        self.store_chunk(chunk, false)
    }

    async fn commit_asset_upload(&self, commit: CommitBatch) -> Result<(), TransportError> {
        let asset = self.commit_batch(commit, None)?;
        tracing::debug!(path = %asset.full_path, hash = %asset.hash.short(), "asset committed");
        self.assets.insert(asset.full_path.clone(), asset);
        Ok(())
    }
}

#[async_trait]
impl ProposalStorageActor for InMemoryStore {
    async fn init_proposal_asset_upload(
        &self,
        request: InitAssetUpload,
        proposal_id: ProposalId,
    ) -> Result<BatchId, TransportError> {
        self.open_batch(request, Some(proposal_id))
    }

    async fn upload_proposal_asset_chunk(
        &self,
        chunk: UploadChunk,
    ) -> Result<ChunkId, TransportError> {
        self.store_chunk(chunk, true)
    }

    async fn commit_proposal_asset_upload(
        &self,
        commit: CommitBatch,
        proposal_id: ProposalId,
    ) -> Result<(), TransportError> {
        let asset = self.commit_batch(commit, Some(proposal_id))?;
        tracing::debug!(path = %asset.full_path, %proposal_id, "asset staged");
        self.proposals.entry(proposal_id).or_default().push(asset);
        Ok(())
    }
}
