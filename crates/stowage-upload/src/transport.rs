//! Transport seam
//!
//! The remote store is reached through an actor exposing RPC triplets:
//! - [`StorageActor`]: direct writes, visible on commit
//! - [`ProposalStorageActor`]: writes staged under a [`ProposalId`]
//!
//! The orchestrator only talks to an [`UploadTarget`], with one implementation
//! per mode ([`DirectUpload`], [`StagedUpload`]).

use crate::error::TransportError;
use crate::metadata::InitAssetUpload;
use crate::types::{BatchId, ChunkId, CommitBatch, ProposalId, UploadChunk};
use async_trait::async_trait;
use std::fmt;

/// Direct-write RPC triplet
#[async_trait]
pub trait StorageActor: Send + Sync {
    /// Open a batch for one asset
    async fn init_asset_upload(&self, request: InitAssetUpload) -> Result<BatchId, TransportError>;

    /// Upload one chunk into an open batch
    async fn upload_asset_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError>;

    /// Finalize a batch into a visible asset
    async fn commit_asset_upload(&self, commit: CommitBatch) -> Result<(), TransportError>;
}

/// Staged-write RPC triplet
#[async_trait]
pub trait ProposalStorageActor: Send + Sync {
    /// Open a batch scoped to `proposal_id`
    async fn init_proposal_asset_upload(
        &self,
        request: InitAssetUpload,
        proposal_id: ProposalId,
    ) -> Result<BatchId, TransportError>;

    /// Upload one chunk into a staged batch
    async fn upload_proposal_asset_chunk(
        &self,
        chunk: UploadChunk,
    ) -> Result<ChunkId, TransportError>;

    /// Finalize a staged batch under `proposal_id`
    async fn commit_proposal_asset_upload(
        &self,
        commit: CommitBatch,
        proposal_id: ProposalId,
    ) -> Result<(), TransportError>;
}

/// Which triplet a target drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadMode {
    /// Visible immediately on commit
    Direct,
    /// Staged under a proposal
    Proposal(ProposalId),
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Proposal(id) => write!(f, "proposal {id}"),
        }
    }
}

/// Capability set the orchestrator needs: `init`, `upload_chunk`, `commit`
#[async_trait]
pub trait UploadTarget: Send + Sync {
    /// Mode, for logging and summaries
    fn mode(&self) -> UploadMode;

    /// Open a batch
    async fn init(&self, request: InitAssetUpload) -> Result<BatchId, TransportError>;

    /// Upload one chunk
    async fn upload_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError>;

    /// Commit the batch
    async fn commit(&self, commit: CommitBatch) -> Result<(), TransportError>;
}

/// Target writing straight through a [`StorageActor`]
#[derive(Debug)]
pub struct DirectUpload<'a, A: ?Sized> {
    actor: &'a A,
}

impl<'a, A: ?Sized> DirectUpload<'a, A> {
    /// Wrap an actor
    #[inline]
    #[must_use]
    pub fn new(actor: &'a A) -> Self {
        Self { actor }
    }
}

#[async_trait]
impl<A> UploadTarget for DirectUpload<'_, A>
where
    A: StorageActor + ?Sized,
{
    fn mode(&self) -> UploadMode {
        UploadMode::Direct
    }

    async fn init(&self, request: InitAssetUpload) -> Result<BatchId, TransportError> {
        self.actor.init_asset_upload(request).await
    }

    async fn upload_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError> {
        self.actor.upload_asset_chunk(chunk).await
    }

    async fn commit(&self, commit: CommitBatch) -> Result<(), TransportError> {
        self.actor.commit_asset_upload(commit).await
    }
}

/// Target staging writes under a proposal through a [`ProposalStorageActor`]
#[derive(Debug)]
pub struct StagedUpload<'a, A: ?Sized> {
    actor: &'a A,
    proposal_id: ProposalId,
}

impl<'a, A: ?Sized> StagedUpload<'a, A> {
    /// Wrap an actor, threading `proposal_id` through `init` and `commit`
    #[inline]
    #[must_use]
    pub fn new(actor: &'a A, proposal_id: ProposalId) -> Self {
        Self { actor, proposal_id }
    }
}

#[async_trait]
impl<A> UploadTarget for StagedUpload<'_, A>
where
    A: ProposalStorageActor + ?Sized,
{
    fn mode(&self) -> UploadMode {
        UploadMode::Proposal(self.proposal_id)
    }

    async fn init(&self, request: InitAssetUpload) -> Result<BatchId, TransportError> {
        self.actor
            .init_proposal_asset_upload(request, self.proposal_id)
            .await
    }

    async fn upload_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError> {
        self.actor.upload_proposal_asset_chunk(chunk).await
    }

    async fn commit(&self, commit: CommitBatch) -> Result<(), TransportError> {
        self.actor
            .commit_proposal_asset_upload(commit, self.proposal_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_mode_display() {
        assert_eq!(UploadMode::Direct.to_string(), "direct");
        assert_eq!(UploadMode::Proposal(ProposalId(9)).to_string(), "proposal 9");
    }
}
