//! Testing utilities for Stowage workspace
//!
//! Shared fixtures, plus [`RecordingActor`]: an [`InMemoryStore`] wrapper that
//! logs every call, tracks concurrent chunk uploads, and can inject latency
//! or failures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stowage_upload::{
    AssetDescriptor, BatchId, Blob, ChunkId, CommitBatch, InMemoryStore, InitAssetUpload,
    ProposalId, ProposalStorageActor, StorageActor, TransportError, UploadChunk, UploadConfig,
};

/// Deterministic, non-repeating-per-chunk content of `len` bytes
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn blob_of_len(len: usize) -> Blob {
    Blob::new(patterned_bytes(len))
}

pub fn descriptor_of_len(len: usize) -> AssetDescriptor {
    AssetDescriptor::new("assets", "payload.bin", blob_of_len(len))
}

pub fn small_config(chunk_size: usize, max_concurrent_uploads: usize) -> UploadConfig {
    UploadConfig::new()
        .with_chunk_size(chunk_size)
        .with_max_concurrent_uploads(max_concurrent_uploads)
}

/// One observed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Init {
        request: InitAssetUpload,
        proposal_id: Option<ProposalId>,
    },
    ChunkStarted {
        order_id: u64,
        len: usize,
    },
    ChunkFinished {
        order_id: u64,
    },
    Commit {
        commit: CommitBatch,
        proposal_id: Option<ProposalId>,
    },
}

type LatencyFn = dyn Fn(u64) -> Duration + Send + Sync;

/// Instrumented actor backed by an [`InMemoryStore`]
#[derive(Default)]
pub struct RecordingActor {
    store: InMemoryStore,
    events: Mutex<Vec<CallEvent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Arc<LatencyFn>>,
    failing_chunk: Option<u64>,
    init_failure: Option<TransportError>,
}

impl RecordingActor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay each chunk upload by `latency(order_id)`
    #[must_use]
    pub fn with_latency(mut self, latency: impl Fn(u64) -> Duration + Send + Sync + 'static) -> Self {
        self.latency = Some(Arc::new(latency));
        self
    }

    /// Fail the upload of the chunk at `order_id`
    #[must_use]
    pub fn with_chunk_failure(mut self, order_id: u64) -> Self {
        self.failing_chunk = Some(order_id);
        self
    }

    /// Fail every `init` with `error`
    #[must_use]
    pub fn with_init_failure(mut self, error: TransportError) -> Self {
        self.init_failure = Some(error);
        self
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }

    pub fn init_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, CallEvent::Init { .. }))
            .count()
    }

    pub fn commits(&self) -> Vec<CommitBatch> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CallEvent::Commit { commit, .. } => Some(commit.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(order_id, len)` of every chunk upload, in call order
    pub fn chunk_starts(&self) -> Vec<(u64, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CallEvent::ChunkStarted { order_id, len } => Some((*order_id, *len)),
                _ => None,
            })
            .collect()
    }

    /// Order ids of finished chunk uploads, in completion order
    pub fn completion_order(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CallEvent::ChunkFinished { order_id } => Some(*order_id),
                _ => None,
            })
            .collect()
    }

    /// Highest number of chunk uploads observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, event: CallEvent) {
        self.events.lock().push(event);
    }

    fn init(
        &self,
        request: &InitAssetUpload,
        proposal_id: Option<ProposalId>,
    ) -> Result<(), TransportError> {
        self.record(CallEvent::Init {
            request: request.clone(),
            proposal_id,
        });
        match &self.init_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn chunk(&self, chunk: UploadChunk, staged: bool) -> Result<ChunkId, TransportError> {
        let order_id = chunk.order_id;
        self.record(CallEvent::ChunkStarted {
            order_id,
            len: chunk.content.len(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        match &self.latency {
            Some(latency) => tokio::time::sleep(latency(order_id)).await,
            None => tokio::task::yield_now().await,
        }

        let result = if self.failing_chunk == Some(order_id) {
            Err(TransportError::unavailable(format!("injected failure for chunk {order_id}")))
        } else if staged {
            self.store.upload_proposal_asset_chunk(chunk).await
        } else {
            self.store.upload_asset_chunk(chunk).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(CallEvent::ChunkFinished { order_id });
        result
    }
}

#[async_trait]
impl StorageActor for RecordingActor {
    async fn init_asset_upload(&self, request: InitAssetUpload) -> Result<BatchId, TransportError> {
        self.init(&request, None)?;
        self.store.init_asset_upload(request).await
    }

    async fn upload_asset_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError> {
        self.chunk(chunk, false).await
    }

    async fn commit_asset_upload(&self, commit: CommitBatch) -> Result<(), TransportError> {
        self.record(CallEvent::Commit {
            commit: commit.clone(),
            proposal_id: None,
        });
        self.store.commit_asset_upload(commit).await
    }
}

#[async_trait]
impl ProposalStorageActor for RecordingActor {
    async fn init_proposal_asset_upload(
        &self,
        request: InitAssetUpload,
        proposal_id: ProposalId,
    ) -> Result<BatchId, TransportError> {
        self.init(&request, Some(proposal_id))?;
        self.store
            .init_proposal_asset_upload(request, proposal_id)
            .await
    }

    async fn upload_proposal_asset_chunk(
        &self,
        chunk: UploadChunk,
    ) -> Result<ChunkId, TransportError> {
        self.chunk(chunk, true).await
    }

    async fn commit_proposal_asset_upload(
        &self,
        commit: CommitBatch,
        proposal_id: ProposalId,
    ) -> Result<(), TransportError> {
        self.record(CallEvent::Commit {
            commit: commit.clone(),
            proposal_id: Some(proposal_id),
        });
        self.store
            .commit_proposal_asset_upload(commit, proposal_id)
            .await
    }
}
