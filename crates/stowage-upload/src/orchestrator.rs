//! Upload orchestrator
//!
//! Sequences one asset write:
//! 1. `init` the batch (optionally under a proposal)
//! 2. Split the blob and upload chunks through the bounded batcher
//! 3. Sort receipts by `order_id`
//! 4. Reconcile headers
//! 5. `commit` exactly once
//!
//! Any failure aborts the remaining steps. No abort call is issued for the
//! batch: it simply never becomes visible.

use crate::batch::{BatchUploader, WindowProgress};
use crate::chunk::ChunkPlan;
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::headers::{reconcile_headers, HeaderField};
use crate::metadata::InitAssetUpload;
use crate::transport::{
    DirectUpload, ProposalStorageActor, StagedUpload, StorageActor, UploadMode, UploadTarget,
};
use crate::types::{AssetDescriptor, BatchId, CommitBatch, ProposalId, UploadChunk};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of one upload operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Batch opened
    Initialized { batch_id: BatchId },
    /// A chunk window completed
    Uploading {
        batch_id: BatchId,
        window: usize,
        chunks_uploaded: usize,
        chunk_count: usize,
    },
    /// All chunks uploaded, commit in progress
    Committing { batch_id: BatchId },
    /// Commit acknowledged
    Done { batch_id: BatchId },
    /// Terminal failure; the batch, if any, is abandoned
    Failed,
}

/// Receives state transitions of upload operations
pub trait UploadObserver: Send + Sync {
    /// Called on every transition, in order
    fn on_transition(&self, state: &UploadState);
}

/// Result of a committed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub batch_id: BatchId,
    pub mode: UploadMode,
    pub full_path: String,
    pub chunk_count: usize,
    pub bytes: usize,
    pub headers: Vec<HeaderField>,
}

/// Drives uploads with a fixed configuration
#[derive(Clone, Default)]
pub struct AssetUploader {
    config: UploadConfig,
    observer: Option<Arc<dyn UploadObserver>>,
}

impl fmt::Debug for AssetUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetUploader")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl AssetUploader {
    /// Create uploader
    #[inline]
    #[must_use]
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    /// With state observer
    #[inline]
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload an asset, visible as soon as the commit succeeds
    ///
    /// # Errors
    /// Returns the first failure of `init`, any chunk upload, or `commit`
    pub async fn upload_asset<A>(
        &self,
        descriptor: AssetDescriptor,
        actor: &A,
    ) -> Result<UploadSummary, UploadError>
    where
        A: StorageActor + ?Sized,
    {
        self.upload_via(descriptor, &DirectUpload::new(actor)).await
    }

    /// Upload an asset staged under `proposal_id`
    ///
    /// # Errors
    /// Returns the first failure of `init`, any chunk upload, or `commit`
    pub async fn upload_asset_with_proposal<A>(
        &self,
        descriptor: AssetDescriptor,
        proposal_id: ProposalId,
        actor: &A,
    ) -> Result<UploadSummary, UploadError>
    where
        A: ProposalStorageActor + ?Sized,
    {
        self.upload_via(descriptor, &StagedUpload::new(actor, proposal_id))
            .await
    }

    /// Upload an asset through any target
    ///
    /// # Errors
    /// Returns the first failure of `init`, any chunk upload, or `commit`
    pub async fn upload_via<T>(
        &self,
        descriptor: AssetDescriptor,
        target: &T,
    ) -> Result<UploadSummary, UploadError>
    where
        T: UploadTarget + ?Sized,
    {
        let full_path = descriptor.full_path.clone();
        let result = self.run(descriptor, target).await;

        if let Err(e) = &result {
            tracing::error!(path = %full_path, mode = %target.mode(), "upload failed: {}", e);
            self.transition(&UploadState::Failed);
        }

        result
    }

    async fn run<T>(
        &self,
        descriptor: AssetDescriptor,
        target: &T,
    ) -> Result<UploadSummary, UploadError>
    where
        T: UploadTarget + ?Sized,
    {
        let chunk_size = self.config.chunk_size()?;
        let uploader = BatchUploader::new(self.config.concurrency()?);
        let mode = target.mode();

        // 1. Open the batch
        let request = InitAssetUpload::from_descriptor(&descriptor);
        let batch_id = target.init(request).await.map_err(UploadError::Init)?;
        tracing::info!(
            path = %descriptor.full_path,
            %mode,
            %batch_id,
            bytes = descriptor.data.len(),
            "upload batch initialized"
        );
        self.transition(&UploadState::Initialized { batch_id });

        // 2. Upload chunks window by window
        let plan = ChunkPlan::new(descriptor.data.len(), chunk_size);
        let chunk_count = plan.chunk_count();

        let mut receipts = uploader
            .upload_all(
                descriptor.data.chunks(chunk_size),
                |chunk| async move {
                    let order_id = chunk.order_id;
                    target
                        .upload_chunk(UploadChunk {
                            batch_id,
                            order_id,
                            content: chunk.data,
                        })
                        .await
                        .map_err(|source| UploadError::Chunk { order_id, source })
                },
                |progress: WindowProgress| {
                    self.transition(&UploadState::Uploading {
                        batch_id,
                        window: progress.window,
                        chunks_uploaded: progress.completed,
                        chunk_count,
                    });
                },
            )
            .await?;

        // 3. The store trusts list order, not arrival order
        receipts.sort_unstable_by_key(|receipt| receipt.order_id);
        if receipts.len() != chunk_count {
            return Err(UploadError::ChunkCountMismatch {
                expected: chunk_count,
                actual: receipts.len(),
            });
        }

        // 4. Headers
        let AssetDescriptor {
            full_path,
            data,
            headers,
            ..
        } = descriptor;
        let headers = reconcile_headers(headers, data.mime_type());

        // 5. Commit
        self.transition(&UploadState::Committing { batch_id });
        let commit = CommitBatch {
            batch_id,
            chunk_ids: receipts.iter().map(|receipt| receipt.chunk_id).collect(),
            headers: headers.clone(),
        };
        target.commit(commit).await.map_err(UploadError::Commit)?;

        tracing::info!(path = %full_path, %mode, %batch_id, chunk_count, "upload committed");
        self.transition(&UploadState::Done { batch_id });

        Ok(UploadSummary {
            batch_id,
            mode,
            full_path,
            chunk_count,
            bytes: data.len(),
            headers,
        })
    }

    fn transition(&self, state: &UploadState) {
        tracing::trace!(?state, "upload state transition");
        if let Some(observer) = &self.observer {
            observer.on_transition(state);
        }
    }
}

/// Upload an asset with the default configuration
///
/// # Errors
/// See [`AssetUploader::upload_asset`]
pub async fn upload_asset<A>(
    descriptor: AssetDescriptor,
    actor: &A,
) -> Result<UploadSummary, UploadError>
where
    A: StorageActor + ?Sized,
{
    AssetUploader::default()
        .upload_asset(descriptor, actor)
        .await
}

/// Upload an asset staged under `proposal_id` with the default configuration
///
/// # Errors
/// See [`AssetUploader::upload_asset_with_proposal`]
pub async fn upload_asset_with_proposal<A>(
    descriptor: AssetDescriptor,
    proposal_id: ProposalId,
    actor: &A,
) -> Result<UploadSummary, UploadError>
where
    A: ProposalStorageActor + ?Sized,
{
    AssetUploader::default()
        .upload_asset_with_proposal(descriptor, proposal_id, actor)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::error::TransportError;
    use crate::types::ChunkId;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    mock! {
        Actor {}

        #[async_trait]
        impl StorageActor for Actor {
            async fn init_asset_upload(&self, request: InitAssetUpload) -> Result<BatchId, TransportError>;
            async fn upload_asset_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError>;
            async fn commit_asset_upload(&self, commit: CommitBatch) -> Result<(), TransportError>;
        }
    }

    mock! {
        ProposalActor {}

        #[async_trait]
        impl ProposalStorageActor for ProposalActor {
            async fn init_proposal_asset_upload(
                &self,
                request: InitAssetUpload,
                proposal_id: ProposalId,
            ) -> Result<BatchId, TransportError>;
            async fn upload_proposal_asset_chunk(&self, chunk: UploadChunk) -> Result<ChunkId, TransportError>;
            async fn commit_proposal_asset_upload(
                &self,
                commit: CommitBatch,
                proposal_id: ProposalId,
            ) -> Result<(), TransportError>;
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Mutex<Vec<UploadState>>,
    }

    impl UploadObserver for RecordingObserver {
        fn on_transition(&self, state: &UploadState) {
            self.states.lock().unwrap().push(state.clone());
        }
    }

    fn small_config() -> UploadConfig {
        UploadConfig::new()
            .with_chunk_size(10)
            .with_max_concurrent_uploads(4)
    }

    fn descriptor(len: usize) -> AssetDescriptor {
        AssetDescriptor::new("files", "data.bin", Blob::new(vec![7u8; len]))
    }

    #[tokio::test]
    async fn commit_receives_ordered_chunk_ids() {
        let mut actor = MockActor::new();
        actor
            .expect_init_asset_upload()
            .times(1)
            .returning(|_| Ok(BatchId(1)));
        actor
            .expect_upload_asset_chunk()
            .times(3)
            .returning(|chunk| Ok(ChunkId(100 + chunk.order_id)));
        actor
            .expect_commit_asset_upload()
            .with(eq(CommitBatch {
                batch_id: BatchId(1),
                chunk_ids: vec![ChunkId(100), ChunkId(101), ChunkId(102)],
                headers: vec![],
            }))
            .times(1)
            .returning(|_| Ok(()));

        let summary = AssetUploader::new(small_config())
            .upload_asset(descriptor(25), &actor)
            .await
            .unwrap();

        assert_eq!(summary.chunk_count, 3);
        assert_eq!(summary.bytes, 25);
        assert_eq!(summary.mode, UploadMode::Direct);
    }

    #[tokio::test]
    async fn chunk_failure_in_second_window_skips_commit() {
        let mut actor = MockActor::new();
        actor
            .expect_init_asset_upload()
            .times(1)
            .returning(|_| Ok(BatchId(1)));
        actor.expect_upload_asset_chunk().returning(|chunk| {
            if chunk.order_id == 5 {
                Err(TransportError::unavailable("connection reset"))
            } else {
                Ok(ChunkId(chunk.order_id))
            }
        });
        actor.expect_commit_asset_upload().never();

        // 120 bytes / 10 = 12 chunks = 3 windows of 4
        let err = AssetUploader::new(small_config())
            .upload_asset(descriptor(120), &actor)
            .await
            .unwrap_err();

        match err {
            UploadError::Chunk { order_id, source } => {
                assert_eq!(order_id, 5);
                assert_eq!(source, TransportError::unavailable("connection reset"));
            }
            other => panic!("expected chunk error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn init_failure_skips_everything() {
        let mut actor = MockActor::new();
        actor
            .expect_init_asset_upload()
            .times(1)
            .returning(|_| Err(TransportError::rejected("invalid path")));
        actor.expect_upload_asset_chunk().never();
        actor.expect_commit_asset_upload().never();

        let err = upload_asset(descriptor(5), &actor).await.unwrap_err();
        assert!(matches!(err, UploadError::Init(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn commit_failure_is_attributed() {
        let mut actor = MockActor::new();
        actor
            .expect_init_asset_upload()
            .returning(|_| Ok(BatchId(2)));
        actor
            .expect_upload_asset_chunk()
            .returning(|_| Ok(ChunkId(0)));
        actor
            .expect_commit_asset_upload()
            .times(1)
            .returning(|_| Err(TransportError::rejected("batch expired")));

        let err = upload_asset(descriptor(1), &actor).await.unwrap_err();
        assert!(matches!(err, UploadError::Commit(_)));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_init() {
        let mut actor = MockActor::new();
        actor.expect_init_asset_upload().never();

        let err = AssetUploader::new(UploadConfig::new().with_max_concurrent_uploads(0))
            .upload_asset(descriptor(1), &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[tokio::test]
    async fn staged_upload_threads_proposal_id() {
        let mut actor = MockProposalActor::new();
        actor
            .expect_init_proposal_asset_upload()
            .withf(|request, proposal_id| {
                request.full_path == "/files/data.bin" && *proposal_id == ProposalId(42)
            })
            .times(1)
            .returning(|_, _| Ok(BatchId(8)));
        actor
            .expect_upload_proposal_asset_chunk()
            .times(1)
            .returning(|chunk| {
                assert_eq!(chunk.batch_id, BatchId(8));
                Ok(ChunkId(1))
            });
        actor
            .expect_commit_proposal_asset_upload()
            .withf(|commit, proposal_id| {
                commit.chunk_ids == vec![ChunkId(1)] && *proposal_id == ProposalId(42)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let descriptor = descriptor(4).with_headers(vec![]);
        let summary = upload_asset_with_proposal(descriptor, ProposalId(42), &actor)
            .await
            .unwrap();
        assert_eq!(summary.mode, UploadMode::Proposal(ProposalId(42)));
    }

    #[tokio::test]
    async fn observer_sees_full_lifecycle() {
        let mut actor = MockActor::new();
        actor
            .expect_init_asset_upload()
            .returning(|_| Ok(BatchId(5)));
        actor
            .expect_upload_asset_chunk()
            .returning(|chunk| Ok(ChunkId(chunk.order_id)));
        actor
            .expect_commit_asset_upload()
            .returning(|_| Ok(()));

        let observer = Arc::new(RecordingObserver::default());
        AssetUploader::new(small_config())
            .with_observer(observer.clone())
            .upload_asset(descriptor(50), &actor)
            .await
            .unwrap();

        let states = observer.states.lock().unwrap().clone();
        let batch_id = BatchId(5);
        assert_eq!(
            states,
            vec![
                UploadState::Initialized { batch_id },
                UploadState::Uploading { batch_id, window: 0, chunks_uploaded: 4, chunk_count: 5 },
                UploadState::Uploading { batch_id, window: 1, chunks_uploaded: 5, chunk_count: 5 },
                UploadState::Committing { batch_id },
                UploadState::Done { batch_id },
            ]
        );
    }

    #[tokio::test]
    async fn observer_sees_failure() {
        let mut actor = MockActor::new();
        actor
            .expect_init_asset_upload()
            .returning(|_| Ok(BatchId(5)));
        actor
            .expect_upload_asset_chunk()
            .returning(|_| Err(TransportError::unavailable("down")));
        actor.expect_commit_asset_upload().never();

        let observer = Arc::new(RecordingObserver::default());
        let result = AssetUploader::new(small_config())
            .with_observer(observer.clone())
            .upload_asset(descriptor(50), &actor)
            .await;

        assert!(result.is_err());
        let states = observer.states.lock().unwrap().clone();
        assert_eq!(states.last(), Some(&UploadState::Failed));
        assert!(!states.iter().any(|s| matches!(s, UploadState::Committing { .. })));
    }
}
