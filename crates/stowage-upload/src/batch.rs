//! Bounded batch uploader
//!
//! Uploads chunks in fixed-size windows:
//! - the next `limit` chunks are issued concurrently
//! - the whole window is awaited before the next one starts
//! - the first failure aborts everything that remains
//!
//! Concurrency is structured: window futures are polled on the caller's task,
//! nothing is spawned or left running after the call returns.

use crate::chunk::Chunk;
use crate::types::{ChunkId, ChunkReceipt};
use futures::future::try_join_all;
use std::future::Future;
use std::num::NonZeroUsize;

/// Progress report emitted after each completed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowProgress {
    /// Zero-based window index
    pub window: usize,
    /// Chunks uploaded in this window
    pub window_len: usize,
    /// Chunks uploaded so far, all windows included
    pub completed: usize,
}

/// Windowed uploader with a fixed in-flight ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchUploader {
    limit: NonZeroUsize,
}

impl BatchUploader {
    /// Create an uploader allowing at most `limit` concurrent uploads
    #[inline]
    #[must_use]
    pub const fn new(limit: NonZeroUsize) -> Self {
        Self { limit }
    }

    /// Maximum number of uploads in flight
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit.get()
    }

    /// Upload every chunk, returning receipts in completion-window order
    ///
    /// Receipts within a window follow input order, but callers must not rely
    /// on that: sort by `order_id` before committing.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to upload, consumed lazily one window at a time
    /// * `upload` - Per-chunk upload call
    /// * `on_window` - Invoked after each window completes successfully
    ///
    /// # Errors
    /// Returns the first error produced by `upload`. Chunks in later windows
    /// are never started.
    pub async fn upload_all<I, F, Fut, E, P>(
        &self,
        chunks: I,
        mut upload: F,
        mut on_window: P,
    ) -> Result<Vec<ChunkReceipt>, E>
    where
        I: IntoIterator<Item = Chunk>,
        F: FnMut(Chunk) -> Fut,
        Fut: Future<Output = Result<ChunkId, E>>,
        P: FnMut(WindowProgress),
    {
        let mut chunks = chunks.into_iter();
        let mut receipts = Vec::new();
        let mut window = 0;

        loop {
            let pending: Vec<_> = chunks
                .by_ref()
                .take(self.limit.get())
                .map(|chunk| {
                    let order_id = chunk.order_id;
                    let call = upload(chunk);
                    async move {
                        let chunk_id = call.await?;
                        Ok::<_, E>(ChunkReceipt { order_id, chunk_id })
                    }
                })
                .collect();

            if pending.is_empty() {
                break;
            }

            let window_len = pending.len();
            tracing::debug!(window, window_len, "uploading chunk window");

            receipts.extend(try_join_all(pending).await?);

            on_window(WindowProgress {
                window,
                window_len,
                completed: receipts.len(),
            });
            window += 1;
        }

        Ok(receipts)
    }
}
