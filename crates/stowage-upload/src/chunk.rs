//! Chunk splitting
//!
//! Partitions a blob into ordered, fixed-size chunks. Every chunk but the last
//! is exactly `chunk_size` bytes; an empty blob still yields one empty chunk so
//! that empty assets go through a full init/upload/commit cycle.

use bytes::Bytes;
use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use std::ops::Range;

/// Layout of a blob of `len` bytes split into `chunk_size` pieces
///
/// Cheap to copy; [`ChunkPlan::ranges`] can be called any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    len: usize,
    chunk_size: NonZeroUsize,
}

impl ChunkPlan {
    /// Create a plan
    #[inline]
    #[must_use]
    pub const fn new(len: usize, chunk_size: NonZeroUsize) -> Self {
        Self { len, chunk_size }
    }

    /// Total content length
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the planned blob is empty
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunk size in bytes
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    /// Number of chunks; `1` for an empty blob
    #[inline]
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        if self.len == 0 {
            1
        } else {
            self.len.div_ceil(self.chunk_size.get())
        }
    }

    /// Byte range of the chunk at `order_id`
    #[must_use]
    pub fn range(&self, order_id: usize) -> Option<Range<usize>> {
        if order_id >= self.chunk_count() {
            return None;
        }
        let start = order_id * self.chunk_size.get();
        let end = (start + self.chunk_size.get()).min(self.len);
        Some(start..end)
    }

    /// Iterate `(order_id, byte range)` pairs in ascending order
    #[inline]
    #[must_use]
    pub fn ranges(&self) -> ChunkRanges {
        ChunkRanges {
            plan: *self,
            next: 0,
        }
    }
}

/// Iterator over the byte ranges of a [`ChunkPlan`]
#[derive(Debug, Clone)]
pub struct ChunkRanges {
    plan: ChunkPlan,
    next: usize,
}

impl Iterator for ChunkRanges {
    type Item = (u64, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let range = self.plan.range(self.next)?;
        let order_id = self.next as u64;
        self.next += 1;
        Some((order_id, range))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.chunk_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkRanges {}

impl FusedIterator for ChunkRanges {}

/// One contiguous slice of a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the original blob
    pub order_id: u64,
    /// Slice of the blob snapshot (shares the allocation)
    pub data: Bytes,
}

impl Chunk {
    /// Length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lazy iterator of [`Chunk`]s over a blob snapshot
#[derive(Debug, Clone)]
pub struct Chunks {
    data: Bytes,
    ranges: ChunkRanges,
}

impl Chunks {
    /// Split `data` into chunks of `chunk_size`
    #[inline]
    #[must_use]
    pub fn new(data: Bytes, chunk_size: NonZeroUsize) -> Self {
        let ranges = ChunkPlan::new(data.len(), chunk_size).ranges();
        Self { data, ranges }
    }

    /// Plan backing this iterator
    #[inline]
    #[must_use]
    pub fn plan(&self) -> ChunkPlan {
        self.ranges.plan
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        let (order_id, range) = self.ranges.next()?;
        Some(Chunk {
            order_id,
            data: self.data.slice(range),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ranges.size_hint()
    }
}

impl ExactSizeIterator for Chunks {}

impl FusedIterator for Chunks {}
