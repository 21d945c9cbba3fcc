//! Named FIFO buffers drained in fixed-size batches.

use crate::errors::StoreError;
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// Default number of records per flushed batch.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// A single named buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    items: VecDeque<Value>,
    batch_size: usize,
    batches_flushed: u64,
}

impl Buffer {
    fn new(batch_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            batch_size,
            batches_flushed: 0,
        }
    }

    /// Number of records waiting to be flushed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The batch size fixed when the buffer was created.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Total batches flushed over the buffer's lifetime.
    #[must_use]
    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed
    }

    fn drain_batch(&mut self, size: usize) -> Vec<Value> {
        let take = size.min(self.items.len());
        self.batches_flushed += 1;
        self.items.drain(..take).collect()
    }
}

/// Result of appending to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Records added by this call.
    pub buffered: usize,
    /// Records now waiting in the buffer.
    pub total: usize,
    /// The buffer's batch size.
    pub batch_size: usize,
}

/// Result of flushing a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    /// The drained batches, in order.
    pub batches: Vec<Vec<Value>>,
    /// Records drained by this call.
    pub flushed_count: usize,
    /// Records left in the buffer.
    pub remaining: usize,
    /// Lifetime batch counter after this call.
    pub batches_flushed: u64,
}

/// All buffers of a run.
#[derive(Debug, Clone, Default)]
pub struct BufferStore {
    buffers: HashMap<String, Buffer>,
}

impl BufferStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data` to the named buffer, creating it with `batch_size` on
    /// first use. Arrays are appended element-wise; any other value is
    /// appended as a single record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBatchSize`] when creating a buffer with a
    /// batch size of zero.
    pub fn append(
        &mut self,
        name: &str,
        data: Value,
        batch_size: usize,
    ) -> Result<AppendOutcome, StoreError> {
        let buffer = match self.buffers.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(_) if batch_size == 0 => {
                return Err(StoreError::InvalidBatchSize {
                    buffer: name.to_string(),
                });
            }
            Entry::Vacant(entry) => entry.insert(Buffer::new(batch_size)),
        };

        let buffered = match data {
            Value::Array(items) => {
                let count = items.len();
                buffer.items.extend(items);
                count
            }
            other => {
                buffer.items.push_back(other);
                1
            }
        };

        Ok(AppendOutcome {
            buffered,
            total: buffer.items.len(),
            batch_size: buffer.batch_size,
        })
    }

    /// Drains batches from the named buffer.
    ///
    /// `batch_size` overrides the stored size for this call. With `all` the
    /// buffer is drained completely and the final batch may be short;
    /// otherwise only full batches are taken. Returns `Ok(None)` for an
    /// unknown buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBatchSize`] for an override of zero.
    pub fn flush(
        &mut self,
        name: &str,
        batch_size: Option<usize>,
        all: bool,
    ) -> Result<Option<FlushOutcome>, StoreError> {
        let Some(buffer) = self.buffers.get_mut(name) else {
            return Ok(None);
        };

        let size = batch_size.unwrap_or(buffer.batch_size);
        if size == 0 {
            return Err(StoreError::InvalidBatchSize {
                buffer: name.to_string(),
            });
        }

        let mut batches = Vec::new();
        while buffer.items.len() >= size || (all && !buffer.items.is_empty()) {
            batches.push(buffer.drain_batch(size));
        }

        let flushed_count = batches.iter().map(Vec::len).sum();
        Ok(Some(FlushOutcome {
            batches,
            flushed_count,
            remaining: buffer.items.len(),
            batches_flushed: buffer.batches_flushed,
        }))
    }

    /// Returns the named buffer.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Buffer> {
        self.buffers.get(name)
    }

    /// Removes every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Number of buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true when no buffers exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total records waiting across all buffers.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.buffers.values().map(Buffer::len).sum()
    }

    /// Returns spare capacity to the allocator.
    pub fn shrink_to_fit(&mut self) {
        for buffer in self.buffers.values_mut() {
            buffer.items.shrink_to_fit();
        }
        self.buffers.shrink_to_fit();
    }
}
