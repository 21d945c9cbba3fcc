//! Run-scoped record storage: collections, buffers and deduplication.

mod buffers;
mod collections;
mod dedup;

pub use buffers::{AppendOutcome, Buffer, BufferStore, FlushOutcome, DEFAULT_BATCH_SIZE};
pub use collections::CollectionStore;
pub use dedup::{dedup, Deduplicator};
