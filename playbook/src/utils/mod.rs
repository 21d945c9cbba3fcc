//! Utility functions for timestamp handling.
//!
//! These back the dynamic template tokens (`now`, `today`, `timestamp_ms`)
//! and the timestamps written into progress snapshots.

pub mod timestamps;

pub use timestamps::{epoch_millis, format_iso, iso_timestamp, today};
