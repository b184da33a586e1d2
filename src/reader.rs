//! Snapshot-and-replay adapter for response bodies.
//!
//! An analyzer runs a response through several parsers, each of which may
//! want to read the body from the beginning. [`MultipleReader`] snapshots
//! the body once and hands out as many independent readers over it as
//! needed.

use bytes::Bytes;
use std::io::Cursor;

/// Holds one body snapshot and produces repeatable readers over it.
#[derive(Debug, Clone)]
pub struct MultipleReader {
    data: Bytes,
}

impl MultipleReader {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Returns a fresh reader positioned at the start of the snapshot.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    /// Returns an owned copy of the snapshot. Cheap: `Bytes` clones share
    /// the underlying allocation.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
