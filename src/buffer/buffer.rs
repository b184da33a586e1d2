//! A single bounded FIFO with non-blocking operations and idempotent
//! close.
//!
//! # Invariants
//! - `len() <= cap()` always.
//! - Once closed, a buffer stays closed.
//! - No put succeeds after a close has begun: `put` holds the shared side
//!   of a lock whose exclusive side is taken by `close`, with a fast-path
//!   closed check in front.
//! - A closed buffer still drains: `get` keeps returning queued data until
//!   the buffer is empty, then reports closure.

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Returned by [`Buffer::get`] once a closed buffer has drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("the buffer is closed")]
    Closed,
}

/// Returned by [`Buffer::put`]; both arms hand the rejected datum back to
/// the caller.
#[derive(Debug)]
pub enum PutError<T> {
    Full(T),
    Closed(T),
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Full(_) => f.write_str("the buffer is full"),
            PutError::Closed(_) => f.write_str("the buffer is closed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for PutError<T> {}

/// A bounded non-blocking FIFO, capacity fixed at construction.
#[derive(Debug)]
pub struct Buffer<T> {
    inner: ArrayQueue<T>,
    closed: AtomicBool,
    // put = shared, close = exclusive.
    lock: RwLock<()>,
}

impl<T> Buffer<T> {
    /// # Panics
    /// Panics if `cap` is zero.
    pub fn new(cap: u32) -> Self {
        assert!(cap > 0, "buffer capacity must be positive");
        Self {
            inner: ArrayQueue::new(cap as usize),
            closed: AtomicBool::new(false),
            lock: RwLock::new(()),
        }
    }

    /// Stores a datum. Non-blocking: a full buffer rejects with
    /// [`PutError::Full`], a closed one with [`PutError::Closed`].
    pub fn put(&self, datum: T) -> Result<(), PutError<T>> {
        if self.closed() {
            return Err(PutError::Closed(datum));
        }
        let _shared = self.lock.read();
        if self.closed() {
            return Err(PutError::Closed(datum));
        }
        self.inner.push(datum).map_err(PutError::Full)
    }

    /// Dequeues a datum. Non-blocking: `Ok(None)` on an empty open
    /// buffer; a closed buffer drains first, then reports
    /// [`BufferError::Closed`].
    pub fn get(&self) -> Result<Option<T>, BufferError> {
        match self.inner.pop() {
            Some(datum) => Ok(Some(datum)),
            None if self.closed() => Err(BufferError::Closed),
            None => Ok(None),
        }
    }

    /// Closes the buffer. Idempotent; only the first call returns `true`.
    pub fn close(&self) -> bool {
        let _exclusive = self.lock.write();
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn cap(&self) -> u32 {
        self.inner.capacity() as u32
    }

    pub fn len(&self) -> u32 {
        self.inner.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let buffer = Buffer::new(4);
        for n in 0..4 {
            buffer.put(n).unwrap();
        }
        for n in 0..4 {
            assert_eq!(buffer.get().unwrap(), Some(n));
        }
        assert_eq!(buffer.get().unwrap(), None);
    }

    #[test]
    fn full_buffer_hands_the_datum_back() {
        let buffer = Buffer::new(1);
        buffer.put(1).unwrap();
        match buffer.put(2) {
            Err(PutError::Full(datum)) => assert_eq!(datum, 2),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn close_is_idempotent_and_sticky() {
        let buffer = Buffer::<u32>::new(2);
        assert!(!buffer.closed());
        assert!(buffer.close());
        assert!(!buffer.close());
        assert!(buffer.closed());
    }

    #[test]
    fn put_after_close_is_rejected() {
        let buffer = Buffer::new(2);
        buffer.close();
        match buffer.put(7) {
            Err(PutError::Closed(datum)) => assert_eq!(datum, 7),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn closed_buffer_drains_before_reporting_closure() {
        let buffer = Buffer::new(2);
        buffer.put("a").unwrap();
        buffer.put("b").unwrap();
        buffer.close();

        assert_eq!(buffer.get().unwrap(), Some("a"));
        assert_eq!(buffer.get().unwrap(), Some("b"));
        assert_eq!(buffer.get(), Err(BufferError::Closed));
    }

    #[test]
    fn len_never_exceeds_cap() {
        let buffer = Buffer::new(3);
        for n in 0..10 {
            let _ = buffer.put(n);
            assert!(buffer.len() <= buffer.cap());
        }
        assert_eq!(buffer.len(), 3);
    }
}
