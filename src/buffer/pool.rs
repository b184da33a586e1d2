//! A two-level bounded container: a dynamic collection of [`Buffer`]s
//! behind blocking put/get semantics.
//!
//! Workers check a buffer out of an outer FIFO (a bounded channel),
//! attempt the non-blocking buffer operation, and check the buffer back
//! in. Sustained contention grows the pool by one buffer at a time up to
//! `max_buffer_number`; sustained idleness shrinks it back down to one.
//! Growing is cheaper than shrinking (an allocation versus retiring a
//! buffer), hence the asymmetric 5×/10× reaction thresholds.

use super::{Buffer, BufferError, PutError};
use crate::error::{CrawlError, CrawlResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Returned by pool operations once the pool is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("the buffer pool is closed")]
    Closed,
}

/// How many failed put attempts (per `buffer_number`) trigger growth.
const GROW_FAIL_FACTOR: u32 = 5;
/// How many empty get attempts (per `buffer_number`) trigger shrinkage.
const SHRINK_FAIL_FACTOR: u32 = 10;

/// A bounded pool of bounded buffers with blocking put/get.
pub struct BufferPool<T> {
    buffer_cap: u32,
    max_buffer_number: u32,
    buffer_number: AtomicU32,
    total: AtomicU64,
    /// Outer FIFO of live buffers. Check-ins go through the sync sender
    /// (never blocking: live buffers never exceed the channel capacity);
    /// check-outs await on the async receiver.
    buf_tx: kanal::Sender<Arc<Buffer<T>>>,
    buf_rx: kanal::AsyncReceiver<Arc<Buffer<T>>>,
    closed: AtomicBool,
    /// Serializes growth and shrinkage of `buffer_number`.
    resize_lock: Mutex<()>,
}

impl<T> BufferPool<T> {
    /// Creates a pool of buffers of capacity `buffer_cap`, starting with
    /// one buffer and growing up to `max_buffer_number`.
    pub fn new(buffer_cap: u32, max_buffer_number: u32) -> CrawlResult<Self> {
        if buffer_cap == 0 {
            return Err(CrawlError::illegal("zero buffer capacity"));
        }
        if max_buffer_number == 0 {
            return Err(CrawlError::illegal("zero max buffer number"));
        }

        let (buf_tx, buf_rx) = kanal::bounded::<Arc<Buffer<T>>>(max_buffer_number as usize);
        buf_tx
            .send(Arc::new(Buffer::new(buffer_cap)))
            .expect("freshly created channel accepts the initial buffer");

        Ok(Self {
            buffer_cap,
            max_buffer_number,
            buffer_number: AtomicU32::new(1),
            total: AtomicU64::new(0),
            buf_tx,
            buf_rx: buf_rx.to_async(),
            closed: AtomicBool::new(false),
            resize_lock: Mutex::new(()),
        })
    }

    pub fn buffer_cap(&self) -> u32 {
        self.buffer_cap
    }

    pub fn max_buffer_number(&self) -> u32 {
        self.max_buffer_number
    }

    pub fn buffer_number(&self) -> u32 {
        self.buffer_number.load(Ordering::Acquire)
    }

    /// The number of data currently held across all buffers. Eventually
    /// consistent under concurrency, exact at quiescence.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stores a datum, blocking until a buffer admits it or the pool
    /// closes.
    pub async fn put(&self, datum: T) -> Result<(), PoolError> {
        let mut datum = datum;
        let mut fail_count: u32 = 0;
        loop {
            if self.closed() {
                return Err(PoolError::Closed);
            }
            let buf = self.check_out().await?;
            match buf.put(datum) {
                Ok(()) => {
                    self.total.fetch_add(1, Ordering::AcqRel);
                    self.check_in(buf);
                    return Ok(());
                }
                Err(PutError::Closed(_)) => {
                    // Buffers close only when the pool shuts down.
                    return Err(PoolError::Closed);
                }
                Err(PutError::Full(rejected)) => {
                    self.check_in(buf);
                    fail_count += 1;
                    let number = self.buffer_number();
                    if fail_count >= GROW_FAIL_FACTOR * number && number < self.max_buffer_number {
                        match self.grow_with(rejected)? {
                            None => return Ok(()),
                            Some(returned) => datum = returned,
                        }
                        fail_count = 0;
                    } else {
                        datum = rejected;
                    }
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Retrieves a datum, blocking until one is available or the pool
    /// closes.
    pub async fn get(&self) -> Result<T, PoolError> {
        let mut fail_count: u32 = 0;
        loop {
            if self.closed() {
                return Err(PoolError::Closed);
            }
            let buf = self.check_out().await?;
            match buf.get() {
                Ok(Some(datum)) => {
                    self.total.fetch_sub(1, Ordering::AcqRel);
                    self.check_in(buf);
                    return Ok(datum);
                }
                Err(BufferError::Closed) => {
                    return Err(PoolError::Closed);
                }
                Ok(None) => {
                    fail_count += 1;
                    let number = self.buffer_number();
                    if fail_count >= SHRINK_FAIL_FACTOR * number
                        && buf.is_empty()
                        && number > 1
                        && self.shrink_by_retiring(&buf)
                    {
                        fail_count = 0;
                        continue;
                    }
                    self.check_in(buf);
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Closes the pool: every contained buffer is closed and further
    /// operations fail immediately. Idempotent; only the first call
    /// returns `true`.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Drain the outer FIFO and close what it still holds; buffers
        // checked out right now are closed on their failed check-in.
        while let Ok(Some(buf)) = self.buf_rx.try_recv() {
            buf.close();
        }
        self.buf_rx.close();
        debug!("buffer pool closed");
        true
    }

    /// Dequeues a live buffer, waiting while all are checked out.
    async fn check_out(&self) -> Result<Arc<Buffer<T>>, PoolError> {
        self.buf_rx.recv().await.map_err(|_| PoolError::Closed)
    }

    /// Returns a buffer to the outer FIFO. Never blocks: the number of
    /// live buffers can't exceed the channel capacity. A check-in racing
    /// pool closure closes the buffer instead.
    fn check_in(&self, buf: Arc<Buffer<T>>) {
        if self.closed() || self.buf_tx.is_closed() {
            buf.close();
            return;
        }
        let retained = Arc::clone(&buf);
        if self.buf_tx.send(buf).is_err() {
            retained.close();
        }
    }

    /// Adds one buffer seeded with `datum`. Returns `Ok(None)` when the
    /// datum was placed, `Ok(Some(datum))` when another worker already
    /// grew the pool to its maximum.
    fn grow_with(&self, datum: T) -> Result<Option<T>, PoolError> {
        let _resize = self.resize_lock.lock();
        if self.closed() {
            return Err(PoolError::Closed);
        }
        let number = self.buffer_number();
        if number >= self.max_buffer_number {
            return Ok(Some(datum));
        }

        let buf = Arc::new(Buffer::new(self.buffer_cap));
        // A fresh open buffer always has room for one datum.
        let _ = buf.put(datum);
        if self.buf_tx.send(buf).is_err() {
            return Err(PoolError::Closed);
        }
        self.buffer_number.store(number + 1, Ordering::Release);
        self.total.fetch_add(1, Ordering::AcqRel);
        trace!(buffer_number = number + 1, "buffer pool grew");
        Ok(None)
    }

    /// Retires a checked-out empty buffer. Returns `false` when the pool
    /// is already down to its last buffer.
    fn shrink_by_retiring(&self, buf: &Buffer<T>) -> bool {
        let _resize = self.resize_lock.lock();
        let number = self.buffer_number();
        if number <= 1 || !buf.is_empty() {
            return false;
        }
        buf.close();
        self.buffer_number.store(number - 1, Ordering::Release);
        trace!(buffer_number = number - 1, "buffer pool shrank");
        true
    }
}

impl<T> Drop for BufferPool<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let pool = BufferPool::new(4, 2).unwrap();
        pool.put(1u32).await.unwrap();
        pool.put(2u32).await.unwrap();
        assert_eq!(pool.total(), 2);

        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        assert_eq!(a + b, 3);
        assert_eq!(pool.total(), 0);
    }

    #[tokio::test]
    async fn pool_grows_under_sustained_pressure() {
        let pool = BufferPool::new(1, 3).unwrap();
        // The single one-slot buffer fills immediately; further puts must
        // grow the pool instead of blocking forever.
        for n in 0..3u32 {
            pool.put(n).await.unwrap();
        }
        assert_eq!(pool.total(), 3);
        assert_eq!(pool.buffer_number(), 3);
        assert!(pool.buffer_number() <= pool.max_buffer_number());
    }

    #[tokio::test]
    async fn full_pool_put_blocks_until_a_get() {
        let pool = Arc::new(BufferPool::new(1, 1).unwrap());
        pool.put(1u32).await.unwrap();

        let writer = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.put(2u32).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        assert_eq!(pool.get().await.unwrap(), 1);
        writer.await.unwrap().unwrap();
        assert_eq!(pool.get().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_pool_get_blocks_until_a_put() {
        let pool = Arc::new(BufferPool::new(2, 2).unwrap());
        let reader = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        pool.put(9u32).await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), 9);
    }

    #[tokio::test]
    async fn idle_spinning_get_shrinks_a_grown_pool() {
        let pool = Arc::new(BufferPool::new(1, 2).unwrap());
        // Grow to two buffers, then drain completely.
        pool.put(1u32).await.unwrap();
        pool.put(2u32).await.unwrap();
        assert_eq!(pool.buffer_number(), 2);
        pool.get().await.unwrap();
        pool.get().await.unwrap();

        let reader = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get().await })
        };
        // The reader spins over empty buffers until the shrink threshold
        // retires one of them.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.buffer_number(), 1);

        pool.put(3u32).await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), 3);
    }

    #[tokio::test]
    async fn closed_pool_rejects_everything() {
        let pool = BufferPool::new(2, 2).unwrap();
        pool.put(1u32).await.unwrap();

        assert!(pool.close());
        assert!(!pool.close());
        assert!(pool.closed());

        assert_eq!(pool.put(2u32).await, Err(PoolError::Closed));
        assert_eq!(pool.get().await, Err(PoolError::Closed));
    }

    #[tokio::test]
    async fn close_wakes_blocked_workers() {
        let pool = Arc::new(BufferPool::<u32>::new(2, 2).unwrap());
        let reader = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.close();
        assert_eq!(reader.await.unwrap(), Err(PoolError::Closed));
    }

    #[test]
    fn constructor_rejects_zero_arguments() {
        assert!(BufferPool::<u32>::new(0, 1).is_err());
        assert!(BufferPool::<u32>::new(1, 0).is_err());
    }

    #[tokio::test]
    async fn total_matches_puts_minus_gets() {
        let pool = BufferPool::new(3, 3).unwrap();
        for n in 0..5u32 {
            pool.put(n).await.unwrap();
        }
        for _ in 0..2 {
            pool.get().await.unwrap();
        }
        assert_eq!(pool.total(), 3);
    }
}
