//! Bounded buffering: the non-blocking [`Buffer`] and the blocking,
//! adaptively sized [`BufferPool`] built on top of it.

mod buffer;
mod pool;

pub use buffer::{Buffer, BufferError, PutError};
pub use pool::{BufferPool, PoolError};
