//! A "prelude" for users of the `trawler-core` crate.
//!
//! Re-exports the types most programs need to assemble and drive a crawl.
//!
//! # Example
//!
//! ```
//! use trawler_core::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Scheduler,
    // Data envelopes
    Data,
    Item,
    Request,
    Response,
    // Module contracts
    Analyzer,
    Downloader,
    Module,
    Pipeline,
    // Errors
    CrawlError,
    CrawlResult,
    // Essential re-export for trait implementation
    async_trait,
};
