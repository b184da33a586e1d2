//! # trawler-core
//!
//! Core engine of the `trawler` web crawling framework: the scheduler,
//! the bounded multi-buffer pools, and the pluggable processing-module
//! registry that together drive the fetch → parse → process pipeline.
//!
//! The engine accepts a seed request and a configured set of
//! [`Downloader`], [`Analyzer`], and [`Pipeline`] modules, then crawls
//! until quiescence or an external stop, producing extracted items and a
//! stream of typed errors.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trawler_core::prelude::*;
//! use trawler_core::{DataArgs, HttpDownloader, ModuleArgs, RequestArgs};
//! use trawler_core::module::{calculate_score_simple, Mid, ModuleKind, SerialGen};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CrawlError> {
//!     let serials = SerialGen::new(1, 0);
//!     let downloader = HttpDownloader::new(
//!         Mid::new(ModuleKind::Downloader, serials.get(), None),
//!         reqwest::Client::new(),
//!         calculate_score_simple,
//!     )?;
//!
//!     let scheduler = Scheduler::new();
//!     scheduler.init(
//!         RequestArgs {
//!             accepted_domains: vec!["example.org".into()],
//!             max_depth: 2,
//!         },
//!         DataArgs::default(),
//!         ModuleArgs {
//!             downloaders: vec![Arc::new(downloader)],
//!             analyzers: vec![/* … */],
//!             pipelines: vec![/* … */],
//!         },
//!     )?;
//!     scheduler.start(Request::get("http://example.org/".parse().unwrap())).await?;
//!
//!     let errors = scheduler.error_chan()?;
//!     while let Ok(err) = errors.recv().await {
//!         eprintln!("{err}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod data;
pub mod domain;
pub mod error;
pub mod module;
pub mod prelude;
pub mod reader;
pub mod scheduler;

pub use buffer::{Buffer, BufferPool};
pub use data::{Data, Item, Request, Response};
pub use domain::primary_domain;
pub use error::{CrawlError, CrawlResult};
pub use module::{
    Analyzer, Downloader, HttpDownloader, Mid, Module, ModuleKind, ParserAnalyzer, Pipeline,
    ProcessorPipeline, Registry, SerialGen,
};
pub use reader::MultipleReader;
pub use scheduler::{
    DataArgs, ModuleArgs, RequestArgs, SchedSummary, Scheduler, Status,
};

pub use async_trait::async_trait;
pub use kanal;
pub use tokio;
