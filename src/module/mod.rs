//! Processing modules: contracts, identity, shared state, and the
//! registry.
//!
//! A crawl is driven by three kinds of pluggable modules. Downloaders turn
//! requests into responses, analyzers turn responses into follow-up
//! requests and items, and pipelines consume items. All implementations
//! must be safe to call from multiple workers concurrently on distinct
//! inputs; the [`Registry`] hands out the least-loaded instance of a kind
//! based on each module's score.

mod analyzer;
mod base;
mod downloader;
mod mid;
mod pipeline;
mod registry;

pub use analyzer::{ParseResponse, ParserAnalyzer};
pub use base::{HandlingGuard, ModuleBase};
pub use downloader::HttpDownloader;
pub use mid::{Mid, ModuleKind, SerialGen};
pub use pipeline::{ProcessItem, ProcessorPipeline};
pub use registry::{ModuleEntry, Registry};

pub(crate) use base::delegate_module;

use crate::data::{Data, Item, Request, Response};
use crate::error::{CrawlError, CrawlResult};
use async_trait::async_trait;
use serde::Serialize;

/// One coherent-enough snapshot of a module's four counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Times the primary operation was invoked.
    pub called: u64,
    /// Invocations that passed input validation. `accepted <= called`.
    pub accepted: u64,
    /// Accepted invocations that finished without error.
    /// `completed <= accepted`.
    pub completed: u64,
    /// Invocations currently in flight.
    pub handling: u64,
}

/// JSON-observable summary of one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub id: String,
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub handling: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Derives a module's load score from its counters. Lower scores are
/// selected first.
pub type ScoreCalculator = fn(Counts) -> u64;

/// The default calculator: weights each counter by how strongly it
/// indicates load.
pub fn calculate_score_simple(counts: Counts) -> u64 {
    counts
        .called
        .saturating_add(counts.accepted.saturating_mul(2))
        .saturating_add(counts.completed.saturating_mul(4))
        .saturating_add(counts.handling.saturating_mul(8))
}

/// Behavior common to all module kinds. Implementations must be
/// concurrency-safe.
pub trait Module: Send + Sync {
    fn id(&self) -> &Mid;
    /// The module's network address string, empty for in-process modules.
    fn addr(&self) -> String;
    fn score(&self) -> u64;
    fn set_score(&self, score: u64);
    fn score_calculator(&self) -> ScoreCalculator;
    fn called_count(&self) -> u64;
    fn accepted_count(&self) -> u64;
    fn completed_count(&self) -> u64;
    fn handling_number(&self) -> u64;
    fn counts(&self) -> Counts;
    fn summary(&self) -> ModuleSummary;
}

/// Turns a request into a response. Must not retry internally; retry
/// policy belongs to the scheduler's load balancing.
#[async_trait]
pub trait Downloader: Module {
    /// The request is borrowed so the caller can re-admit it when the
    /// download fails.
    async fn download(&self, req: &Request) -> CrawlResult<Response>;
}

/// Parses a response into follow-up requests and extracted items.
#[async_trait]
pub trait Analyzer: Module {
    /// Consumes the response (and its body). Emitted requests whose depth
    /// is not `resp.depth() + 1` are rewritten to that depth.
    async fn analyze(&self, resp: Response) -> (Vec<Data>, Vec<CrawlError>);
}

/// Runs extracted items through an ordered processor chain.
#[async_trait]
pub trait Pipeline: Module {
    async fn send(&self, item: Item) -> Vec<CrawlError>;
    /// Whether the first processor error aborts the chain.
    fn fail_fast(&self) -> bool;
    fn set_fail_fast(&self, fail_fast: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_score_weights_the_counters() {
        let counts = Counts {
            called: 1,
            accepted: 1,
            completed: 1,
            handling: 1,
        };
        assert_eq!(calculate_score_simple(counts), 1 + 2 + 4 + 8);

        let idle = Counts::default();
        assert_eq!(calculate_score_simple(idle), 0);
    }
}
