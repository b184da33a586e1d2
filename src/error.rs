//! Error values shared across the engine.
//!
//! Every error a running crawl can surface funnels through [`CrawlError`]:
//! workers tag module failures with the originating module ID and publish
//! them to the error pool, and the scheduler's error channel hands them to
//! the subscriber. Configuration problems are reported as
//! [`CrawlError::IllegalParameter`] before any state transition completes.

use crate::module::{Mid, ModuleKind};
use thiserror::Error;

/// A convenience alias for results produced by the engine.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Errors emitted by the scheduler, the processing modules, and the
/// supporting toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrawlError {
    /// A downloader failed to turn a request into a response.
    #[error("crawler error: downloader error: {0}")]
    Downloader(String),

    /// An analyzer failed while parsing a response.
    #[error("crawler error: analyzer error: {0}")]
    Analyzer(String),

    /// An item pipeline failed while processing an item.
    #[error("crawler error: pipeline error: {0}")]
    Pipeline(String),

    /// A failure inside the scheduler itself.
    #[error("crawler error: scheduler error: {0}")]
    Scheduler(String),

    /// An argument or datum failed validation.
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    /// The registry holds no module of the requested kind.
    #[error("not found module instance: type {0}")]
    ModuleNotFound(ModuleKind),
}

impl CrawlError {
    /// Wraps an arbitrary error into the category of the given module
    /// kind, tagged with the module's ID.
    pub(crate) fn for_module(kind: ModuleKind, mid: &Mid, err: impl std::fmt::Display) -> Self {
        let msg = format!("module {mid}: {err}");
        match kind {
            ModuleKind::Downloader => CrawlError::Downloader(msg),
            ModuleKind::Analyzer => CrawlError::Analyzer(msg),
            ModuleKind::Pipeline => CrawlError::Pipeline(msg),
        }
    }

    /// Shorthand for an `illegal parameter` error.
    pub(crate) fn illegal(msg: impl Into<String>) -> Self {
        CrawlError::IllegalParameter(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Mid, ModuleKind};

    #[test]
    fn display_carries_category_prefix() {
        let err = CrawlError::Downloader("connection refused".into());
        assert_eq!(
            err.to_string(),
            "crawler error: downloader error: connection refused"
        );

        let err = CrawlError::IllegalParameter("zero buffer capacity".into());
        assert_eq!(err.to_string(), "illegal parameter: zero buffer capacity");
    }

    #[test]
    fn module_tagging_embeds_the_mid() {
        let mid = Mid::new(ModuleKind::Analyzer, 7, None);
        let err = CrawlError::for_module(ModuleKind::Analyzer, &mid, "bad markup");
        assert_eq!(
            err.to_string(),
            "crawler error: analyzer error: module A7: bad markup"
        );
    }
}
