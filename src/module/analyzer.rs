//! The response analyzer module.
//!
//! An analyzer owns an ordered list of parser functions. Each parser sees
//! the complete response body (replayed through a [`MultipleReader`]
//! snapshot) and contributes follow-up requests and extracted items; the
//! analyzer merges the results and normalizes every emitted request to the
//! next hop depth.

use super::{delegate_module, Analyzer, Mid, ModuleBase, ModuleKind, ScoreCalculator};
use crate::data::{Data, Response};
use crate::error::{CrawlError, CrawlResult};
use crate::reader::MultipleReader;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Extracts data from one view of a response. The second argument is the
/// response depth, handy when parsers build follow-up requests.
pub type ParseResponse =
    Arc<dyn Fn(&Response, u32) -> (Vec<Data>, Vec<CrawlError>) + Send + Sync>;

/// An analyzer that runs a response through a list of parser functions.
pub struct ParserAnalyzer {
    base: ModuleBase,
    parsers: Vec<ParseResponse>,
}

impl ParserAnalyzer {
    pub fn new(
        mid: Mid,
        parsers: Vec<ParseResponse>,
        calculator: ScoreCalculator,
    ) -> CrawlResult<Self> {
        if mid.kind() != ModuleKind::Analyzer {
            return Err(CrawlError::illegal(format!(
                "module ID {mid} does not name an analyzer"
            )));
        }
        if parsers.is_empty() {
            return Err(CrawlError::illegal("empty response parser list"));
        }
        Ok(Self {
            base: ModuleBase::new(mid, calculator),
            parsers,
        })
    }

    /// The parsers this analyzer applies, in order.
    pub fn parsers(&self) -> &[ParseResponse] {
        &self.parsers
    }
}

delegate_module!(ParserAnalyzer);

#[async_trait]
impl Analyzer for ParserAnalyzer {
    async fn analyze(&self, resp: Response) -> (Vec<Data>, Vec<CrawlError>) {
        let _handling = self.base.start_handling();
        self.base.incr_called();

        let mut errors = Vec::new();
        if !resp.valid() {
            errors.push(CrawlError::illegal(format!(
                "response URL {} has no host",
                resp.url()
            )));
            return (Vec::new(), errors);
        }
        self.base.incr_accepted();

        let depth = resp.depth();
        debug!(url = %resp.url(), depth, "analyzing response");

        // Snapshot once; every parser replays the full body.
        let body = MultipleReader::new(resp.body().clone());
        let mut data = Vec::new();
        for parser in &self.parsers {
            let view = Response::new(
                resp.url().clone(),
                resp.status(),
                resp.headers().clone(),
                body.bytes(),
                depth,
            );
            let (parsed, parse_errors) = parser(&view, depth);
            for datum in parsed {
                data.push(normalize_depth(datum, depth));
            }
            errors.extend(parse_errors);
        }

        if errors.is_empty() {
            self.base.incr_completed();
        }
        (data, errors)
    }
}

/// Rewrites an emitted request to the hop depth that follows `resp_depth`.
/// Items pass through untouched.
fn normalize_depth(datum: Data, resp_depth: u32) -> Data {
    match datum {
        Data::Request(req) => {
            let next_depth = resp_depth.saturating_add(1);
            if req.depth() == next_depth {
                Data::Request(req)
            } else {
                Data::Request(req.at_depth(next_depth))
            }
        }
        other => other,
    }
}
