//! The HTTP downloader module.

use super::{delegate_module, Downloader, Mid, ModuleBase, ModuleKind, ScoreCalculator};
use crate::data::{Request, Response};
use crate::error::{CrawlError, CrawlResult};
use async_trait::async_trait;
use tracing::debug;

/// A downloader backed by a shared `reqwest` client.
///
/// Performs exactly one attempt per call; retry policy lives in the
/// scheduler's load balancing, not here.
pub struct HttpDownloader {
    base: ModuleBase,
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(mid: Mid, client: reqwest::Client, calculator: ScoreCalculator) -> CrawlResult<Self> {
        if mid.kind() != ModuleKind::Downloader {
            return Err(CrawlError::illegal(format!(
                "module ID {mid} does not name a downloader"
            )));
        }
        Ok(Self {
            base: ModuleBase::new(mid, calculator),
            client,
        })
    }
}

delegate_module!(HttpDownloader);

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, req: &Request) -> CrawlResult<Response> {
        let _handling = self.base.start_handling();
        self.base.incr_called();

        if !req.valid() {
            return Err(CrawlError::illegal(format!(
                "request URL {} has no host",
                req.url()
            )));
        }
        self.base.incr_accepted();

        debug!(url = %req.url(), depth = req.depth(), "downloading");
        let outbound = self
            .client
            .request(req.method().clone(), req.url().clone())
            .headers(req.headers().clone())
            .build()
            .map_err(|e| CrawlError::Downloader(e.to_string()))?;

        let reply = self
            .client
            .execute(outbound)
            .await
            .map_err(|e| CrawlError::Downloader(e.to_string()))?;

        let url = reply.url().clone();
        let status = reply.status();
        let headers = reply.headers().clone();
        let body = reply
            .bytes()
            .await
            .map_err(|e| CrawlError::Downloader(e.to_string()))?;

        self.base.incr_completed();
        Ok(Response::new(url, status, headers, body, req.depth()))
    }
}
