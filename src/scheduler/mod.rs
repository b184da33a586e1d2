//! The scheduler: lifecycle, data routing, and the crawl's shared
//! context.
//!
//! The scheduler seeds the request pool, drives three stage worker groups
//! (download, analyze, pick) over the four buffer pools, and funnels
//! every error into the error pool, which [`Scheduler::error_chan`]
//! bridges to a subscriber. Lifecycle transitions follow the legality
//! rules in [`status`]; `init` rebuilds the crawl context, `start` spawns
//! the workers and admits the seed request, `stop` cancels and closes the
//! pools, then joins the workers.

mod args;
mod status;
mod summary;
mod workers;


pub use args::{DataArgs, ModuleArgs, RequestArgs};
pub use status::Status;
pub use summary::{ModuleArgsSummary, PoolSummary, SchedSummary};

use crate::buffer::BufferPool;
use crate::data::{Item, Request, Response};
use crate::domain::primary_domain;
use crate::error::{CrawlError, CrawlResult};
use crate::module::{Module, ModuleEntry, ModuleKind, Registry};
use dashmap::DashSet;
use futures_util::future::join_all;
use parking_lot::RwLock;
use status::check_transition;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// How long `stop` waits for the stage workers before aborting them.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a crawl shares between the scheduler API and its workers.
pub(crate) struct CrawlContext {
    max_depth: u32,
    accepted_domains: DashSet<String>,
    urls: DashSet<String>,
    registry: Registry,
    cancelled: AtomicBool,
    req_pool: RwLock<Arc<BufferPool<Request>>>,
    resp_pool: RwLock<Arc<BufferPool<Response>>>,
    item_pool: RwLock<Arc<BufferPool<Item>>>,
    error_pool: RwLock<Arc<BufferPool<CrawlError>>>,
}

impl CrawlContext {
    fn build(request_args: &RequestArgs, data_args: &DataArgs) -> CrawlResult<Self> {
        let accepted_domains = DashSet::new();
        for domain in &request_args.accepted_domains {
            accepted_domains.insert(domain.to_ascii_lowercase());
        }
        Ok(Self {
            max_depth: request_args.max_depth,
            accepted_domains,
            urls: DashSet::new(),
            registry: Registry::new(),
            cancelled: AtomicBool::new(false),
            req_pool: RwLock::new(Arc::new(BufferPool::new(
                data_args.req_buffer_cap,
                data_args.req_max_buffer_number,
            )?)),
            resp_pool: RwLock::new(Arc::new(BufferPool::new(
                data_args.resp_buffer_cap,
                data_args.resp_max_buffer_number,
            )?)),
            item_pool: RwLock::new(Arc::new(BufferPool::new(
                data_args.item_buffer_cap,
                data_args.item_max_buffer_number,
            )?)),
            error_pool: RwLock::new(Arc::new(BufferPool::new(
                data_args.error_buffer_cap,
                data_args.error_max_buffer_number,
            )?)),
        })
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn req_pool(&self) -> Arc<BufferPool<Request>> {
        self.req_pool.read().clone()
    }

    pub(crate) fn resp_pool(&self) -> Arc<BufferPool<Response>> {
        self.resp_pool.read().clone()
    }

    pub(crate) fn item_pool(&self) -> Arc<BufferPool<Item>> {
        self.item_pool.read().clone()
    }

    pub(crate) fn error_pool(&self) -> Arc<BufferPool<CrawlError>> {
        self.error_pool.read().clone()
    }

    fn close_pools(&self) {
        self.req_pool().close();
        self.resp_pool().close();
        self.item_pool().close();
        self.error_pool().close();
    }

    /// Recreates every closed pool with its original sizing (fresh
    /// accounting included) and clears the cancellation flag, so a
    /// stopped scheduler can be started again.
    fn reopen_pools(&self, data_args: &DataArgs) -> CrawlResult<()> {
        if self.req_pool().closed() {
            *self.req_pool.write() = Arc::new(BufferPool::new(
                data_args.req_buffer_cap,
                data_args.req_max_buffer_number,
            )?);
        }
        if self.resp_pool().closed() {
            *self.resp_pool.write() = Arc::new(BufferPool::new(
                data_args.resp_buffer_cap,
                data_args.resp_max_buffer_number,
            )?);
        }
        if self.item_pool().closed() {
            *self.item_pool.write() = Arc::new(BufferPool::new(
                data_args.item_buffer_cap,
                data_args.item_max_buffer_number,
            )?);
        }
        if self.error_pool().closed() {
            *self.error_pool.write() = Arc::new(BufferPool::new(
                data_args.error_buffer_cap,
                data_args.error_max_buffer_number,
            )?);
        }
        self.cancelled.store(false, Ordering::Release);
        Ok(())
    }

    /// Applies the admission filter and, on success, asynchronously puts
    /// the request into the request pool and records its URL as visited.
    ///
    /// Admission is race-tolerant: concurrent submissions of the same URL
    /// may both pass the visited check; the worst case is a duplicated
    /// fetch.
    pub(crate) fn send_req(&self, req: Request) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if !req.valid() {
            trace!("dropping invalid request");
            return false;
        }
        let scheme = req.url().scheme();
        if scheme != "http" && scheme != "https" {
            trace!(url = %req.url(), scheme, "dropping request with unsupported scheme");
            return false;
        }
        let url_str = req.url().as_str().to_string();
        if self.urls.contains(&url_str) {
            trace!(url = %url_str, "dropping already visited URL");
            return false;
        }
        let Some(host) = req.url().host_str() else {
            return false;
        };
        let Ok(domain) = primary_domain(host) else {
            trace!(host, "dropping request with unresolvable primary domain");
            return false;
        };
        if !self.accepted_domains.contains(&domain) {
            trace!(url = %url_str, domain, "dropping request outside accepted domains");
            return false;
        }
        if req.depth() > self.max_depth {
            trace!(url = %url_str, depth = req.depth(), "dropping request beyond max depth");
            return false;
        }

        let pool = self.req_pool();
        tokio::spawn(async move {
            if pool.put(req).await.is_err() {
                trace!("request pool closed; admitted request dropped");
            }
        });
        self.urls.insert(url_str);
        true
    }

    /// Puts an already-admitted request straight back into the request
    /// pool so another downloader instance can retry it. Bypasses the
    /// admission filter: the URL is already recorded as visited.
    pub(crate) fn readmit_request(&self, req: Request) {
        if self.is_cancelled() {
            return;
        }
        let pool = self.req_pool();
        tokio::spawn(async move {
            if pool.put(req).await.is_err() {
                trace!("request pool closed; retried request dropped");
            }
        });
    }

    pub(crate) fn send_resp(&self, resp: Response) {
        if self.is_cancelled() {
            return;
        }
        let pool = self.resp_pool();
        tokio::spawn(async move {
            if pool.put(resp).await.is_err() {
                trace!("response pool closed; response dropped");
            }
        });
    }

    pub(crate) fn send_item(&self, item: Item) {
        if self.is_cancelled() {
            return;
        }
        let pool = self.item_pool();
        tokio::spawn(async move {
            if pool.put(item).await.is_err() {
                trace!("item pool closed; item dropped");
            }
        });
    }

    pub(crate) fn send_error(&self, err: CrawlError) {
        if self.is_cancelled() {
            return;
        }
        let pool = self.error_pool();
        tokio::spawn(async move {
            if pool.put(err).await.is_err() {
                trace!("error pool closed; error dropped");
            }
        });
    }

    /// True when no module call is in flight and the request, response,
    /// and item pools are all empty. The error pool is excluded: errors
    /// accumulate without blocking progress.
    fn idle(&self) -> bool {
        for entry in self.registry.get_all().values() {
            if entry.as_module().handling_number() > 0 {
                return false;
            }
        }
        self.req_pool().total() == 0
            && self.resp_pool().total() == 0
            && self.item_pool().total() == 0
    }
}

/// The crawl engine's entry point.
///
/// # Example
///
/// ```rust,ignore
/// use trawler_core::prelude::*;
///
/// let scheduler = Scheduler::new();
/// scheduler.init(request_args, data_args, module_args)?;
/// scheduler.start(Request::get(seed_url)).await?;
/// let errors = scheduler.error_chan()?;
/// while let Ok(err) = errors.recv().await {
///     eprintln!("{err}");
/// }
/// ```
#[derive(Default)]
pub struct Scheduler {
    status: RwLock<Status>,
    inner: RwLock<Option<SchedulerInner>>,
    handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

struct SchedulerInner {
    ctx: Arc<CrawlContext>,
    request_args: RequestArgs,
    data_args: DataArgs,
    module_counts: ModuleArgsSummary,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the arguments, rebuilds the crawl context (closing any
    /// prior pools), and registers the modules. Legal from every steady
    /// state except started; failures roll the status back.
    pub fn init(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> CrawlResult<()> {
        let old = self.check_and_set_status(Status::Initializing)?;
        match self.build_inner(request_args, data_args, module_args) {
            Ok(inner) => {
                if let Some(prev) = self.inner.write().replace(inner) {
                    prev.ctx.close_pools();
                }
                *self.status.write() = Status::Initialized;
                info!("scheduler initialized");
                Ok(())
            }
            Err(err) => {
                *self.status.write() = old;
                Err(err)
            }
        }
    }

    fn build_inner(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> CrawlResult<SchedulerInner> {
        request_args.check()?;
        data_args.check()?;
        module_args.check()?;

        let ctx = CrawlContext::build(&request_args, &data_args)?;
        debug!(
            max_depth = request_args.max_depth,
            domains = request_args.accepted_domains.len(),
            "crawl context built"
        );

        let entries = module_args
            .downloaders
            .iter()
            .map(|d| ModuleEntry::Downloader(d.clone()))
            .chain(
                module_args
                    .analyzers
                    .iter()
                    .map(|a| ModuleEntry::Analyzer(a.clone())),
            )
            .chain(
                module_args
                    .pipelines
                    .iter()
                    .map(|p| ModuleEntry::Pipeline(p.clone())),
            );
        for entry in entries {
            let mid = entry.as_module().id().clone();
            if !ctx.registry.register(entry)? {
                return Err(CrawlError::illegal(format!("duplicate module ID {mid}")));
            }
        }

        let module_counts = ModuleArgsSummary {
            downloader_list_size: module_args.downloaders.len(),
            analyzer_list_size: module_args.analyzers.len(),
            pipeline_list_size: module_args.pipelines.len(),
        };
        Ok(SchedulerInner {
            ctx: Arc::new(ctx),
            request_args,
            data_args,
            module_counts,
        })
    }

    /// Spawns the stage workers and admits `first_req` as the seed at
    /// depth zero. Its primary domain is added to the accepted set.
    pub async fn start(&self, first_req: Request) -> CrawlResult<()> {
        let old = self.check_and_set_status(Status::Starting)?;
        match self.launch(first_req).await {
            Ok(()) => {
                *self.status.write() = Status::Started;
                info!("scheduler started");
                Ok(())
            }
            Err(err) => {
                *self.status.write() = old;
                Err(err)
            }
        }
    }

    async fn launch(&self, first_req: Request) -> CrawlResult<()> {
        let (ctx, data_args) = {
            let inner = self.inner.read();
            let inner = inner
                .as_ref()
                .ok_or_else(|| CrawlError::Scheduler("the scheduler has not been initialized".into()))?;
            (inner.ctx.clone(), inner.data_args.clone())
        };

        if !first_req.valid() {
            return Err(CrawlError::illegal("invalid first request: URL has no host"));
        }
        let host = first_req
            .url()
            .host_str()
            .ok_or_else(|| CrawlError::illegal("first request URL has no host"))?;
        let domain = primary_domain(host)?;
        debug!(%domain, "accepting the seed's primary domain");
        ctx.accepted_domains.insert(domain);

        ctx.reopen_pools(&data_args)?;

        let mut handles = self.handles.lock().await;
        handles.extend(workers::spawn_stage_workers(&ctx));

        let seed = first_req.at_depth(0);
        ctx.send_req(seed);
        Ok(())
    }

    /// Cancels the crawl, closes the pools, and joins the workers.
    /// Legal only while started.
    pub async fn stop(&self) -> CrawlResult<()> {
        self.check_and_set_status(Status::Stopping)?;
        let ctx = self
            .context()
            .expect("a started scheduler has a crawl context");

        ctx.cancel();
        ctx.close_pools();

        let mut handles = std::mem::take(&mut *self.handles.lock().await);
        let joined =
            tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, join_all(handles.iter_mut())).await;
        if joined.is_err() {
            warn!(
                timeout_secs = SHUTDOWN_JOIN_TIMEOUT.as_secs(),
                "stage workers did not finish in time; aborting them"
            );
            for handle in &handles {
                handle.abort();
            }
        }

        *self.status.write() = Status::Stopped;
        info!("scheduler stopped");
        Ok(())
    }

    pub fn status(&self) -> Status {
        *self.status.read()
    }

    /// See [`CrawlContext::idle`]. An uninitialized scheduler is
    /// trivially idle.
    pub fn idle(&self) -> bool {
        self.context().map(|ctx| ctx.idle()).unwrap_or(true)
    }

    /// Returns a fresh receive-only channel fed from the error pool, with
    /// capacity equal to the pool's per-buffer cap. The channel closes
    /// when the crawl is cancelled or the error pool closes. One live
    /// subscriber is assumed.
    pub fn error_chan(&self) -> CrawlResult<kanal::AsyncReceiver<CrawlError>> {
        let ctx = self.context().ok_or_else(|| {
            CrawlError::Scheduler("the scheduler has not been initialized".into())
        })?;
        let error_pool = ctx.error_pool();
        let (tx, rx) = kanal::bounded_async::<CrawlError>(error_pool.buffer_cap() as usize);

        tokio::spawn(async move {
            loop {
                if ctx.is_cancelled() {
                    break;
                }
                match error_pool.get().await {
                    Ok(err) => {
                        if tx.send(err).await.is_err() {
                            trace!("error subscriber went away");
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            // Dropping the sender closes the channel for the subscriber.
        });

        Ok(rx)
    }

    /// Assembles the observable snapshot of the whole engine.
    pub fn summary(&self) -> CrawlResult<SchedSummary> {
        let inner = self.inner.read();
        let inner = inner
            .as_ref()
            .ok_or_else(|| CrawlError::Scheduler("the scheduler has not been initialized".into()))?;
        let ctx = &inner.ctx;

        let by_kind = |kind: ModuleKind| {
            let mut summaries: Vec<_> = ctx
                .registry
                .get_all_by_kind(kind)
                .values()
                .map(|entry| entry.as_module().summary())
                .collect();
            summaries.sort_by(|a, b| a.id.cmp(&b.id));
            summaries
        };

        Ok(SchedSummary {
            request_args: inner.request_args.clone(),
            data_args: inner.data_args.clone(),
            module_args: inner.module_counts,
            status: self.status().to_string(),
            downloaders: by_kind(ModuleKind::Downloader),
            analyzers: by_kind(ModuleKind::Analyzer),
            pipelines: by_kind(ModuleKind::Pipeline),
            req_buffer_pool: PoolSummary::of(&ctx.req_pool()),
            resp_buffer_pool: PoolSummary::of(&ctx.resp_pool()),
            item_buffer_pool: PoolSummary::of(&ctx.item_pool()),
            error_buffer_pool: PoolSummary::of(&ctx.error_pool()),
            url_number: ctx.urls.len() as u64,
        })
    }

    fn check_and_set_status(&self, wanted: Status) -> CrawlResult<Status> {
        let mut status = self.status.write();
        check_transition(*status, wanted)?;
        let old = *status;
        *status = wanted;
        Ok(old)
    }

    pub(crate) fn context(&self) -> Option<Arc<CrawlContext>> {
        self.inner.read().as_ref().map(|inner| inner.ctx.clone())
    }
}
