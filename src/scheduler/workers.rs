//! The three stage worker groups.
//!
//! Each stage runs one worker per registered module of its kind. A worker
//! loops over its source pool: check cancellation, blocking-get a datum
//! (pool closure ends the loop), select the least-loaded module from the
//! registry, and process. A failed module lookup is transient: the datum
//! goes back to its source pool so another instance can pick it up.

use super::CrawlContext;
use crate::data::{Data, Item, Request, Response};
use crate::error::CrawlError;
use crate::module::{Module, ModuleKind};
use log::{debug, trace};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Spawns the download, analyze, and pick worker groups.
pub(crate) fn spawn_stage_workers(ctx: &Arc<CrawlContext>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    spawn_download_workers(ctx, &mut handles);
    spawn_analyze_workers(ctx, &mut handles);
    spawn_pick_workers(ctx, &mut handles);
    handles
}

fn worker_count(ctx: &CrawlContext, kind: ModuleKind) -> usize {
    ctx.registry().count_by_kind(kind).max(1)
}

fn spawn_download_workers(ctx: &Arc<CrawlContext>, handles: &mut Vec<JoinHandle<()>>) {
    let count = worker_count(ctx, ModuleKind::Downloader);
    trace!("spawning {count} download workers");
    for _ in 0..count {
        let ctx = Arc::clone(ctx);
        let req_pool = ctx.req_pool();
        handles.push(tokio::spawn(async move {
            loop {
                if ctx.is_cancelled() {
                    break;
                }
                let req = match req_pool.get().await {
                    Ok(req) => req,
                    Err(_) => break,
                };
                process_download(&ctx, req).await;
            }
            trace!("download worker finished");
        }));
    }
}

fn spawn_analyze_workers(ctx: &Arc<CrawlContext>, handles: &mut Vec<JoinHandle<()>>) {
    let count = worker_count(ctx, ModuleKind::Analyzer);
    trace!("spawning {count} analyze workers");
    for _ in 0..count {
        let ctx = Arc::clone(ctx);
        let resp_pool = ctx.resp_pool();
        handles.push(tokio::spawn(async move {
            loop {
                if ctx.is_cancelled() {
                    break;
                }
                let resp = match resp_pool.get().await {
                    Ok(resp) => resp,
                    Err(_) => break,
                };
                process_analyze(&ctx, resp).await;
            }
            trace!("analyze worker finished");
        }));
    }
}

fn spawn_pick_workers(ctx: &Arc<CrawlContext>, handles: &mut Vec<JoinHandle<()>>) {
    let count = worker_count(ctx, ModuleKind::Pipeline);
    trace!("spawning {count} pick workers");
    for _ in 0..count {
        let ctx = Arc::clone(ctx);
        let item_pool = ctx.item_pool();
        handles.push(tokio::spawn(async move {
            loop {
                if ctx.is_cancelled() {
                    break;
                }
                let item = match item_pool.get().await {
                    Ok(item) => item,
                    Err(_) => break,
                };
                process_pick(&ctx, item).await;
            }
            trace!("pick worker finished");
        }));
    }
}

async fn process_download(ctx: &CrawlContext, req: Request) {
    let downloader = match ctx.registry().downloader() {
        Ok(d) => d,
        Err(err) => {
            ctx.send_error(CrawlError::Scheduler(err.to_string()));
            ctx.readmit_request(req);
            return;
        }
    };
    let mid = downloader.id().clone();
    trace!("downloading {} with module {mid}", req.url());

    match downloader.download(&req).await {
        Ok(resp) => ctx.send_resp(resp),
        Err(err) => {
            debug!("download of {} failed: {err}", req.url());
            ctx.send_error(CrawlError::for_module(ModuleKind::Downloader, &mid, err));
            // Another instance may fare better; the request keeps its
            // place in the crawl.
            ctx.readmit_request(req);
        }
    }
}

async fn process_analyze(ctx: &CrawlContext, resp: Response) {
    let analyzer = match ctx.registry().analyzer() {
        Ok(a) => a,
        Err(err) => {
            ctx.send_error(CrawlError::Scheduler(err.to_string()));
            ctx.send_resp(resp);
            return;
        }
    };
    let mid = analyzer.id().clone();
    trace!("analyzing {} with module {mid}", resp.url());

    let (data, errors) = analyzer.analyze(resp).await;
    for datum in data {
        match datum {
            Data::Request(req) => {
                ctx.send_req(req);
            }
            Data::Item(item) => ctx.send_item(item),
        }
    }
    for err in errors {
        ctx.send_error(CrawlError::for_module(ModuleKind::Analyzer, &mid, err));
    }
}

async fn process_pick(ctx: &CrawlContext, item: Item) {
    let pipeline = match ctx.registry().pipeline() {
        Ok(p) => p,
        Err(err) => {
            ctx.send_error(CrawlError::Scheduler(err.to_string()));
            ctx.send_item(item);
            return;
        }
    };
    let mid = pipeline.id().clone();
    trace!("processing an item with module {mid}");

    for err in pipeline.send(item).await {
        ctx.send_error(CrawlError::for_module(ModuleKind::Pipeline, &mid, err));
    }
}
