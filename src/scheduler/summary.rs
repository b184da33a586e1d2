//! The scheduler's observable runtime snapshot.
//!
//! A summary is assembled on demand from the live registry, pools, and
//! visited-URL set, and serializes to the JSON shape monitoring tools
//! consume.

use super::args::{DataArgs, RequestArgs};
use crate::buffer::BufferPool;
use crate::module::ModuleSummary;
use serde::Serialize;
use std::fmt;

/// Sizes of the registered module lists.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModuleArgsSummary {
    pub downloader_list_size: usize,
    pub analyzer_list_size: usize,
    pub pipeline_list_size: usize,
}

/// Snapshot of one buffer pool.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolSummary {
    pub buffer_cap: u32,
    pub max_buffer_number: u32,
    pub buffer_number: u32,
    pub total: u64,
}

impl PoolSummary {
    pub(crate) fn of<T>(pool: &BufferPool<T>) -> Self {
        Self {
            buffer_cap: pool.buffer_cap(),
            max_buffer_number: pool.max_buffer_number(),
            buffer_number: pool.buffer_number(),
            total: pool.total(),
        }
    }
}

/// The full scheduler snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedSummary {
    pub request_args: RequestArgs,
    pub data_args: DataArgs,
    pub module_args: ModuleArgsSummary,
    pub status: String,
    pub downloaders: Vec<ModuleSummary>,
    pub analyzers: Vec<ModuleSummary>,
    pub pipelines: Vec<ModuleSummary>,
    #[serde(rename = "request_buffer_pool")]
    pub req_buffer_pool: PoolSummary,
    #[serde(rename = "response_buffer_pool")]
    pub resp_buffer_pool: PoolSummary,
    pub item_buffer_pool: PoolSummary,
    pub error_buffer_pool: PoolSummary,
    pub url_number: u64,
}

impl fmt::Display for SchedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_summary_reflects_the_pool() {
        let pool = BufferPool::<u32>::new(8, 4).unwrap();
        let summary = PoolSummary::of(&pool);
        assert_eq!(summary.buffer_cap, 8);
        assert_eq!(summary.max_buffer_number, 4);
        assert_eq!(summary.buffer_number, 1);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn summary_serializes_with_wire_names() {
        let summary = SchedSummary {
            request_args: RequestArgs {
                accepted_domains: vec!["example.org".into()],
                max_depth: 0,
            },
            data_args: DataArgs::default(),
            module_args: ModuleArgsSummary {
                downloader_list_size: 1,
                analyzer_list_size: 1,
                pipeline_list_size: 1,
            },
            status: "started".into(),
            downloaders: Vec::new(),
            analyzers: Vec::new(),
            pipelines: Vec::new(),
            req_buffer_pool: PoolSummary {
                buffer_cap: 1,
                max_buffer_number: 1,
                buffer_number: 1,
                total: 0,
            },
            resp_buffer_pool: PoolSummary {
                buffer_cap: 1,
                max_buffer_number: 1,
                buffer_number: 1,
                total: 0,
            },
            item_buffer_pool: PoolSummary {
                buffer_cap: 1,
                max_buffer_number: 1,
                buffer_number: 1,
                total: 0,
            },
            error_buffer_pool: PoolSummary {
                buffer_cap: 1,
                max_buffer_number: 1,
                buffer_number: 1,
                total: 0,
            },
            url_number: 0,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("request_buffer_pool").is_some());
        assert!(json.get("response_buffer_pool").is_some());
        assert_eq!(json["status"], "started");
        assert_eq!(json["module_args"]["downloader_list_size"], 1);
    }
}
