//! Scheduler configuration: request limits, pool sizing, and the module
//! lists.
//!
//! Every argument set validates itself before the scheduler commits any
//! state; a failed check surfaces as `illegal parameter` and the
//! scheduler rolls back to its previous status.

use crate::error::{CrawlError, CrawlResult};
use crate::module::{Analyzer, Downloader, Pipeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Limits applied to request admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestArgs {
    /// Primary domains requests may target; anything else is dropped.
    #[serde(rename = "accepted_primary_domains")]
    pub accepted_domains: Vec<String>,
    /// Requests deeper than this hop count are dropped. The seed is at
    /// depth zero.
    pub max_depth: u32,
}

impl RequestArgs {
    pub fn check(&self) -> CrawlResult<()> {
        if self.accepted_domains.is_empty() {
            return Err(CrawlError::illegal("empty accepted primary domain list"));
        }
        Ok(())
    }
}

/// Sizing of the four buffer pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataArgs {
    pub req_buffer_cap: u32,
    pub req_max_buffer_number: u32,
    pub resp_buffer_cap: u32,
    pub resp_max_buffer_number: u32,
    pub item_buffer_cap: u32,
    pub item_max_buffer_number: u32,
    pub error_buffer_cap: u32,
    pub error_max_buffer_number: u32,
}

impl DataArgs {
    pub fn check(&self) -> CrawlResult<()> {
        let checks: [(u32, &str); 8] = [
            (self.req_buffer_cap, "zero request buffer capacity"),
            (self.req_max_buffer_number, "zero max request buffer number"),
            (self.resp_buffer_cap, "zero response buffer capacity"),
            (self.resp_max_buffer_number, "zero max response buffer number"),
            (self.item_buffer_cap, "zero item buffer capacity"),
            (self.item_max_buffer_number, "zero max item buffer number"),
            (self.error_buffer_cap, "zero error buffer capacity"),
            (self.error_max_buffer_number, "zero max error buffer number"),
        ];
        for (value, msg) in checks {
            if value == 0 {
                return Err(CrawlError::illegal(msg));
            }
        }
        Ok(())
    }
}

impl Default for DataArgs {
    /// Modest symmetric sizing suitable for small crawls.
    fn default() -> Self {
        Self {
            req_buffer_cap: 50,
            req_max_buffer_number: 10,
            resp_buffer_cap: 50,
            resp_max_buffer_number: 10,
            item_buffer_cap: 50,
            item_max_buffer_number: 10,
            error_buffer_cap: 50,
            error_max_buffer_number: 10,
        }
    }
}

/// The processing modules to register, at least one of each kind.
#[derive(Clone, Default)]
pub struct ModuleArgs {
    pub downloaders: Vec<Arc<dyn Downloader>>,
    pub analyzers: Vec<Arc<dyn Analyzer>>,
    pub pipelines: Vec<Arc<dyn Pipeline>>,
}

impl ModuleArgs {
    pub fn check(&self) -> CrawlResult<()> {
        if self.downloaders.is_empty() {
            return Err(CrawlError::illegal("empty downloader list"));
        }
        if self.analyzers.is_empty() {
            return Err(CrawlError::illegal("empty analyzer list"));
        }
        if self.pipelines.is_empty() {
            return Err(CrawlError::illegal("empty pipeline list"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_args_require_a_domain() {
        let args = RequestArgs {
            accepted_domains: Vec::new(),
            max_depth: 1,
        };
        assert!(args.check().is_err());

        let args = RequestArgs {
            accepted_domains: vec!["example.org".into()],
            max_depth: 0,
        };
        assert!(args.check().is_ok());
    }

    #[test]
    fn data_args_reject_any_zero_field() {
        let good = DataArgs::default();
        assert!(good.check().is_ok());

        let bad = DataArgs {
            item_max_buffer_number: 0,
            ..DataArgs::default()
        };
        let err = bad.check().unwrap_err();
        assert!(err.to_string().contains("item buffer number"));
    }

    #[test]
    fn module_args_require_every_kind() {
        let args = ModuleArgs::default();
        let err = args.check().unwrap_err();
        assert!(err.to_string().contains("downloader"));
    }

    #[test]
    fn request_args_serialize_with_wire_names() {
        let args = RequestArgs {
            accepted_domains: vec!["example.org".into()],
            max_depth: 3,
        };
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["accepted_primary_domains"][0], "example.org");
        assert_eq!(json["max_depth"], 3);
    }
}
