//! The item pipeline module.

use super::{delegate_module, Mid, ModuleBase, ModuleKind, Pipeline, ScoreCalculator};
use crate::data::Item;
use crate::error::{CrawlError, CrawlResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One step of an item pipeline. Transforms the item in place; the
/// transformed item flows to subsequent processors.
pub type ProcessItem = Arc<dyn Fn(&mut Item) -> CrawlResult<()> + Send + Sync>;

/// A pipeline that runs items through an ordered processor chain.
///
/// With `fail_fast` set, the first processor error aborts the chain;
/// otherwise every processor runs and the errors accumulate.
pub struct ProcessorPipeline {
    base: ModuleBase,
    processors: Vec<ProcessItem>,
    fail_fast: AtomicBool,
}

impl ProcessorPipeline {
    pub fn new(
        mid: Mid,
        processors: Vec<ProcessItem>,
        calculator: ScoreCalculator,
    ) -> CrawlResult<Self> {
        if mid.kind() != ModuleKind::Pipeline {
            return Err(CrawlError::illegal(format!(
                "module ID {mid} does not name a pipeline"
            )));
        }
        if processors.is_empty() {
            return Err(CrawlError::illegal("empty item processor list"));
        }
        Ok(Self {
            base: ModuleBase::new(mid, calculator),
            processors,
            fail_fast: AtomicBool::new(false),
        })
    }

    pub fn processors(&self) -> &[ProcessItem] {
        &self.processors
    }
}

delegate_module!(ProcessorPipeline, summary(self) {
    let mut summary = self.base.summary();
    summary.extra = Some(serde_json::json!({
        "fail_fast": self.fail_fast(),
        "processor_number": self.processors.len(),
    }));
    summary
});

#[async_trait]
impl Pipeline for ProcessorPipeline {
    async fn send(&self, item: Item) -> Vec<CrawlError> {
        let _handling = self.base.start_handling();
        self.base.incr_called();

        let mut errors = Vec::new();
        if !item.valid() {
            errors.push(CrawlError::illegal("empty item"));
            return errors;
        }
        self.base.incr_accepted();

        debug!(fields = item.len(), "processing item");
        let mut current = item;
        for processor in &self.processors {
            if let Err(err) = processor(&mut current) {
                errors.push(err);
                if self.fail_fast() {
                    break;
                }
            }
        }

        if errors.is_empty() {
            self.base.incr_completed();
        }
        errors
    }

    fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::Acquire)
    }

    fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::Release);
    }
}
