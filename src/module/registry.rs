//! The module registry: a concurrency-safe directory of registered
//! modules with load-balanced selection.

use super::{Analyzer, Downloader, Mid, Module, ModuleKind, Pipeline};
use crate::error::{CrawlError, CrawlResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A registered module, tagged by kind so callers get the concrete
/// contract back.
#[derive(Clone)]
pub enum ModuleEntry {
    Downloader(Arc<dyn Downloader>),
    Analyzer(Arc<dyn Analyzer>),
    Pipeline(Arc<dyn Pipeline>),
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleEntry::Downloader(m) => f.debug_tuple("Downloader").field(m.id()).finish(),
            ModuleEntry::Analyzer(m) => f.debug_tuple("Analyzer").field(m.id()).finish(),
            ModuleEntry::Pipeline(m) => f.debug_tuple("Pipeline").field(m.id()).finish(),
        }
    }
}

impl ModuleEntry {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleEntry::Downloader(_) => ModuleKind::Downloader,
            ModuleEntry::Analyzer(_) => ModuleKind::Analyzer,
            ModuleEntry::Pipeline(_) => ModuleKind::Pipeline,
        }
    }

    pub fn as_module(&self) -> &dyn Module {
        match self {
            ModuleEntry::Downloader(m) => m.as_ref(),
            ModuleEntry::Analyzer(m) => m.as_ref(),
            ModuleEntry::Pipeline(m) => m.as_ref(),
        }
    }
}

/// Per-kind directory of modules. Mutation takes the write lock; reads
/// and selection share the read lock.
#[derive(Default)]
pub struct Registry {
    modules: RwLock<HashMap<ModuleKind, HashMap<Mid, ModuleEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module. Returns `Ok(false)` when the MID is already
    /// present; rejects a MID whose type letter does not match the entry.
    pub fn register(&self, entry: ModuleEntry) -> CrawlResult<bool> {
        let mid = entry.as_module().id().clone();
        if mid.kind() != entry.kind() {
            return Err(CrawlError::illegal(format!(
                "module ID {mid} does not name a {}",
                entry.kind()
            )));
        }
        let mut modules = self.modules.write();
        let slot = modules.entry(entry.kind()).or_default();
        if slot.contains_key(&mid) {
            return Ok(false);
        }
        trace!(%mid, "registered module");
        slot.insert(mid, entry);
        Ok(true)
    }

    /// Removes the module with the given MID. Returns whether a module
    /// was removed.
    pub fn unregister(&self, mid: &Mid) -> bool {
        let mut modules = self.modules.write();
        modules
            .get_mut(&mid.kind())
            .map(|slot| slot.remove(mid).is_some())
            .unwrap_or(false)
    }

    /// Selects the registered module of `kind` with the lowest current
    /// score, recomputing every candidate's score on the way. Ties are
    /// broken by iteration order. O(n), with n in the low tens at most.
    pub fn get(&self, kind: ModuleKind) -> CrawlResult<ModuleEntry> {
        let modules = self.modules.read();
        let slot = modules
            .get(&kind)
            .filter(|slot| !slot.is_empty())
            .ok_or(CrawlError::ModuleNotFound(kind))?;

        let mut best: Option<(u64, &ModuleEntry)> = None;
        for entry in slot.values() {
            let module = entry.as_module();
            let score = (module.score_calculator())(module.counts());
            module.set_score(score);
            if best.map(|(s, _)| score < s).unwrap_or(true) {
                best = Some((score, entry));
            }
        }
        // The slot was checked non-empty above.
        Ok(best.map(|(_, entry)| entry.clone()).unwrap())
    }

    /// Typed selection of the least-loaded downloader.
    pub fn downloader(&self) -> CrawlResult<Arc<dyn Downloader>> {
        match self.get(ModuleKind::Downloader)? {
            ModuleEntry::Downloader(d) => Ok(d),
            _ => unreachable!("downloader slot holds only downloaders"),
        }
    }

    /// Typed selection of the least-loaded analyzer.
    pub fn analyzer(&self) -> CrawlResult<Arc<dyn Analyzer>> {
        match self.get(ModuleKind::Analyzer)? {
            ModuleEntry::Analyzer(a) => Ok(a),
            _ => unreachable!("analyzer slot holds only analyzers"),
        }
    }

    /// Typed selection of the least-loaded pipeline.
    pub fn pipeline(&self) -> CrawlResult<Arc<dyn Pipeline>> {
        match self.get(ModuleKind::Pipeline)? {
            ModuleEntry::Pipeline(p) => Ok(p),
            _ => unreachable!("pipeline slot holds only pipelines"),
        }
    }

    pub fn get_all_by_kind(&self, kind: ModuleKind) -> HashMap<Mid, ModuleEntry> {
        self.modules
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_all(&self) -> HashMap<Mid, ModuleEntry> {
        let modules = self.modules.read();
        modules
            .values()
            .flat_map(|slot| slot.iter().map(|(mid, e)| (mid.clone(), e.clone())))
            .collect()
    }

    pub fn count_by_kind(&self, kind: ModuleKind) -> usize {
        self.modules
            .read()
            .get(&kind)
            .map(|slot| slot.len())
            .unwrap_or(0)
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.modules.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, Response};
    use crate::error::CrawlError;
    use crate::module::{calculate_score_simple, delegate_module, ModuleBase};
    use async_trait::async_trait;

    struct NullAnalyzer {
        base: ModuleBase,
    }

    impl NullAnalyzer {
        fn entry(serial: u64, calculator: crate::module::ScoreCalculator) -> ModuleEntry {
            ModuleEntry::Analyzer(Arc::new(NullAnalyzer {
                base: ModuleBase::new(Mid::new(ModuleKind::Analyzer, serial, None), calculator),
            }))
        }
    }

    delegate_module!(NullAnalyzer);

    #[async_trait]
    impl Analyzer for NullAnalyzer {
        async fn analyze(&self, _resp: Response) -> (Vec<Data>, Vec<CrawlError>) {
            (Vec::new(), Vec::new())
        }
    }

    #[test]
    fn register_and_select() {
        let registry = Registry::new();
        assert!(registry
            .register(NullAnalyzer::entry(1, calculate_score_simple))
            .unwrap());

        let picked = registry.get(ModuleKind::Analyzer).unwrap();
        assert_eq!(picked.as_module().id().serial(), 1);
    }

    #[test]
    fn duplicate_registration_is_reported_not_rejected() {
        let registry = Registry::new();
        assert!(registry
            .register(NullAnalyzer::entry(1, calculate_score_simple))
            .unwrap());
        assert!(!registry
            .register(NullAnalyzer::entry(1, calculate_score_simple))
            .unwrap());
        assert_eq!(registry.count_by_kind(ModuleKind::Analyzer), 1);
    }

    #[test]
    fn selection_prefers_the_lowest_score() {
        let registry = Registry::new();
        registry
            .register(NullAnalyzer::entry(1, |_| 50))
            .unwrap();
        registry
            .register(NullAnalyzer::entry(2, |_| 5))
            .unwrap();

        let picked = registry.get(ModuleKind::Analyzer).unwrap();
        assert_eq!(picked.as_module().id().serial(), 2);
        // Selection stored the recomputed scores.
        for entry in registry.get_all_by_kind(ModuleKind::Analyzer).values() {
            assert!(entry.as_module().score() > 0);
        }
    }

    #[test]
    fn unregister_removes_the_module() {
        let registry = Registry::new();
        registry
            .register(NullAnalyzer::entry(9, calculate_score_simple))
            .unwrap();
        let mid = Mid::new(ModuleKind::Analyzer, 9, None);
        assert!(registry.unregister(&mid));
        assert!(!registry.unregister(&mid));
        assert!(registry.get_all_by_kind(ModuleKind::Analyzer).is_empty());
    }

    #[test]
    fn missing_kind_yields_not_found() {
        let registry = Registry::new();
        match registry.get(ModuleKind::Downloader) {
            Err(CrawlError::ModuleNotFound(kind)) => assert_eq!(kind, ModuleKind::Downloader),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn clear_empties_every_slot() {
        let registry = Registry::new();
        registry
            .register(NullAnalyzer::entry(1, calculate_score_simple))
            .unwrap();
        registry.clear();
        assert!(registry.get_all().is_empty());
    }
}
