//! Shared state for concrete modules: the ID, the score, and the four
//! call counters.
//!
//! Every concrete module embeds a [`ModuleBase`] and follows the same
//! per-call discipline in its primary operation:
//!
//! 1. take a [`HandlingGuard`] on entry (increments `handling`; the drop
//!    decrements it on every exit path),
//! 2. increment `called`,
//! 3. validate inputs, bailing out before any further counter on failure,
//! 4. increment `accepted`,
//! 5. do the work,
//! 6. increment `completed` only when no error is reported.

use super::mid::Mid;
use super::{Counts, ModuleSummary, ScoreCalculator};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter and score state embedded in every concrete module.
#[derive(Debug)]
pub struct ModuleBase {
    mid: Mid,
    score: AtomicU64,
    calculator: ScoreCalculator,
    called: AtomicU64,
    accepted: AtomicU64,
    completed: AtomicU64,
    handling: AtomicU64,
}

impl ModuleBase {
    pub fn new(mid: Mid, calculator: ScoreCalculator) -> Self {
        Self {
            mid,
            score: AtomicU64::new(0),
            calculator,
            called: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            handling: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &Mid {
        &self.mid
    }

    /// The address string of the module's network location, empty for
    /// in-process modules.
    pub fn addr(&self) -> String {
        self.mid.addr().map(|a| a.to_string()).unwrap_or_default()
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::Acquire)
    }

    pub fn set_score(&self, score: u64) {
        self.score.store(score, Ordering::Release);
    }

    pub fn score_calculator(&self) -> ScoreCalculator {
        self.calculator
    }

    pub fn called_count(&self) -> u64 {
        self.called.load(Ordering::Acquire)
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Acquire)
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn handling_number(&self) -> u64 {
        self.handling.load(Ordering::Acquire)
    }

    /// Snapshots all four counters. Each field is read atomically on its
    /// own; tearing between fields is tolerated because the counters are
    /// monotone apart from `handling`.
    pub fn counts(&self) -> Counts {
        Counts {
            called: self.called.load(Ordering::Acquire),
            accepted: self.accepted.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            handling: self.handling.load(Ordering::Acquire),
        }
    }

    pub fn summary(&self) -> ModuleSummary {
        let counts = self.counts();
        ModuleSummary {
            id: self.mid.to_string(),
            called: counts.called,
            accepted: counts.accepted,
            completed: counts.completed,
            handling: counts.handling,
            extra: None,
        }
    }

    pub fn incr_called(&self) {
        self.called.fetch_add(1, Ordering::AcqRel);
    }

    pub fn incr_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
    }

    pub fn incr_completed(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks one in-flight call; the returned guard decrements `handling`
    /// when dropped.
    pub fn start_handling(&self) -> HandlingGuard<'_> {
        self.handling.fetch_add(1, Ordering::AcqRel);
        HandlingGuard { base: self }
    }

    /// Zeroes all counters. Refused while calls are in flight.
    pub fn clear(&self) -> bool {
        if self.handling.load(Ordering::Acquire) != 0 {
            return false;
        }
        self.called.store(0, Ordering::Release);
        self.accepted.store(0, Ordering::Release);
        self.completed.store(0, Ordering::Release);
        self.handling.store(0, Ordering::Release);
        true
    }
}

/// RAII marker for one in-flight module call.
#[derive(Debug)]
pub struct HandlingGuard<'a> {
    base: &'a ModuleBase,
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.base.handling.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Implements the [`Module`](super::Module) trait by delegating to a
/// `base: ModuleBase` field. The second form lets a module override the
/// summary, e.g. to attach kind-specific extras.
macro_rules! delegate_module {
    ($ty:ty) => {
        delegate_module!($ty, summary(self) {
            self.base.summary()
        });
    };
    ($ty:ty, summary($self_:ident) $body:block) => {
        impl $crate::module::Module for $ty {
            fn id(&self) -> &$crate::module::Mid {
                self.base.id()
            }
            fn addr(&self) -> String {
                self.base.addr()
            }
            fn score(&self) -> u64 {
                self.base.score()
            }
            fn set_score(&self, score: u64) {
                self.base.set_score(score)
            }
            fn score_calculator(&self) -> $crate::module::ScoreCalculator {
                self.base.score_calculator()
            }
            fn called_count(&self) -> u64 {
                self.base.called_count()
            }
            fn accepted_count(&self) -> u64 {
                self.base.accepted_count()
            }
            fn completed_count(&self) -> u64 {
                self.base.completed_count()
            }
            fn handling_number(&self) -> u64 {
                self.base.handling_number()
            }
            fn counts(&self) -> $crate::module::Counts {
                self.base.counts()
            }
            fn summary(&$self_) -> $crate::module::ModuleSummary $body
        }
    };
}

pub(crate) use delegate_module;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{calculate_score_simple, ModuleKind};

    fn base() -> ModuleBase {
        ModuleBase::new(
            Mid::new(ModuleKind::Downloader, 1, None),
            calculate_score_simple,
        )
    }

    #[test]
    fn counters_follow_the_call_discipline() {
        let base = base();
        {
            let _guard = base.start_handling();
            base.incr_called();
            assert_eq!(base.handling_number(), 1);
            base.incr_accepted();
            base.incr_completed();
        }
        let counts = base.counts();
        assert_eq!(counts.called, 1);
        assert_eq!(counts.accepted, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.handling, 0);
    }

    #[test]
    fn guard_decrements_on_early_exit() {
        let base = base();
        {
            let _guard = base.start_handling();
            base.incr_called();
            // Validation failure: no further counters.
        }
        assert_eq!(base.handling_number(), 0);
        assert_eq!(base.called_count(), 1);
        assert_eq!(base.accepted_count(), 0);
    }

    #[test]
    fn clear_refused_while_handling() {
        let base = base();
        let guard = base.start_handling();
        base.incr_called();
        assert!(!base.clear());
        drop(guard);
        assert!(base.clear());
        assert_eq!(base.called_count(), 0);
    }

    #[test]
    fn score_is_settable_and_readable() {
        let base = base();
        assert_eq!(base.score(), 0);
        base.set_score(42);
        assert_eq!(base.score(), 42);
    }
}
