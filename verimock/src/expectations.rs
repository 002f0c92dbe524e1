// vim: tw=80
use std::collections::BTreeMap;
use std::sync::Arc;

use downcast::{downcast, Any};
use parking_lot::Mutex;

use crate::{
    diagnostics::Rejection,
    expectation::{ErasedExpectation, Expectation, ExpectationId},
    Args
};

/// The expectation set of one member, type-erased so that a mock object can
/// store the sets of all its members together.
pub(crate) trait AnyExpectations: Any + Send + Sync {
    /// Remove every expectation, active or saturated.
    fn drain(&self) -> Vec<Arc<dyn ErasedExpectation>>;
}
downcast!(dyn AnyExpectations);

/// Why no expectation of a set could take a call.
pub(crate) enum Unmatched<A, R> {
    /// Nothing active matched, but these saturated expectations did.
    Saturated(Vec<Arc<Expectation<A, R>>>),
    /// Nothing matched.  Every active expectation, with its reason.
    NoMatch(Vec<(Arc<Expectation<A, R>>, Rejection)>),
}

type Partition<A, R> = BTreeMap<ExpectationId, Arc<Expectation<A, R>>>;

struct Partitions<A, R> {
    active: Partition<A, R>,
    saturated: Partition<A, R>,
}

/// All expectations of one member of one mock object.
///
/// Both partitions are ordered by declaration, and scanned newest first.
pub(crate) struct ExpectationSet<A, R> {
    partitions: Mutex<Partitions<A, R>>,
}

impl<A: Args, R: 'static> ExpectationSet<A, R> {
    pub fn new() -> Self {
        ExpectationSet {
            partitions: Mutex::new(Partitions {
                active: BTreeMap::new(),
                saturated: BTreeMap::new()
            })
        }
    }

    pub fn insert(&self, expectation: Arc<Expectation<A, R>>) {
        self.partitions.lock().active.insert(expectation.id(), expectation);
    }

    pub fn remove(&self, id: ExpectationId) {
        let mut p = self.partitions.lock();
        if p.active.remove(&id).is_none() {
            p.saturated.remove(&id);
        }
    }

    /// Move an expectation that reached its maximum out of the active
    /// partition.
    pub fn saturate(&self, id: ExpectationId) {
        let mut p = self.partitions.lock();
        if let Some(e) = p.active.remove(&id) {
            p.saturated.insert(id, e);
        }
    }

    /// Pick the expectation that a call with `args` satisfies.
    ///
    /// The newest matching expectation that may be called without breaking
    /// its sequences wins.  If every match would break a sequence, the newest
    /// match is returned anyway, for the caller to report.
    pub fn select(&self, args: &A)
        -> Result<Arc<Expectation<A, R>>, Unmatched<A, R>>
    {
        let p = self.partitions.lock();
        let mut fallback = None;
        for e in p.active.values().rev() {
            if e.matches(args) {
                if e.is_sequence_eligible() {
                    return Ok(e.clone());
                }
                fallback.get_or_insert_with(|| e.clone());
            }
        }
        if let Some(e) = fallback {
            return Ok(e);
        }
        let saturated = p.saturated.values().rev()
            .filter(|e| e.matches(args))
            .cloned()
            .collect::<Vec<_>>();
        if !saturated.is_empty() {
            return Err(Unmatched::Saturated(saturated));
        }
        Err(Unmatched::NoMatch(p.active.values().rev()
            .map(|e| (e.clone(), e.rejection(args)))
            .collect()))
    }

    #[cfg(test)]
    fn len(&self) -> (usize, usize) {
        let p = self.partitions.lock();
        (p.active.len(), p.saturated.len())
    }
}

impl<A: Args, R: 'static> AnyExpectations for Arc<ExpectationSet<A, R>> {
    fn drain(&self) -> Vec<Arc<dyn ErasedExpectation>> {
        let mut p = self.partitions.lock();
        let active = std::mem::take(&mut p.active);
        let saturated = std::mem::take(&mut p.saturated);
        active.into_values()
            .chain(saturated.into_values())
            .map(|e| e as Arc<dyn ErasedExpectation>)
            .collect()
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{
        predicate::*,
        reporter::Channel,
        ExpectationBuilder,
        Location,
        RecordingReporter
    };

    fn set() -> Arc<ExpectationSet<(u32,), ()>> {
        Arc::new(ExpectationSet::new())
    }

    fn builder(set: &Arc<ExpectationSet<(u32,), ()>>)
        -> ExpectationBuilder<(u32,), ()>
    {
        let channel = Channel::new(Some(Arc::new(RecordingReporter::new())));
        ExpectationBuilder::new(set.clone(), "obj", "f", channel,
                                Location::caller(), None)
    }

    type Selected = Result<Arc<Expectation<(u32,), ()>>,
                           Unmatched<(u32,), ()>>;

    fn found(s: Selected) -> Arc<Expectation<(u32,), ()>> {
        match s {
            Ok(e) => e,
            Err(_) => panic!("no expectation selected")
        }
    }

    #[test]
    fn newest_first() {
        let s = set();
        let _e1 = builder(&s).times(..).register();
        let _e2 = builder(&s).args((eq(5),)).register();
        assert_eq!("obj.f(== 5)", found(s.select(&(5,))).text());
        assert_eq!("obj.f(matching _)", found(s.select(&(6,))).text());
    }

    #[test]
    fn saturate() {
        let s = set();
        let e = builder(&s).register();
        assert_eq!((1, 0), s.len());
        let selected = found(s.select(&(1,)));
        assert!(selected.count_call());
        s.saturate(selected.id());
        assert_eq!((0, 1), s.len());
        assert!(matches!(s.select(&(1,)),
                         Err(Unmatched::Saturated(v)) if v.len() == 1));
        drop(e);
        assert_eq!((0, 0), s.len());
    }

    /// A saturated match never hides an active one declared before it
    #[test]
    fn active_beats_saturated() {
        let s = set();
        let e1 = builder(&s).args((eq(1),)).times(..).register();
        let e2 = builder(&s).register();
        let selected = found(s.select(&(1,)));
        assert_eq!("obj.f(matching _)", selected.text());
        assert!(selected.count_call());
        s.saturate(selected.id());
        assert!(e2.is_saturated());
        assert_eq!((1, 1), s.len());
        assert_eq!("obj.f(== 1)", found(s.select(&(1,))).text());
        drop(e1);
    }

    #[test]
    fn no_match_lists_every_active() {
        let s = set();
        let _e1 = builder(&s).args((eq(1),)).register();
        let _e2 = builder(&s).args((eq(2),)).register();
        match s.select(&(3,)) {
            Err(Unmatched::NoMatch(tried)) => {
                assert_eq!(2, tried.len());
                assert_eq!("obj.f(== 2)", tried[0].0.text());
                assert!(matches!(tried[1].1, Rejection::Args(_)));
            }
            _ => panic!("expected no match")
        }
    }

    #[test]
    fn drain() {
        let s = set();
        let e1 = builder(&s).times(..).register();
        let e2 = builder(&s).times(..).register();
        let drained = s.drain();
        assert_eq!(2, drained.len());
        assert!(drained[0].id() < drained[1].id());
        assert_eq!((0, 0), s.len());
        e1.release();
        e2.release();
    }
}
