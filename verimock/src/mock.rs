// vim: tw=80
use std::any::TypeId;
use std::collections::hash_map::HashMap;
use std::fmt::{self, Debug, Write};
use std::marker::PhantomData;
use std::panic;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    diagnostics::{self, Tried},
    engine_lock,
    expectation::{ErasedExpectation, Expectation, Outcome},
    expectations::{AnyExpectations, ExpectationSet, Unmatched},
    reporter::{Channel, Reporter, Severity},
    tracer,
    Args,
    ExpectationBuilder,
    Location,
    Multiplicity,
    Violation,
    ViolationKind
};

/// Describes one mocked member: its name and its signature, as shown in
/// diagnostics.
///
/// `A` is the tuple of the member's arguments and `R` its result.  Calls are
/// routed to the expectations declared for the same name, signature and
/// types, so overloads are just different `Member`s.
pub struct Member<A, R> {
    name: &'static str,
    signature: &'static str,
    _types: PhantomData<fn(A) -> R>,
}

impl<A, R> Member<A, R> {
    pub const fn new(name: &'static str, signature: &'static str) -> Self {
        Member { name, signature, _types: PhantomData }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signature(&self) -> &'static str {
        self.signature
    }
}

impl<A, R> Clone for Member<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Member<A, R> {}

impl<A, R> Debug for Member<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Non-generic keys to the expectation sets of a mock object
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct SetKey {
    name: &'static str,
    signature: &'static str,
    types: TypeId,
}

impl SetKey {
    fn new<A: 'static, R: 'static>(member: &Member<A, R>) -> Self {
        SetKey {
            name: member.name,
            signature: member.signature,
            types: TypeId::of::<(A, R)>()
        }
    }
}

/// The expectations of one mock object, for all of its members.
///
/// Destroying the mock object verifies every expectation left to it, in
/// declaration order.
///
/// # Examples
/// ```
/// # use verimock::*;
/// # use verimock::predicate::*;
/// let mock = Mock::new("calc");
/// let add = Member::<(i32, i32), i32>::new("add", "i32(i32, i32)");
/// mock.allow(&add)
///     .returning(|(a, b)| *a + *b)
///     .register()
///     .release();
/// assert_eq!(5, mock.call(&add, (2, 3)));
/// ```
pub struct Mock {
    name: String,
    channel: Channel,
    sets: Mutex<HashMap<SetKey, Box<dyn AnyExpectations>>>,
}

impl Mock {
    /// Create a mock object reporting to the process-wide reporter.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_channel(name.into(), Channel::default())
    }

    /// Create a mock object with its own reporter.
    pub fn with_reporter(name: impl Into<String>, reporter: Arc<dyn Reporter>)
        -> Self
    {
        Self::with_channel(name.into(), Channel::new(Some(reporter)))
    }

    fn with_channel(name: String, channel: Channel) -> Self {
        Mock { name, channel, sets: Mutex::new(HashMap::new()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn set<A, R>(&self, member: &Member<A, R>) -> Arc<ExpectationSet<A, R>>
        where A: Args, R: 'static
    {
        let key = SetKey::new(member);
        let mut sets = self.sets.lock();
        if let Some(set) = sets.get(&key)
            .and_then(|s| s.downcast_ref::<Arc<ExpectationSet<A, R>>>().ok())
        {
            return set.clone();
        }
        let set = Arc::new(ExpectationSet::new());
        sets.insert(key, Box::new(set.clone()));
        set
    }

    #[track_caller]
    fn builder<A, R>(&self, member: &Member<A, R>, times: Option<Multiplicity>)
        -> ExpectationBuilder<A, R>
        where A: Args, R: 'static
    {
        ExpectationBuilder::new(self.set(member), &self.name, member.name,
            self.channel.clone(), Location::caller(), times)
    }

    /// Declare a required call, by default exactly once.
    #[track_caller]
    pub fn expect<A, R>(&self, member: &Member<A, R>)
        -> ExpectationBuilder<A, R>
        where A: Args, R: 'static
    {
        self.builder(member, None)
    }

    /// Declare a call that may happen any number of times.
    #[track_caller]
    pub fn allow<A, R>(&self, member: &Member<A, R>)
        -> ExpectationBuilder<A, R>
        where A: Args, R: 'static
    {
        self.builder(member, Some(Multiplicity::any()))
    }

    /// Declare a call that must never happen.
    ///
    /// ```should_panic(expected = "Match of forbidden call of obj.f(== 0)")
    /// # use verimock::*;
    /// # use verimock::predicate::*;
    /// let mock = Mock::new("obj");
    /// let f = Member::<(u32,), ()>::new("f", "void(u32)");
    /// let _e1 = mock.allow(&f).register();
    /// let _e2 = mock.forbid(&f).args((eq(0),)).register();
    /// mock.call(&f, (1,));
    /// mock.call(&f, (0,));    // panics!
    /// ```
    #[track_caller]
    pub fn forbid<A, R>(&self, member: &Member<A, R>)
        -> ExpectationBuilder<A, R>
        where A: Args, R: 'static
    {
        self.builder(member, Some(Multiplicity::never()))
    }

    fn violation(&self, kind: ViolationKind, location: Location, msg: String)
        -> Violation
    {
        self.channel.send(Severity::Fatal, location, &msg);
        Violation::new(kind, location, msg)
    }

    fn no_match<A, R>(
        &self,
        member: &Member<A, R>,
        unmatched: Unmatched<A, R>,
        params: &str,
        location: Location
    ) -> Violation
        where A: Args, R: 'static
    {
        let qualified = format!("{}.{}", self.name, member.name);
        match unmatched {
            Unmatched::Saturated(matches) => {
                let listed = matches.iter()
                    .map(|e| (e.text().to_owned(), e.location()))
                    .collect::<Vec<_>>();
                let msg = diagnostics::saturated(&qualified, member.signature,
                                                 params, &listed);
                self.violation(ViolationKind::Saturated, location, msg)
            }
            Unmatched::NoMatch(candidates) => {
                let tried = candidates.into_iter()
                    .map(|(e, rejection)| {
                        e.mark_reported();
                        Tried {
                            text: e.text().to_owned(),
                            location: e.location(),
                            rejection
                        }
                    }).collect::<Vec<_>>();
                let msg = diagnostics::no_match(&qualified, member.signature,
                                                params, &tried);
                self.violation(ViolationKind::NoMatch, location, msg)
            }
        }
    }

    fn dispatch<A, R>(
        &self,
        set: &ExpectationSet<A, R>,
        e: &Expectation<A, R>,
        args: &mut A,
        params: &str,
        location: Location
    ) -> Result<Outcome<R>, Violation>
        where A: Args, R: Debug + 'static
    {
        if e.times().is_forbidden() {
            e.mark_reported();
            let msg = diagnostics::forbidden(e.text(), e.location(), params);
            return Err(self.violation(ViolationKind::Forbidden, location, msg));
        }
        let blockers = e.blockers();
        if !blockers.is_empty() {
            e.mark_reported();
            let mut message = String::new();
            for b in blockers {
                let msg = diagnostics::sequence_mismatch(&b.sequence, e.text(),
                    e.location(), &b.text);
                self.channel.send(Severity::Fatal, location, &msg);
                message.push_str(&msg);
            }
            return Err(Violation::new(ViolationKind::Sequence, location,
                                      message));
        }
        e.run_side_effects(args);
        if e.count_call() {
            set.saturate(e.id());
        }
        let outcome = e.react(args);
        if let Some(tracer) = tracer::active() {
            let mut call = diagnostics::traced_call(e.text(), params);
            match &outcome {
                Outcome::Returned(r) => {
                    let _ = writeln!(call, " -> {:?}", r);
                }
                Outcome::Thrown(payload) => {
                    call.push_str(&diagnostics::thrown(payload.as_ref()))
                }
            }
            tracer.trace(e.location().file, e.location().line, &call);
        }
        Ok(outcome)
    }

    /// Dispatch one call of `member` with `args`.
    ///
    /// Fatal violations are sent to the reporter and then returned.  If the
    /// matched expectation throws, the payload is raised once the engine
    /// is done with the call.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use verimock::*;
    /// let mock = Mock::with_reporter("obj",
    ///                                Arc::new(RecordingReporter::new()));
    /// let f = Member::<(u32,), ()>::new("f", "void(u32)");
    /// let v = mock.try_call(&f, (5,)).unwrap_err();
    /// assert_eq!(ViolationKind::NoMatch, v.kind());
    /// assert_eq!("No match for call of obj.f with signature void(u32) \
    ///             with.\n  param  _1 == 5\n", v.message());
    /// ```
    #[track_caller]
    pub fn try_call<A, R>(&self, member: &Member<A, R>, mut args: A)
        -> Result<R, Violation>
        where A: Args, R: Debug + 'static
    {
        let location = Location::caller();
        let outcome = {
            let _guard = engine_lock();
            let params = diagnostics::actual_params(&args.render());
            let set = self.set(member);
            let e = match set.select(&args) {
                Ok(e) => e,
                Err(unmatched) => {
                    return Err(self.no_match(member, unmatched, &params,
                                             location));
                }
            };
            tracing::debug!(%location, "dispatching call of {}", e.text());
            self.dispatch(&set, &e, &mut args, &params, location)?
        };
        match outcome {
            Outcome::Returned(r) => Ok(r),
            Outcome::Thrown(payload) => panic::resume_unwind(payload)
        }
    }

    /// Like [`try_call`](Self::try_call), but panics on a fatal violation.
    ///
    /// This is what a mocked member's body usually consists of.
    #[track_caller]
    pub fn call<A, R>(&self, member: &Member<A, R>, args: A) -> R
        where A: Args, R: Debug + 'static
    {
        match self.try_call(member, args) {
            Ok(r) => r,
            Err(v) => panic!("{}", v)
        }
    }

    fn drain(&self) -> Vec<Arc<dyn ErasedExpectation>> {
        let sets = std::mem::take(&mut *self.sets.lock());
        let mut all = sets.values()
            .flat_map(|set| set.drain())
            .collect::<Vec<_>>();
        all.sort_by_key(|e| e.id());
        all
    }

    /// Verify every expectation of this mock object, then remove them all.
    ///
    /// Expectations whose guards are still alive are removed too; dropping
    /// those guards later has no further effect.
    pub fn checkpoint(&self) {
        self.conclude(diagnostics::UNFULFILLED);
    }

    /// End every expectation still held, sending a single report for all of
    /// those left unfulfilled, in declaration order.
    fn conclude(&self, header: &str) {
        let _guard = engine_lock();
        let mut pending = self.drain().into_iter()
            .filter_map(|e| e.conclude(header));
        if let Some((location, mut msg)) = pending.next() {
            for (_, next) in pending {
                msg.push_str(&next);
            }
            self.channel.send(Severity::Nonfatal, location, &msg);
        }
    }
}

impl Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Mock").field("name", &self.name).finish()
    }
}

impl Drop for Mock {
    fn drop(&mut self) {
        self.conclude(diagnostics::DESTROYED_MOCK);
    }
}
