// vim: tw=80
use std::any::{self, Any, TypeId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use fragile::Fragile;
use parking_lot::Mutex;

use crate::{
    diagnostics::{self, Rejection},
    engine_lock,
    expectations::ExpectationSet,
    matcher::AnyArgs,
    reporter::{Channel, Severity},
    sequence::{Blocker, Memberships, SeqInner},
    times::Times,
    ArgMatchers,
    Args,
    DeclarationError,
    Location,
    Multiplicity,
    Sequence
};

/// Identifies one expectation.  Ids grow in declaration order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct ExpectationId(u64);

impl ExpectationId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ExpectationId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

type Condition<A> = (String, Box<dyn Fn(&A) -> bool + Send>);

/// Everything that decides whether a call matches.
struct Matching<A> {
    args: Box<dyn ArgMatchers<A>>,
    conditions: Vec<Condition<A>>,
}

impl<A: 'static> Matching<A> {
    fn matches(&self, args: &A) -> bool {
        self.args.matches(args) && self.conditions.iter().all(|(_, f)| f(args))
    }

    fn rejection(&self, args: &A) -> Rejection {
        let mismatches = self.args.mismatches(args);
        if mismatches.is_empty() {
            Rejection::Conditions(self.conditions.iter()
                .filter(|(_, f)| !f(args))
                .map(|(text, _)| text.clone())
                .collect())
        } else {
            Rejection::Args(mismatches)
        }
    }
}

enum SideEffect<A> {
    Send(Box<dyn FnMut(&mut A) + Send>),
    St(Fragile<Box<dyn FnMut(&mut A)>>),
}

impl<A> SideEffect<A> {
    fn run(&mut self, args: &mut A) {
        match self {
            SideEffect::Send(f) => f(args),
            SideEffect::St(f) => (f.get_mut())(args),
        }
    }
}

enum Reaction<A, R> {
    /// Returns `()`.  Only used when `R` is `()`.
    Default,
    Mut(Box<dyn FnMut(&mut A) -> R + Send>),
    MutSt(Fragile<Box<dyn FnMut(&mut A) -> R>>),
    /// `None` once the closure has returned
    Once(Option<Box<dyn FnOnce(&mut A) -> R + Send>>),
    Throw(Box<dyn FnMut(&mut A) -> Box<dyn Any + Send> + Send>),
}

/// What a dispatched call hands back to its caller.
pub(crate) enum Outcome<R> {
    Returned(R),
    Thrown(Box<dyn Any + Send>),
}

impl<A, R: 'static> Reaction<A, R> {
    fn invoke(&mut self, args: &mut A, text: &str) -> Outcome<R> {
        match self {
            Reaction::Default => Outcome::Returned(unit()),
            Reaction::Mut(f) => Outcome::Returned(f(args)),
            Reaction::MutSt(f) => Outcome::Returned((f.get_mut())(args)),
            Reaction::Once(f) => match f.take() {
                Some(f) => Outcome::Returned(f(args)),
                None => panic!("Called {} twice, but it was expected only once",
                               text)
            },
            Reaction::Throw(f) => Outcome::Thrown(f(args)),
        }
    }
}

/// Produce the value of a call without a reaction, which only registers if
/// its result type is `()`.
fn unit<R: 'static>() -> R {
    let unit: Box<dyn Any> = Box::new(());
    match unit.downcast::<R>() {
        Ok(r) => *r,
        Err(_) => unreachable!("a reaction is required for non-unit results")
    }
}

/// The type-erased side of an expectation, used by guards and by the mock
/// object at checkpoints and at its destruction.
pub(crate) trait ErasedExpectation: Send + Sync {
    fn id(&self) -> ExpectationId;

    fn times(&self) -> &Times;

    /// Remove the expectation from its expectation set, if still there.
    fn unlink(&self);

    /// End the expectation's life: leave every sequence, and confirm it if
    /// it was satisfied.  Returns the location and text of the report owed
    /// if it wasn't, for the caller to send.  Only the first call has any
    /// effect.
    fn conclude(&self, header: &str) -> Option<(Location, String)>;

    /// Like [`conclude`](Self::conclude), but send the report right away.
    fn finish(&self, header: &str);
}

/// One declared expectation on one member of one mock object.
pub(crate) struct Expectation<A, R> {
    id: ExpectationId,
    text: String,
    location: Location,
    /// The matchers, one line each, as shown in end-of-life reports
    expected_params: String,
    times: Arc<Times>,
    matching: Mutex<Matching<A>>,
    /// Each one locked while it runs
    side_effects: Vec<Mutex<SideEffect<A>>>,
    reaction: Mutex<Reaction<A, R>>,
    memberships: Memberships,
    channel: Channel,
    /// Set once a fatal violation named this expectation
    reported: AtomicBool,
    finished: AtomicBool,
    set: Weak<ExpectationSet<A, R>>,
}

impl<A: Args, R: 'static> Expectation<A, R> {
    pub fn id(&self) -> ExpectationId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn times(&self) -> &Times {
        &self.times
    }

    pub fn matches(&self, args: &A) -> bool {
        self.matching.lock().matches(args)
    }

    pub fn rejection(&self, args: &A) -> Rejection {
        self.matching.lock().rejection(args)
    }

    /// May this expectation be called now without breaking the order of its
    /// sequences?
    pub fn is_sequence_eligible(&self) -> bool {
        self.times.is_satisfied() ||
            self.memberships.is_empty() ||
            self.memberships.is_first(self.id)
    }

    /// Every sequence entry that must be satisfied before this one.
    pub fn blockers(&self) -> Vec<Blocker> {
        if self.times.is_satisfied() {
            Vec::new()
        } else {
            self.memberships.blockers(self.id)
        }
    }

    pub fn mark_reported(&self) {
        self.reported.store(true, Ordering::Relaxed);
    }

    /// Run every side effect in declaration order.
    ///
    /// Only a recursive call can find one of them locked, since the engine
    /// lock serializes calls from different threads.
    pub fn run_side_effects(&self, args: &mut A) {
        for effect in self.side_effects.iter() {
            match effect.try_lock() {
                Some(mut effect) => effect.run(args),
                None => panic!("Called {} again while its side effect was \
                                still running", self.text)
            }
        }
    }

    /// Count one call.  Returns whether the expectation just became
    /// saturated.
    pub fn count_call(&self) -> bool {
        let count = self.times.call();
        if count == self.times.min() {
            self.memberships.retire(self.id);
        }
        self.times.is_bounded() && count == self.times.max()
    }

    pub fn react(&self, args: &mut A) -> Outcome<R> {
        match self.reaction.try_lock() {
            Some(mut reaction) => reaction.invoke(args, &self.text),
            None => panic!("Called {} again while its reaction was still \
                            running", self.text)
        }
    }
}

impl<A: Args, R: 'static> ErasedExpectation for Expectation<A, R> {
    fn id(&self) -> ExpectationId {
        self.id
    }

    fn times(&self) -> &Times {
        &self.times
    }

    fn unlink(&self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }

    fn conclude(&self, header: &str) -> Option<(Location, String)> {
        if self.finished.swap(true, Ordering::Relaxed) {
            return None;
        }
        self.memberships.retire(self.id);
        if self.reported.load(Ordering::Relaxed) {
            return None;
        }
        if !self.times.is_satisfied() {
            self.reported.store(true, Ordering::Relaxed);
            let msg = diagnostics::unfulfilled(header, &self.text,
                self.times.min(), self.times.count(), &self.expected_params);
            return Some((self.location, msg));
        }
        if self.times.is_bounded() {
            self.channel.send_ok(&self.text);
        }
        None
    }

    fn finish(&self, header: &str) {
        if let Some((location, msg)) = self.conclude(header) {
            self.channel.send(Severity::Nonfatal, location, &msg);
        }
    }
}

/// Declares one expectation.
///
/// Created by [`Mock::expect`](crate::Mock::expect),
/// [`Mock::allow`](crate::Mock::allow) and
/// [`Mock::forbid`](crate::Mock::forbid).  Every modifier may be used at most
/// once.  Nothing takes effect until [`register`](Self::register).
#[must_use = "the expectation is only declared by register()"]
pub struct ExpectationBuilder<A, R> {
    set: Arc<ExpectationSet<A, R>>,
    mock: String,
    member: &'static str,
    channel: Channel,
    location: Location,
    matchers: Option<Box<dyn ArgMatchers<A>>>,
    conditions: Vec<Condition<A>>,
    times: Multiplicity,
    times_set: bool,
    sequences: Option<Vec<Weak<SeqInner>>>,
    side_effects: Vec<SideEffect<A>>,
    reaction: Option<Reaction<A, R>>,
    return_once: bool,
    /// The first illegal modifier, reported at registration
    error: Option<DeclarationError>,
}

impl<A: Args, R: 'static> ExpectationBuilder<A, R> {
    pub(crate) fn new(
        set: Arc<ExpectationSet<A, R>>,
        mock: &str,
        member: &'static str,
        channel: Channel,
        location: Location,
        times: Option<Multiplicity>
    ) -> Self
    {
        ExpectationBuilder {
            set,
            mock: mock.to_owned(),
            member,
            channel,
            location,
            matchers: None,
            conditions: Vec::new(),
            times: times.unwrap_or_else(Multiplicity::once),
            times_set: times.is_some(),
            sequences: None,
            side_effects: Vec::new(),
            reaction: None,
            return_once: false,
            error: None
        }
    }

    fn fail(&mut self, error: DeclarationError) {
        self.error.get_or_insert(error);
    }

    fn set_reaction(mut self, reaction: Reaction<A, R>) -> Self {
        if self.reaction.is_some() {
            self.fail(DeclarationError::DuplicateReaction);
        } else {
            self.reaction = Some(reaction);
        }
        self
    }

    /// Match the arguments positionally, one [`Matcher`](crate::Matcher)
    /// each.  Without it, every argument matches anything.
    pub fn args<M: ArgMatchers<A>>(mut self, matchers: M) -> Self {
        if self.matchers.is_some() {
            self.fail(DeclarationError::DuplicateArgs);
        } else {
            self.matchers = Some(Box::new(matchers));
        }
        self
    }

    /// Add a condition on the whole argument tuple.  `text` names the
    /// condition in diagnostics.  All conditions must hold for a call to
    /// match.
    pub fn with<F>(mut self, text: impl Into<String>, f: F) -> Self
        where F: Fn(&A) -> bool + Send + 'static
    {
        self.conditions.push((text.into(), Box::new(f)));
        self
    }

    /// Set the allowed number of calls.
    ///
    /// ```
    /// # use verimock::*;
    /// let mock = Mock::new("obj");
    /// let f = Member::<(), ()>::new("f", "void()");
    /// let _e = mock.expect(&f).times(2..=3).register();
    /// mock.call(&f, ());
    /// mock.call(&f, ());
    /// ```
    pub fn times(mut self, times: impl Into<Multiplicity>) -> Self {
        if self.times_set {
            self.fail(DeclarationError::DuplicateTimes);
        } else {
            self.times = times.into();
            self.times_set = true;
        }
        self
    }

    /// Take the last place in line of every one of `sequences`.
    pub fn in_sequence(mut self, sequences: &[&Sequence]) -> Self {
        if self.sequences.is_some() {
            self.fail(DeclarationError::DuplicateSequence);
        } else {
            self.sequences = Some(sequences.iter()
                .map(|s| s.downgrade())
                .collect());
        }
        self
    }

    /// Run `f` on every matching call, before the reaction.  Side effects
    /// run in declaration order and may modify the arguments.
    pub fn side_effect<F>(mut self, f: F) -> Self
        where F: FnMut(&mut A) + Send + 'static
    {
        self.side_effects.push(SideEffect::Send(Box::new(f)));
        self
    }

    /// Single-threaded version of [`side_effect`](Self::side_effect), for
    /// closures that aren't `Send`.  Panics if the call happens on a
    /// different thread than the declaration.
    pub fn side_effect_st<F>(mut self, f: F) -> Self
        where F: FnMut(&mut A) + 'static
    {
        let f: Box<dyn FnMut(&mut A)> = Box::new(f);
        self.side_effects.push(SideEffect::St(Fragile::new(f)));
        self
    }

    /// Compute the result of every matching call with `f`.
    pub fn returning<F>(self, f: F) -> Self
        where F: FnMut(&mut A) -> R + Send + 'static
    {
        self.set_reaction(Reaction::Mut(Box::new(f)))
    }

    /// Single-threaded version of [`returning`](Self::returning).  Panics if
    /// the call happens on a different thread than the declaration.
    pub fn returning_st<F>(self, f: F) -> Self
        where F: FnMut(&mut A) -> R + 'static
    {
        let f: Box<dyn FnMut(&mut A) -> R> = Box::new(f);
        self.set_reaction(Reaction::MutSt(Fragile::new(f)))
    }

    /// Return a clone of `value` from every matching call.
    pub fn return_const(self, value: R) -> Self
        where R: Clone + Send
    {
        self.set_reaction(Reaction::Mut(Box::new(move |_| value.clone())))
    }

    /// Compute the result of the one matching call with `f`.  Only legal
    /// for expectations allowing at most one call.
    ///
    /// ```
    /// # use verimock::*;
    /// let mock = Mock::new("obj");
    /// let take = Member::<(), Vec<u8>>::new("take", "Vec<u8>()");
    /// let buf = vec![1, 2, 3];
    /// let _e = mock.expect(&take).return_once(move |_| buf).register();
    /// assert_eq!(vec![1, 2, 3], mock.call(&take, ()));
    /// ```
    pub fn return_once<F>(mut self, f: F) -> Self
        where F: FnOnce(&mut A) -> R + Send + 'static
    {
        self.return_once = true;
        self.set_reaction(Reaction::Once(Some(Box::new(f))))
    }

    /// Make every matching call panic with the payload produced by `f`.
    ///
    /// The payload is raised with [`std::panic::resume_unwind`] after the
    /// call has been counted, so it reaches the caller unchanged.
    pub fn throwing<F, P>(self, mut f: F) -> Self
        where F: FnMut(&mut A) -> P + Send + 'static, P: Any + Send
    {
        self.set_reaction(Reaction::Throw(Box::new(move |args| {
            let payload: Box<dyn Any + Send> = Box::new(f(args));
            payload
        })))
    }

    /// Make every matching call panic with `msg`.
    ///
    /// ```should_panic(expected = "disk on fire")
    /// # use verimock::*;
    /// let mock = Mock::new("obj");
    /// let sync = Member::<(), ()>::new("sync", "void()");
    /// let _e = mock.expect(&sync).panicking("disk on fire").register();
    /// mock.call(&sync, ());
    /// ```
    pub fn panicking(self, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        self.throwing(move |_| msg.clone())
    }

    fn validate(&self) -> Result<(), DeclarationError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        let Multiplicity { min, max } = self.times;
        if min > max {
            return Err(DeclarationError::InvertedTimes { min, max });
        }
        if max == 0 {
            if self.reaction.is_some() {
                return Err(DeclarationError::ForbiddenWithReaction);
            }
            if !self.side_effects.is_empty() {
                return Err(DeclarationError::ForbiddenWithSideEffect);
            }
            if self.sequences.as_ref().map_or(false, |s| !s.is_empty()) {
                return Err(DeclarationError::ForbiddenWithSequence);
            }
        } else if self.reaction.is_none() &&
            TypeId::of::<R>() != TypeId::of::<()>()
        {
            return Err(DeclarationError::MissingReaction {
                return_type: any::type_name::<R>()
            });
        }
        if self.return_once && max > 1 {
            return Err(DeclarationError::ReturnOnceRepeatable { max });
        }
        Ok(())
    }

    /// Check the declaration and make the expectation live.
    ///
    /// The expectation lives until the returned guard is dropped, or until
    /// the mock object is destroyed if the guard is
    /// [released](ExpectationGuard::release).
    pub fn try_register(self) -> Result<ExpectationGuard, DeclarationError> {
        let _guard = engine_lock();
        self.validate()?;
        let matchers = self.matchers
            .unwrap_or_else(|| Box::new(AnyArgs));
        let described = matchers.describe();
        let text = format!("{}.{}({})", self.mock, self.member,
                           described.join(", "));
        let id = ExpectationId::next();
        let times = Arc::new(Times::new(self.times));
        let memberships = Memberships::new(self.sequences.unwrap_or_default());
        memberships.add_last(id, &text, self.location, &times);
        tracing::debug!(location = %self.location, "declared {} with {:?}",
                        text, self.times);
        let expectation = Arc::new(Expectation {
            id,
            text,
            location: self.location,
            expected_params: diagnostics::expected_params(&described),
            times,
            matching: Mutex::new(Matching {
                args: matchers,
                conditions: self.conditions
            }),
            side_effects: self.side_effects.into_iter()
                .map(Mutex::new)
                .collect(),
            reaction: Mutex::new(self.reaction.unwrap_or(Reaction::Default)),
            memberships,
            channel: self.channel,
            reported: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            set: Arc::downgrade(&self.set)
        });
        self.set.insert(expectation.clone());
        Ok(ExpectationGuard { expectation: Some(expectation) })
    }

    /// Like [`try_register`](Self::try_register), but panics if the
    /// declaration is illegal.
    ///
    /// ```should_panic(expected = "Missing reaction")
    /// # use verimock::*;
    /// let mock = Mock::new("obj");
    /// let len = Member::<(), usize>::new("len", "usize()");
    /// let _e = mock.expect(&len).register();
    /// ```
    #[track_caller]
    pub fn register(self) -> ExpectationGuard {
        let location = self.location;
        match self.try_register() {
            Ok(guard) => guard,
            Err(e) => panic!("{}: {}", location, e)
        }
    }
}

/// Keeps an expectation alive.
///
/// Dropping the guard removes the expectation from its mock object and
/// reports it if it was called fewer times than required.
#[must_use = "the expectation is removed as soon as the guard is dropped"]
pub struct ExpectationGuard {
    expectation: Option<Arc<dyn ErasedExpectation>>,
}

impl ExpectationGuard {
    fn times(&self) -> Option<&Times> {
        self.expectation.as_ref().map(|e| e.times())
    }

    pub fn call_count(&self) -> usize {
        self.times().map_or(0, Times::count)
    }

    /// Has the expectation been called at least its minimum number of times?
    pub fn is_satisfied(&self) -> bool {
        self.times().map_or(false, Times::is_satisfied)
    }

    /// Has the expectation been called its maximum number of times?
    pub fn is_saturated(&self) -> bool {
        self.times().map_or(false, Times::is_saturated)
    }

    /// Leave the expectation to the mock object.  It will be verified when
    /// the mock object is destroyed or checkpointed.
    pub fn release(mut self) {
        self.expectation.take();
    }
}

impl Drop for ExpectationGuard {
    fn drop(&mut self) {
        if let Some(expectation) = self.expectation.take() {
            let _guard = engine_lock();
            expectation.unlink();
            expectation.finish(diagnostics::UNFULFILLED);
        }
    }
}
