// vim: tw=80
//! A call-expectation verification engine for test doubles.
//!
//! Verimock holds the expectations a test declares on the members of a mock
//! object, matches every intercepted call against them, runs the configured
//! reactions, and reports anything that went differently than expected.
//! It does not generate mock types.  Instead, a mock is an ordinary struct
//! holding a [`Mock`] plus one [`Member`] descriptor per mocked method, and
//! the trait implementation forwards each call to [`Mock::call`].
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Call counts`](#call-counts)
//! * [`Reactions and side effects`](#reactions-and-side-effects)
//! * [`Sequences`](#sequences)
//! * [`Scopes`](#scopes)
//! * [`Reporting`](#reporting)
//! * [`Tracing`](#tracing)
//! * [`Deathwatch`](#deathwatch)
//! * [`Threads`](#threads)
//! * [`Crate features`](#crate-features)
//!
//! ## Getting Started
//! ```
//! use verimock::*;
//! use verimock::predicate::*;
//!
//! trait Dictionary {
//!     fn lookup(&self, key: u32) -> String;
//! }
//!
//! struct MockDictionary {
//!     mock: Mock,
//!     lookup: Member<(u32,), String>,
//! }
//!
//! impl Dictionary for MockDictionary {
//!     fn lookup(&self, key: u32) -> String {
//!         self.mock.call(&self.lookup, (key,))
//!     }
//! }
//!
//! let dict = MockDictionary {
//!     mock: Mock::new("dict"),
//!     lookup: Member::new("lookup", "String(u32)"),
//! };
//! let _e = dict.mock.expect(&dict.lookup)
//!     .args((eq(4),))
//!     .returning(|(key,)| format!("key{}", key))
//!     .register();
//! assert_eq!("key4", dict.lookup(4));
//! ```
//!
//! ## Matching arguments
//!
//! Every positional argument is checked by a [`Matcher`].  The built-in
//! matchers live in [`predicate`]: relational ones like [`predicate::eq`] or
//! [`predicate::lt`], [`predicate::any`] as the wildcard, [`predicate::not`]
//! and [`predicate::deref`] as combinators, [`predicate::custom`] for a
//! closure plus a description, and [`predicate::pred`] to adopt anything
//! implementing [`Predicate`].  Extra conditions on the whole argument tuple
//! are added with [`ExpectationBuilder::with`].
//!
//! ```
//! # use verimock::*;
//! # use verimock::predicate::*;
//! let mock = Mock::new("obj");
//! let put = Member::<(u32, String), ()>::new("put", "void(u32, String)");
//! let _e = mock.expect(&put)
//!     .args((lt(10), any()))
//!     .with("key is even", |(key, _)| key % 2 == 0)
//!     .register();
//! mock.call(&put, (4, "four".to_string()));
//! ```
//!
//! When several expectations match the same call, the most recently
//! declared one wins.  That makes it easy to allow a call in general and
//! then require something more specific in a narrower scope.
//!
//! ## Call counts
//!
//! By default [`Mock::expect`] requires exactly one call.  The requirement is
//! changed with [`ExpectationBuilder::times`], which accepts a count, any
//! kind of range, or the result of [`at_least`] and [`at_most`].
//! [`Mock::allow`] declares an expectation that may be called any number of
//! times, and [`Mock::forbid`] one that must never match.  An expectation
//! that reached its maximum is *saturated*: it no longer matches, and a
//! further call that only it would have matched is reported as such.
//!
//! ## Reactions and side effects
//!
//! A reaction decides what the call hands back to its caller.  Calls that
//! return anything other than `()` must have one, unless they are
//! forbidden.  Side effects run before the reaction, in declaration order,
//! and all of them may inspect or modify the argument tuple.
//!
//! ```
//! # use verimock::*;
//! # use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! let mock = Mock::new("counter");
//! let bump = Member::<(usize,), usize>::new("bump", "usize(usize)");
//! let seen = Arc::new(AtomicUsize::new(0));
//! let seen2 = seen.clone();
//! let _e = mock.allow(&bump)
//!     .side_effect(move |(n,)| { seen2.fetch_add(*n, Ordering::Relaxed); })
//!     .side_effect(|(n,)| *n *= 2)
//!     .returning(|(n,)| *n)
//!     .register();
//! assert_eq!(6, mock.call(&bump, (3,)));
//! assert_eq!(3, seen.load(Ordering::Relaxed));
//! ```
//!
//! [`ExpectationBuilder::throwing`] makes the call panic with a payload of
//! your choice once the engine is done with its own bookkeeping.
//!
//! ## Sequences
//!
//! A [`Sequence`] constrains the order in which expectations, possibly on
//! different mocks, are satisfied.  An expectation in a sequence may only
//! be called once every expectation declared before it in that sequence has
//! been called its minimum number of times.
//!
//! ```
//! # use verimock::*;
//! let seq = Sequence::new("startup");
//! let mock = Mock::new("engine");
//! let ignite = Member::<(), ()>::new("ignite", "void()");
//! let run = Member::<(), ()>::new("run", "void()");
//! let _e1 = mock.expect(&ignite).in_sequence(&[&seq]).register();
//! let _e2 = mock.expect(&run).in_sequence(&[&seq]).register();
//! mock.call(&ignite, ());
//! mock.call(&run, ());
//! assert!(seq.is_completed());
//! ```
//!
//! ## Scopes
//!
//! [`ExpectationBuilder::register`] returns an [`ExpectationGuard`].  The
//! expectation lives exactly as long as its guard: when the guard goes out
//! of scope the expectation is removed and, if it was called fewer times
//! than required, an "Unfulfilled expectation" is reported.  Beware that
//! `let _ = ...` drops the guard immediately.  [`ExpectationGuard::release`]
//! hands the expectation over to the mock object instead, and
//! [`Mock::checkpoint`] verifies and removes every current expectation.
//!
//! ## Reporting
//!
//! Every violation goes through a [`Reporter`].  The [`DefaultReporter`]
//! panics with the diagnostic.  Tests of test infrastructure usually prefer
//! a [`RecordingReporter`], either process-wide with [`set_reporter`] or per
//! object with [`Mock::with_reporter`].  Fatal violations are additionally
//! returned as a [`Violation`] from [`Mock::try_call`].
//!
//! ## Tracing
//!
//! A [`Tracer`] installed with [`set_tracer`] sees every dispatched call,
//! with its arguments and its outcome.  [`StreamTracer`] writes them to any
//! [`std::io::Write`], [`LogTracer`] forwards them to `tracing`.
//!
//! ## Deathwatch
//!
//! [`Deathwatched`] wraps an object whose destruction is itself part of the
//! test: destroying it while no destruction is expected, or failing to
//! destroy it while one is, are both reported.
//!
//! ## Threads
//!
//! Mocks may be called from any number of threads.  All bookkeeping is
//! serialized by one process-wide reentrant lock, so a side effect or
//! reaction may call other mocked members on the same thread.  Reporters run
//! with that lock held; a reporter that blocks stalls all mocking activity.
//! Closures that aren't `Send` may be supplied with the `_st` variants, like
//! [`ExpectationBuilder::returning_st`]; they panic if invoked from a
//! different thread.
//!
//! ## Crate features
//!
//! * **regex** (default) - enables [`predicate::re`].

use std::fmt::{self, Display};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

mod args;
mod deathwatch;
mod diagnostics;
mod error;
mod expectation;
mod expectations;
pub mod matcher;
mod mock;
mod reporter;
mod sequence;
mod times;
mod tracer;

pub use args::Args;
pub use deathwatch::{DeathwatchGuard, Deathwatched, DestructionBuilder};
pub use error::{DeclarationError, Violation, ViolationKind};
pub use expectation::{ExpectationBuilder, ExpectationGuard};
pub use matcher::{predicate, ArgMatchers, Matcher, Mismatch};
pub use mock::{Member, Mock};
pub use predicates::prelude::Predicate;
pub use reporter::{
    set_reporter,
    DefaultReporter,
    RecordingReporter,
    Report,
    Reporter,
    Severity
};
pub use sequence::Sequence;
pub use times::{at_least, at_most, Multiplicity};
pub use tracer::{set_tracer, LogTracer, StreamTracer, Tracer, TracerGuard};

/// A source location, as captured by `#[track_caller]`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl Location {
    /// The location of the caller of the current (`#[track_caller]`)
    /// function.
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Location {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

static ENGINE: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Serializes all expectation bookkeeping in the process.
///
/// Reentrant, because side effects and reactions run with the lock held and
/// may call other mocked members.
pub(crate) fn engine_lock() -> ReentrantMutexGuard<'static, ()> {
    ENGINE.lock()
}
