// vim: tw=80
//! Verifying that an object is destroyed exactly when the test expects it.
//!
//! ```
//! # use verimock::*;
//! let conn = Deathwatched::new("conn", vec![0u8; 16]);
//! let monitor = conn.expect_destruction().register();
//! assert_eq!(16, conn.len());
//! drop(conn);
//! drop(monitor);
//! ```
//!
//! Dropping a watched object while no destruction is expected is reported.
//! ```should_panic(expected = "Unexpected destruction of conn")
//! # use verimock::*;
//! let conn = Deathwatched::new("conn", ());
//! drop(conn);     // panics!
//! ```

use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{
    diagnostics,
    engine_lock,
    expectation::ExpectationId,
    reporter::{Channel, Reporter, Severity},
    sequence::{Memberships, SeqInner},
    times::Times,
    DeclarationError,
    Location,
    Multiplicity,
    Sequence
};

/// An attached expectation of destruction.
struct Monitor {
    id: ExpectationId,
    location: Location,
    times: Arc<Times>,
    memberships: Memberships,
}

enum State {
    /// Alive, and nobody expects it to die
    NotExpecting,
    Expecting(Monitor),
    /// Destroyed, as expected
    Died,
    /// The monitor went away while the object was still alive
    Abandoned,
}

struct Watch {
    name: String,
    channel: Channel,
    state: State,
}

/// An object whose destruction is watched.
///
/// Derefs to the wrapped value.
pub struct Deathwatched<T> {
    value: T,
    watch: Arc<Mutex<Watch>>,
    location: Location,
}

impl<T> Deathwatched<T> {
    #[track_caller]
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self::with_channel(name.into(), value, Channel::default())
    }

    /// Watch `value`, reporting to `reporter` instead of the process-wide
    /// reporter.
    #[track_caller]
    pub fn with_reporter(
        name: impl Into<String>,
        value: T,
        reporter: Arc<dyn Reporter>
    ) -> Self
    {
        Self::with_channel(name.into(), value, Channel::new(Some(reporter)))
    }

    #[track_caller]
    fn with_channel(name: String, value: T, channel: Channel) -> Self {
        let watch = Watch { name, channel, state: State::NotExpecting };
        Deathwatched {
            value,
            watch: Arc::new(Mutex::new(watch)),
            location: Location::caller()
        }
    }

    /// Declare that this object must be destroyed before the returned
    /// monitor is dropped.
    #[track_caller]
    pub fn expect_destruction(&self) -> DestructionBuilder {
        DestructionBuilder {
            watch: self.watch.clone(),
            location: Location::caller(),
            sequences: None,
            error: None
        }
    }

    /// Is a destruction currently expected?
    pub fn is_expecting_destruction(&self) -> bool {
        matches!(self.watch.lock().state, State::Expecting(_))
    }
}

impl<T> Deref for Deathwatched<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Deathwatched<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Deathwatched<T> {
    fn drop(&mut self) {
        let _guard = engine_lock();
        let (name, channel, state) = {
            let mut watch = self.watch.lock();
            let state = mem::replace(&mut watch.state, State::Died);
            (watch.name.clone(), watch.channel.clone(), state)
        };
        match state {
            State::Expecting(monitor) => {
                let acting = diagnostics::destruction_text(&name);
                for b in monitor.memberships.blockers(monitor.id) {
                    let msg = diagnostics::sequence_mismatch(&b.sequence,
                        &acting, monitor.location, &b.text);
                    channel.send(Severity::Fatal, monitor.location, &msg);
                }
                monitor.times.call();
                monitor.memberships.retire(monitor.id);
                tracing::debug!("{} died as expected", name);
            }
            State::NotExpecting => {
                let msg = diagnostics::unexpected_destruction(&name);
                channel.send(Severity::Nonfatal, self.location, &msg);
            }
            State::Died | State::Abandoned => ()
        }
    }
}

/// Declares an expected destruction.  Created by
/// [`Deathwatched::expect_destruction`].
#[must_use = "the destruction is only expected after register()"]
pub struct DestructionBuilder {
    watch: Arc<Mutex<Watch>>,
    location: Location,
    sequences: Option<Vec<Weak<SeqInner>>>,
    error: Option<DeclarationError>,
}

impl DestructionBuilder {
    /// Take the last place in line of every one of `sequences`.
    pub fn in_sequence(mut self, sequences: &[&Sequence]) -> Self {
        if self.sequences.is_some() {
            self.error.get_or_insert(DeclarationError::DuplicateSequence);
        } else {
            self.sequences = Some(sequences.iter()
                .map(|s| s.downgrade())
                .collect());
        }
        self
    }

    pub fn try_register(self) -> Result<DeathwatchGuard, DeclarationError> {
        let _guard = engine_lock();
        if let Some(e) = self.error {
            return Err(e);
        }
        let watch = self.watch;
        let mut w = watch.lock();
        match w.state {
            State::Expecting(_) => return Err(DeclarationError::AlreadyWatched),
            State::Died => return Err(DeclarationError::AlreadyDestroyed),
            State::NotExpecting | State::Abandoned => ()
        }
        let id = ExpectationId::next();
        let text = diagnostics::destruction_text(&w.name);
        let times = Arc::new(Times::new(Multiplicity::once()));
        let memberships = Memberships::new(self.sequences.unwrap_or_default());
        memberships.add_last(id, &text, self.location, &times);
        w.state = State::Expecting(Monitor {
            id,
            location: self.location,
            times,
            memberships
        });
        drop(w);
        Ok(DeathwatchGuard { watch })
    }

    /// Like [`try_register`](Self::try_register), but panics if the
    /// destruction is already expected.
    #[track_caller]
    pub fn register(self) -> DeathwatchGuard {
        let location = self.location;
        match self.try_register() {
            Ok(guard) => guard,
            Err(e) => panic!("{}: {}", location, e)
        }
    }
}

/// Expects the destruction of a [`Deathwatched`] object.
///
/// Dropping the guard while the object is still alive is reported.
#[must_use = "the destruction is no longer expected once the guard is dropped"]
pub struct DeathwatchGuard {
    watch: Arc<Mutex<Watch>>,
}

impl DeathwatchGuard {
    /// Has the watched object been destroyed?
    pub fn is_dead(&self) -> bool {
        matches!(self.watch.lock().state, State::Died)
    }
}

impl Drop for DeathwatchGuard {
    fn drop(&mut self) {
        let _guard = engine_lock();
        let mut watch = self.watch.lock();
        match mem::replace(&mut watch.state, State::Abandoned) {
            State::Expecting(monitor) => {
                monitor.memberships.retire(monitor.id);
                let msg = diagnostics::still_alive(&watch.name);
                let channel = watch.channel.clone();
                drop(watch);
                channel.send(Severity::Nonfatal, monitor.location, &msg);
            }
            State::Died => {
                watch.state = State::Died;
                let channel = watch.channel.clone();
                let text = diagnostics::destruction_text(&watch.name);
                drop(watch);
                channel.send_ok(&text);
            }
            state => watch.state = state
        }
    }
}
