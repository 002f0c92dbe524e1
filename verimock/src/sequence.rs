// vim: tw=80
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{
    diagnostics,
    engine_lock,
    expectation::ExpectationId,
    reporter::{Channel, Reporter, Severity},
    times::Times,
    Location
};

/// Used to enforce that calls, possibly on different mock objects, happen
/// in the order their expectations were declared.
///
/// Every expectation added to a sequence with
/// [`in_sequence`](crate::ExpectationBuilder::in_sequence) takes the last
/// place in line.  An expectation may only be called while it's first in
/// line in every sequence it belongs to, and it leaves the line once it has
/// been called its minimum number of times.  Expectations that require no
/// calls at all never wait in line.
///
/// Clones refer to the same sequence.  When the last clone is dropped while
/// expectations are still waiting in line, they are reported as missing.
///
/// # Examples
/// ```
/// # use verimock::*;
/// let seq = Sequence::new("s");
/// let mock = Mock::new("obj");
/// let foo = Member::<(), ()>::new("foo", "void()");
/// let bar = Member::<(), ()>::new("bar", "void()");
/// let _e1 = mock.expect(&foo).times(2).in_sequence(&[&seq]).register();
/// let _e2 = mock.expect(&bar).in_sequence(&[&seq]).register();
/// mock.call(&foo, ());
/// mock.call(&foo, ());
/// mock.call(&bar, ());
/// ```
///
/// Calling out of order is a fatal violation.
/// ```should_panic(expected = "Sequence mismatch for sequence \"s\"")
/// # use verimock::*;
/// let seq = Sequence::new("s");
/// let mock = Mock::new("obj");
/// let foo = Member::<(), ()>::new("foo", "void()");
/// let bar = Member::<(), ()>::new("bar", "void()");
/// let _e1 = mock.expect(&foo).in_sequence(&[&seq]).register();
/// let _e2 = mock.expect(&bar).in_sequence(&[&seq]).register();
/// mock.call(&bar, ());    // panics!
/// ```
#[derive(Clone)]
pub struct Sequence {
    inner: Arc<SeqInner>,
}

impl Sequence {
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_channel(name.into(), Channel::default(), Location::caller())
    }

    /// Create a sequence that reports its own violations to `reporter`
    /// instead of the process-wide reporter.
    #[track_caller]
    pub fn with_reporter(name: impl Into<String>, reporter: Arc<dyn Reporter>)
        -> Self
    {
        Self::with_channel(name.into(), Channel::new(Some(reporter)),
                           Location::caller())
    }

    fn with_channel(name: String, channel: Channel, location: Location)
        -> Self
    {
        let inner = Arc::new(SeqInner {
            name,
            channel,
            location,
            queue: Mutex::new(VecDeque::new())
        });
        Sequence { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Is nothing waiting in line anymore?
    pub fn is_completed(&self) -> bool {
        let _guard = engine_lock();
        self.inner.queue.lock().is_empty()
    }

    pub(crate) fn downgrade(&self) -> Weak<SeqInner> {
        Arc::downgrade(&self.inner)
    }
}

/// One expectation waiting in line.
struct SeqEntry {
    id: ExpectationId,
    text: String,
    location: Location,
    times: Arc<Times>,
}

pub(crate) struct SeqInner {
    name: String,
    channel: Channel,
    /// Where the sequence was created
    location: Location,
    /// Only entries that haven't yet reached their minimum call count
    queue: Mutex<VecDeque<SeqEntry>>,
}

impl SeqInner {
    fn position(&self, id: ExpectationId) -> Option<usize> {
        self.queue.lock().iter().position(|e| e.id == id)
    }

    fn retire(&self, id: ExpectationId) {
        self.queue.lock().retain(|e| e.id != id);
    }
}

impl Drop for SeqInner {
    fn drop(&mut self) {
        let _guard = engine_lock();
        let queue = self.queue.get_mut();
        if queue.is_empty() {
            return;
        }
        let msg = diagnostics::sequence_missing(
            &self.name,
            queue.iter()
                .filter(|e| !e.times.is_satisfied())
                .map(|e| (e.text.as_str(), e.location))
        );
        queue.clear();
        self.channel.send(Severity::Nonfatal, self.location, &msg);
    }
}

/// A sequence entry that blocks some other entry.
pub(crate) struct Blocker {
    pub sequence: String,
    pub text: String,
}

/// The sequences one expectation belongs to.
#[derive(Default)]
pub(crate) struct Memberships {
    sequences: Vec<Weak<SeqInner>>,
}

impl Memberships {
    pub fn new(sequences: Vec<Weak<SeqInner>>) -> Self {
        Memberships { sequences }
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    fn live(&self) -> impl Iterator<Item = Arc<SeqInner>> + '_ {
        self.sequences.iter().filter_map(Weak::upgrade)
    }

    /// Take the last place in line of every sequence.
    pub fn add_last(
        &self,
        id: ExpectationId,
        text: &str,
        location: Location,
        times: &Arc<Times>
    ) {
        if times.is_satisfied() {
            return;
        }
        for seq in self.live() {
            seq.queue.lock().push_back(SeqEntry {
                id,
                text: text.to_owned(),
                location,
                times: times.clone()
            });
        }
    }

    /// Is this expectation first in line in every one of its sequences?
    ///
    /// An expectation that isn't waiting in some sequence at all doesn't
    /// have to wait for anything in it.
    pub fn is_first(&self, id: ExpectationId) -> bool {
        self.live().all(|seq| matches!(seq.position(id), None | Some(0)))
    }

    /// Every entry standing in line ahead of this expectation, in sequence
    /// order and then in line order.
    pub fn blockers(&self, id: ExpectationId) -> Vec<Blocker> {
        let mut blockers = Vec::new();
        for seq in self.live() {
            let queue = seq.queue.lock();
            if let Some(pos) = queue.iter().position(|e| e.id == id) {
                blockers.extend(queue.iter().take(pos).map(|e| Blocker {
                    sequence: seq.name.clone(),
                    text: e.text.clone()
                }));
            }
        }
        blockers
    }

    /// Leave the line of every sequence.
    pub fn retire(&self, id: ExpectationId) {
        for seq in self.live() {
            seq.retire(id);
        }
    }
}
