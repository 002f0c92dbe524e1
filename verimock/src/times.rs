// vim: tw=80
use std::ops::{
    Range,
    RangeFrom,
    RangeFull,
    RangeInclusive,
    RangeTo,
    RangeToInclusive
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// The allowed range of call counts for one expectation, `[min, max]`.
///
/// A maximum of `usize::MAX` means "unbounded".  Convert from a plain count,
/// from any kind of range, or use [`at_least`] and [`at_most`].
///
/// ```
/// # use verimock::*;
/// assert_eq!(Multiplicity::new(2, 2), 2usize.into());
/// assert_eq!(Multiplicity::new(1, 3), (1..4usize).into());
/// assert_eq!(Multiplicity::new(1, 3), (1..=3usize).into());
/// assert_eq!(Multiplicity::new(3, usize::MAX), at_least(3));
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Multiplicity {
    pub min: usize,
    pub max: usize,
}

impl Multiplicity {
    pub const fn new(min: usize, max: usize) -> Self {
        Multiplicity { min, max }
    }

    /// Exactly one call.  The default of [`Mock::expect`](crate::Mock::expect).
    pub const fn once() -> Self {
        Multiplicity::new(1, 1)
    }

    /// Any number of calls, including none.
    pub const fn any() -> Self {
        Multiplicity::new(0, usize::MAX)
    }

    /// No calls at all.
    pub const fn never() -> Self {
        Multiplicity::new(0, 0)
    }

    pub fn is_bounded(&self) -> bool {
        self.max != usize::MAX
    }
}

/// At least `n` calls, without an upper bound.
pub const fn at_least(n: usize) -> Multiplicity {
    Multiplicity::new(n, usize::MAX)
}

/// Anywhere from zero to `n` calls.
pub const fn at_most(n: usize) -> Multiplicity {
    Multiplicity::new(0, n)
}

impl From<usize> for Multiplicity {
    fn from(n: usize) -> Self {
        Multiplicity::new(n, n)
    }
}

impl From<Range<usize>> for Multiplicity {
    /// A half-open range.  An empty range yields `min > max`, unless it
    /// starts at zero, in which case it means "never".
    fn from(range: Range<usize>) -> Self {
        Multiplicity::new(range.start, range.end.saturating_sub(1))
    }
}

impl From<RangeInclusive<usize>> for Multiplicity {
    fn from(range: RangeInclusive<usize>) -> Self {
        Multiplicity::new(*range.start(), *range.end())
    }
}

impl From<RangeFrom<usize>> for Multiplicity {
    fn from(range: RangeFrom<usize>) -> Self {
        at_least(range.start)
    }
}

impl From<RangeTo<usize>> for Multiplicity {
    fn from(range: RangeTo<usize>) -> Self {
        Multiplicity::new(0, range.end.saturating_sub(1))
    }
}

impl From<RangeToInclusive<usize>> for Multiplicity {
    fn from(range: RangeToInclusive<usize>) -> Self {
        at_most(range.end)
    }
}

impl From<RangeFull> for Multiplicity {
    fn from(_: RangeFull) -> Self {
        Multiplicity::any()
    }
}

/// The call counter of one expectation, together with its multiplicity.
///
/// Shared between the expectation and its sequence entries.
#[derive(Debug)]
pub(crate) struct Times {
    /// How many times has the expectation already been called?
    count: AtomicUsize,
    range: Multiplicity,
}

impl Times {
    pub fn new(range: Multiplicity) -> Self {
        Times { count: AtomicUsize::new(0), range }
    }

    /// Record one call, returning the new call count.
    pub fn call(&self) -> usize {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn min(&self) -> usize {
        self.range.min
    }

    pub fn max(&self) -> usize {
        self.range.max
    }

    pub fn is_bounded(&self) -> bool {
        self.range.is_bounded()
    }

    /// Is any call at all a violation?
    pub fn is_forbidden(&self) -> bool {
        self.range.max == 0
    }

    /// Has this expectation already been called the minimum required number
    /// of times?
    pub fn is_satisfied(&self) -> bool {
        self.count() >= self.range.min
    }

    /// Has this expectation already been called the maximum allowed number
    /// of times?
    pub fn is_saturated(&self) -> bool {
        self.is_bounded() && !self.is_forbidden() &&
            self.count() >= self.range.max
    }
}
