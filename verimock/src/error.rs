// vim: tw=80
use thiserror::Error;

use crate::Location;

/// The kind of a fatal [`Violation`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ViolationKind {
    /// No live expectation matched the call.
    NoMatch,
    /// Only expectations that already reached their maximum call count
    /// matched the call.
    Saturated,
    /// The call matched a forbidden expectation.
    Forbidden,
    /// The call matched an expectation ahead of its turn in a sequence.
    Sequence,
}

/// A fatal violation detected while dispatching a call.
///
/// By the time a `Violation` is returned, the [`Reporter`](crate::Reporter)
/// has already received it.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{message}")]
pub struct Violation {
    kind: ViolationKind,
    location: Location,
    message: String,
}

impl Violation {
    pub(crate) fn new(
        kind: ViolationKind,
        location: Location,
        message: String
    ) -> Self
    {
        Violation { kind, location, message }
    }

    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    /// Where the offending call was made.
    pub fn location(&self) -> Location {
        self.location
    }

    /// The full diagnostic, as sent to the reporter.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An illegal combination of modifiers on a declared expectation.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DeclarationError {
    #[error("Only one argument list is allowed per expectation")]
    DuplicateArgs,
    #[error("Only one call count is allowed per expectation; allow() and \
             forbid() already set one")]
    DuplicateTimes,
    #[error("Only one in_sequence() list is allowed per expectation")]
    DuplicateSequence,
    #[error("Only one reaction (returning, return_const, return_once, \
             throwing) is allowed per expectation")]
    DuplicateReaction,
    #[error("A forbidden call cannot have a reaction")]
    ForbiddenWithReaction,
    #[error("A forbidden call cannot have side effects")]
    ForbiddenWithSideEffect,
    #[error("A forbidden call cannot be part of a sequence")]
    ForbiddenWithSequence,
    #[error("Minimum call count {min} exceeds the maximum {max}")]
    InvertedTimes { min: usize, max: usize },
    #[error("Missing reaction: a call returning {return_type} needs \
             returning(), return_const(), return_once() or throwing()")]
    MissingReaction { return_type: &'static str },
    #[error("return_once() can only be used when the maximum call count is \
             1, not {max}")]
    ReturnOnceRepeatable { max: usize },
    #[error("The object is already under deathwatch")]
    AlreadyWatched,
    #[error("The object has already been destroyed")]
    AlreadyDestroyed,
}
