// vim: tw=80
//! The single injection point for every violation the engine detects.

use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};

use crate::Location;

/// How serious a reported violation is.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    /// The call that triggered the report cannot continue normally.
    Fatal,
    /// Detected at the end of an object's life; execution may continue.
    Nonfatal,
}

/// Receives diagnostics from the engine.
///
/// Reporters are invoked with the engine lock held.  A reporter that blocks
/// indefinitely stalls all mocking activity in the process.
pub trait Reporter: Send + Sync {
    /// Receive one violation.
    ///
    /// A fatal report should not return normally if at all possible.  If it
    /// does, the violation is still returned to the caller of
    /// [`Mock::try_call`](crate::Mock::try_call), and [`Mock::call`](
    /// crate::Mock::call) panics with it.
    fn send(&self, severity: Severity, location: Location, message: &str);

    /// Positive confirmation that a bounded expectation ended its life
    /// satisfied.  `message` is the expectation's description.
    fn send_ok(&self, _message: &str) {}
}

/// Panics with every report, unless the thread is already panicking, in
/// which case the report is printed to stderr instead.
///
/// The panic payload is a `String` of the form `"{location}\n{message}"`,
/// so that the panic hook prints it and `#[should_panic(expected = ...)]`
/// can match on any part of the message.  Code that needs the typed
/// [`Violation`](crate::Violation) should call
/// [`Mock::try_call`](crate::Mock::try_call), or install a reporter of its
/// own.
///
/// ```
/// # use verimock::*;
/// let f = Member::<(), ()>::new("f", "void()");
/// let r = std::panic::catch_unwind(|| Mock::new("obj").call(&f, ()));
/// let payload = r.unwrap_err();
/// let msg = payload.downcast_ref::<String>().unwrap();
/// assert!(msg.contains("\nNo match for call of obj.f"));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultReporter;

impl Reporter for DefaultReporter {
    fn send(&self, _severity: Severity, location: Location, message: &str) {
        if thread::panicking() {
            eprintln!("{}\n{}", location, message);
        } else {
            panic!("{}\n{}", location, message);
        }
    }
}

/// One report received by a [`RecordingReporter`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

/// Records every report instead of acting on it.
///
/// ```
/// # use std::sync::Arc;
/// # use verimock::*;
/// let reporter = Arc::new(RecordingReporter::new());
/// {
///     let mock = Mock::with_reporter("obj", reporter.clone());
///     let f = Member::<(), ()>::new("f", "void()");
///     let _e = mock.expect(&f).register();
/// }
/// let reports = reporter.take();
/// assert_eq!(1, reports.len());
/// assert_eq!(Severity::Nonfatal, reports[0].severity);
/// assert!(reports[0].message.contains("actually never called"));
/// ```
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
    oks: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every report received so far.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    /// Every report received so far, leaving the reporter empty.
    pub fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock())
    }

    /// Every positive confirmation received so far.
    pub fn oks(&self) -> Vec<String> {
        self.oks.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl Reporter for RecordingReporter {
    fn send(&self, severity: Severity, location: Location, message: &str) {
        self.reports.lock().push(Report {
            severity,
            location,
            message: message.to_owned()
        });
    }

    fn send_ok(&self, message: &str) {
        self.oks.lock().push(message.to_owned());
    }
}

static REPORTER: RwLock<Option<Arc<dyn Reporter>>> =
    parking_lot::const_rwlock(None);

/// Install the process-wide reporter, returning the previous one.
///
/// Objects created with their own reporter, like with
/// [`Mock::with_reporter`](crate::Mock::with_reporter), are unaffected.
pub fn set_reporter(reporter: Arc<dyn Reporter>) -> Arc<dyn Reporter> {
    REPORTER.write().replace(reporter)
        .unwrap_or_else(|| Arc::new(DefaultReporter))
}

fn global() -> Arc<dyn Reporter> {
    REPORTER.read().clone().unwrap_or_else(|| Arc::new(DefaultReporter))
}

/// Where one object sends its reports: its own reporter, if it was given
/// one, or else whatever reporter is installed process-wide at the time of
/// the report.
#[derive(Clone, Default)]
pub(crate) struct Channel(Option<Arc<dyn Reporter>>);

impl Channel {
    pub fn new(reporter: Option<Arc<dyn Reporter>>) -> Self {
        Channel(reporter)
    }

    fn reporter(&self) -> Arc<dyn Reporter> {
        self.0.clone().unwrap_or_else(global)
    }

    pub fn send(&self, severity: Severity, location: Location, message: &str) {
        tracing::warn!(?severity, %location, "{}", message);
        self.reporter().send(severity, location, message);
    }

    pub fn send_ok(&self, message: &str) {
        tracing::debug!("satisfied: {}", message);
        self.reporter().send_ok(message);
    }
}
