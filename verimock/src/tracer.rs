// vim: tw=80
use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Observes every dispatched call.
pub trait Tracer: Send + Sync {
    /// `file` and `line` locate the expectation that matched.  `call`
    /// renders the call, its arguments, and what it returned or threw.
    fn trace(&self, file: &str, line: u32, call: &str);
}

static TRACER: Mutex<Option<Arc<dyn Tracer>>> = parking_lot::const_mutex(None);

/// Keeps a tracer installed.  Dropping it restores the tracer that was
/// active before.
#[must_use = "the tracer is uninstalled as soon as the guard is dropped"]
pub struct TracerGuard {
    previous: Option<Arc<dyn Tracer>>,
}

impl Drop for TracerGuard {
    fn drop(&mut self) {
        *TRACER.lock() = self.previous.take();
    }
}

/// Install `tracer` as the process-wide tracer, shadowing the current one
/// until the returned guard is dropped.
pub fn set_tracer(tracer: Arc<dyn Tracer>) -> TracerGuard {
    let previous = TRACER.lock().replace(tracer);
    TracerGuard { previous }
}

pub(crate) fn active() -> Option<Arc<dyn Tracer>> {
    TRACER.lock().clone()
}

/// Writes every traced call to a stream.
///
/// ```
/// # use std::sync::Arc;
/// # use verimock::*;
/// let tracer = Arc::new(StreamTracer::new(Vec::new()));
/// let guard = set_tracer(tracer.clone());
/// # drop(guard);
/// ```
pub struct StreamTracer<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> StreamTracer<W> {
    pub fn new(out: W) -> Self {
        StreamTracer { out: Mutex::new(out) }
    }

    /// Access the underlying stream.
    pub fn lock(&self) -> MutexGuard<'_, W> {
        self.out.lock()
    }
}

impl<W: Write + Send> Tracer for StreamTracer<W> {
    fn trace(&self, file: &str, line: u32, call: &str) {
        let mut out = self.out.lock();
        if let Err(e) = write!(out, "{}:{}\n{}\n", file, line, call) {
            tracing::warn!("cannot write trace: {}", e);
        }
    }
}

/// Forwards every traced call to `tracing`, at the `INFO` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, file: &str, line: u32, call: &str) {
        tracing::info!(target: "verimock", file, line, "{}", call);
    }
}
