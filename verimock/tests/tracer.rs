// vim: tw=80
//! Tracing dispatched calls.
//!
//! The tracer is process-wide, so everything is checked from a single test.
#![deny(warnings)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use verimock::*;
use verimock::predicate::*;

const FOO: Member<(u32,), u32> = Member::new("foo", "u32(u32)");
const BAR: Member<(), ()> = Member::new("bar", "void()");

fn output(tracer: &StreamTracer<Vec<u8>>) -> String {
    String::from_utf8(std::mem::take(&mut *tracer.lock())).unwrap()
}

#[test]
fn trace() {
    let mock = Mock::new("obj");
    let tracer = Arc::new(StreamTracer::new(Vec::new()));

    // Nothing is traced before the tracer is installed
    let _e0 = mock.allow(&BAR).register();
    mock.call(&BAR, ());

    let guard = set_tracer(tracer.clone());
    let _e1 = mock.expect(&FOO).args((eq(5),)).return_const(6).register();
    let foo_line = line!() - 1;
    assert_eq!(6, mock.call(&FOO, (5,)));
    mock.call(&BAR, ());
    let bar_line = foo_line - 4;
    assert_eq!(
        format!("{file}:{foo_line}\nobj.foo(== 5) with.\n  param  _1 == 5\n \
                 -> 6\n\n{file}:{bar_line}\nobj.bar() with.\n -> ()\n\n",
                 file = file!(), foo_line = foo_line, bar_line = bar_line),
        output(&tracer));

    let _e2 = mock.expect(&FOO).args((eq(7),)).panicking("boom").register();
    let line = line!() - 1;
    let r = panic::catch_unwind(AssertUnwindSafe(|| mock.call(&FOO, (7,))));
    assert!(r.is_err());
    assert_eq!(
        format!("{}:{}\nobj.foo(== 7) with.\n  param  _1 == 7\n threw \
                 exception: what = boom\n\n", file!(), line),
        output(&tracer));

    // Violations aren't calls, and aren't traced
    let v = {
        let r = Arc::new(RecordingReporter::new());
        let other = Mock::with_reporter("other", r);
        other.try_call(&BAR, ()).unwrap_err()
    };
    assert_eq!(ViolationKind::NoMatch, v.kind());
    assert_eq!("", output(&tracer));

    // A nested tracer shadows the outer one until its guard is dropped
    let inner = set_tracer(Arc::new(LogTracer));
    mock.call(&BAR, ());
    assert_eq!("", output(&tracer));
    drop(inner);
    mock.call(&BAR, ());
    assert!(output(&tracer).contains("obj.bar() with.\n -> ()\n"));

    drop(guard);
    mock.call(&BAR, ());
    assert_eq!("", output(&tracer));
}
