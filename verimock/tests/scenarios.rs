// vim: tw=80
//! End-to-end diagnostics, as a test framework would see them
#![deny(warnings)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use verimock::*;
use verimock::predicate::*;

const F: Member<(u32,), ()> = Member::new("f", "void(u32)");
const GETTER: Member<(u32,), u32> = Member::new("getter", "u32(u32)");
const COUNT: Member<(), u32> = Member::new("count", "u32()");
const FUNC: Member<(u32, &'static str), ()> =
    Member::new("func", "void(u32, &str)");

fn recording() -> (Arc<RecordingReporter>, Mock) {
    let reporter = Arc::new(RecordingReporter::new());
    let mock = Mock::with_reporter("obj", reporter.clone());
    (reporter, mock)
}

/// A required call that never happens
#[test]
fn never_called() {
    let (reporter, mock) = recording();
    {
        let _e = mock.expect(&F).args((eq(3),)).register();
    }
    let line = line!() - 2;
    let reports = reporter.take();
    assert_eq!(1, reports.len());
    assert_eq!(Severity::Nonfatal, reports[0].severity);
    assert_eq!(Location { file: file!(), line }, reports[0].location);
    assert_eq!(
        "Unfulfilled expectation:\nExpected obj.f(== 3) to be called once, \
         actually never called\n  param  _1 == 3\n",
        reports[0].message);
}

/// Every pending expectation is listed, newest first
#[test]
fn two_candidates() {
    let (reporter, mock) = recording();
    let e4 = mock.expect(&GETTER).args((eq(4),)).return_const(0).register();
    let line4 = line!() - 1;
    let e5 = mock.expect(&GETTER).args((eq(5),)).return_const(0).register();
    let line5 = line!() - 1;
    let v = mock.try_call(&GETTER, (3,)).unwrap_err();
    let call_line = line!() - 1;
    assert_eq!(
        format!("No match for call of obj.getter with signature u32(u32) \
                 with.\n  param  _1 == 3\n\
                 \nTried obj.getter(== 5) at {file}:{line5}\n\
                 \x20 Expected  _1 == 5\n\
                 \nTried obj.getter(== 4) at {file}:{line4}\n\
                 \x20 Expected  _1 == 4\n",
                 file = file!(), line4 = line4, line5 = line5),
        v.message());
    assert_eq!(Location { file: file!(), line: call_line }, v.location());
    let reports = reporter.take();
    assert_eq!(1, reports.len());
    assert_eq!(Severity::Fatal, reports[0].severity);

    // Both were already named in a fatal report, so their end is quiet
    drop(e5);
    drop(e4);
    assert!(reporter.is_empty());
}

/// A call that must wait for an at-least count in its sequence
#[test]
fn sequence_threshold() {
    let (reporter, mock) = recording();
    let seq = Sequence::new("s");
    let _count = mock.expect(&COUNT)
        .times(at_least(3))
        .in_sequence(&[&seq])
        .return_const(1)
        .register();
    let _func = mock.expect(&FUNC)
        .args((any(), any()))
        .in_sequence(&[&seq])
        .register();
    mock.call(&COUNT, ());
    mock.call(&COUNT, ());
    let v = mock.try_call(&FUNC, (1, "x")).unwrap_err();
    assert_eq!(ViolationKind::Sequence, v.kind());
    assert!(v.message().contains("has obj.count() first in line"));
    assert_eq!(1, reporter.take().len());
}

#[test]
fn sequence_threshold_reached() {
    let (reporter, mock) = recording();
    let seq = Sequence::new("s");
    let _count = mock.expect(&COUNT)
        .times(at_least(3))
        .in_sequence(&[&seq])
        .return_const(1)
        .register();
    let _func = mock.expect(&FUNC)
        .args((any(), any()))
        .in_sequence(&[&seq])
        .register();
    for _ in 0..3 {
        mock.call(&COUNT, ());
    }
    mock.call(&FUNC, (1, "x"));
    assert!(reporter.is_empty());
}

/// An allowed call need never happen
#[test]
fn allowed_but_never_called() {
    let (reporter, mock) = recording();
    {
        let _e = mock.allow(&F).register();
    }
    assert!(reporter.is_empty());
    assert!(reporter.oks().is_empty());
}

/// A forbidden call that happens anyway
#[test]
fn forbidden_call() {
    let (reporter, mock) = recording();
    let _e = mock.forbid(&F).args((eq(1),)).register();
    let line = line!() - 1;
    let v = mock.try_call(&F, (1,)).unwrap_err();
    assert_eq!(ViolationKind::Forbidden, v.kind());
    assert_eq!(
        format!("Match of forbidden call of obj.f(== 1) at {}:{}\n  \
                 param  _1 == 1\n", file!(), line),
        v.message());
    assert_eq!(1, reporter.take().len());
}

#[test]
#[should_panic(expected = "Match of forbidden call of obj.f(matching _)")]
fn forbidden_call_does_not_return() {
    let mock = Mock::new("obj");
    let _e = mock.forbid(&F).register();
    mock.call(&F, (0,));
}

/// Calls matching only used-up expectations say so
#[test]
fn saturated() {
    let (reporter, mock) = recording();
    let _e = mock.expect(&F).args((eq(1),)).register();
    let line = line!() - 1;
    mock.call(&F, (1,));
    let v = mock.try_call(&F, (1,)).unwrap_err();
    assert_eq!(ViolationKind::Saturated, v.kind());
    assert_eq!(
        format!("No match for call of obj.f with signature void(u32) with.\n\
                 \x20 param  _1 == 1\n\
                 \nMatches saturated call requirement\n\
                 \x20 obj.f(== 1) at {}:{}\n", file!(), line),
        v.message());
    assert_eq!(1, reporter.take().len());
}

/// Expectations left when a mock is destroyed are reported together, in
/// declaration order
#[test]
fn destroyed_mock() {
    let (reporter, mock) = recording();
    mock.expect(&F).args((eq(1),)).register().release();
    let line = line!() - 1;
    mock.expect(&GETTER).return_const(0).register().release();
    mock.expect(&F).args((eq(2),)).times(2).register().release();
    mock.call(&F, (2,));
    drop(mock);
    let reports = reporter.take();
    assert_eq!(1, reports.len());
    assert_eq!(Severity::Nonfatal, reports[0].severity);
    assert_eq!(Location { file: file!(), line }, reports[0].location);
    assert_eq!(
        "Pending expectation on destroyed mock object:\nExpected obj.f(== 1) \
         to be called once, actually never called\n  param  _1 == 1\n\
         Pending expectation on destroyed mock object:\nExpected \
         obj.getter(matching _) to be called once, actually never \
         called\n  param  _1 matching _\n\
         Pending expectation on destroyed mock object:\nExpected obj.f(== 2) \
         to be called 2 times, actually called once\n  param  _1 == 2\n",
        reports[0].message);
}

/// A panicking reporter still hears about every pending expectation
#[test]
fn destroyed_mock_panics_once() {
    let mock = Mock::new("obj");
    mock.expect(&F).args((eq(1),)).register().release();
    mock.expect(&F).args((eq(2),)).register().release();
    let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        drop(mock)
    }));
    let payload = r.unwrap_err();
    let msg = payload.downcast_ref::<String>().unwrap();
    let first = msg.find("Expected obj.f(== 1)").unwrap();
    let second = msg.find("Expected obj.f(== 2)").unwrap();
    assert!(first < second);
}

#[test]
fn checkpoint_reports_together() {
    let (reporter, mock) = recording();
    let e1 = mock.expect(&F).args((eq(1),)).register();
    let e2 = mock.expect(&F).args((eq(2),)).register();
    mock.checkpoint();
    let reports = reporter.take();
    assert_eq!(1, reports.len());
    assert_eq!(2, reports[0].message.matches("Unfulfilled expectation:\n")
               .count());
    // The guards have nothing left to report
    drop(e2);
    drop(e1);
    assert!(reporter.is_empty());
}

/// The default reporter's payload names the location first
#[test]
fn default_reporter_payload() {
    let r = std::panic::catch_unwind(|| {
        Mock::new("obj").call(&F, (0,))
    });
    let line = line!() - 2;
    let payload = r.unwrap_err();
    let msg = payload.downcast_ref::<String>().unwrap();
    assert!(msg.starts_with(&format!("{}:{}\nNo match for call of obj.f",
                                     file!(), line)));
}

/// Every violation is reported once, even if the expectation ends
/// unfulfilled later
#[test]
fn reported_once() {
    let (reporter, mock) = recording();
    let seq = Sequence::new("s");
    let a = mock.expect(&F).args((eq(1),)).in_sequence(&[&seq]).register();
    let b = mock.expect(&F).args((eq(2),)).in_sequence(&[&seq]).register();
    assert!(mock.try_call(&F, (2,)).is_err());
    assert_eq!(1, reporter.take().len());
    drop(b);
    assert!(reporter.is_empty());
    drop(a);
    assert_eq!(1, reporter.take().len());
}

/// A fatal violation fails the call even when the reporter returns
#[test]
#[should_panic(expected = "No match for call of obj.f")]
fn call_panics_after_reporting() {
    let (_reporter, mock) = recording();
    mock.call(&F, (0,));
}
