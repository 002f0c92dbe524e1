// vim: tw=80
//! Replacing the process-wide reporter.
//!
//! The reporter is process-wide, so everything is checked from a single test.
#![deny(warnings)]

use std::sync::Arc;

use verimock::*;

const F: Member<(), ()> = Member::new("f", "void()");

#[test]
fn set_reporter_redirects_reports() {
    let reporter = Arc::new(RecordingReporter::new());
    let previous = set_reporter(reporter.clone());

    let mock = Mock::new("obj");
    let v = mock.try_call(&F, ()).unwrap_err();
    let reports = reporter.take();
    assert_eq!(1, reports.len());
    assert_eq!(Severity::Fatal, reports[0].severity);
    assert_eq!(v.message(), reports[0].message);

    // Objects with their own reporter bypass the process-wide one
    let own = Arc::new(RecordingReporter::new());
    let private = Mock::with_reporter("private", own.clone());
    assert!(private.try_call(&F, ()).is_err());
    assert!(reporter.is_empty());
    assert_eq!(1, own.take().len());

    // A fatal report that returns still fails the call
    let r = std::panic::catch_unwind(|| {
        Mock::new("other").call(&F, ())
    });
    assert!(r.is_err());
    assert_eq!(1, reporter.take().len());

    // Sequences and deathwatches report here too
    let seq = Sequence::new("s");
    let e = mock.expect(&F).in_sequence(&[&seq]).register();
    drop(seq);
    assert!(reporter.take()[0].message
            .starts_with("Sequence expectations not met"));
    drop(e);
    assert_eq!(1, reporter.take().len());
    drop(Deathwatched::new("conn", ()));
    assert_eq!("Unexpected destruction of conn\n",
               reporter.take()[0].message);

    // Restoring the previous reporter hands back this one
    drop(mock);
    let mine = set_reporter(previous);
    assert!(Arc::ptr_eq(&mine, &(reporter.clone() as Arc<dyn Reporter>)));
}
