// vim: tw=80
//! Every message the engine reports, rendered in one place.

use std::fmt::Write;

use crate::{Location, Mismatch};

pub(crate) const UNFULFILLED: &str = "Unfulfilled expectation";
pub(crate) const DESTROYED_MOCK: &str =
    "Pending expectation on destroyed mock object";

/// Why one tried expectation rejected the call.
pub(crate) enum Rejection {
    /// The positional matchers failed.
    Args(Vec<Mismatch>),
    /// The positional matchers passed, but these conditions didn't.
    Conditions(Vec<String>),
}

/// One active expectation that was tried and rejected, in scan order.
pub(crate) struct Tried {
    pub text: String,
    pub location: Location,
    pub rejection: Rejection,
}

/// The actual arguments of a call, one line each.
pub(crate) fn actual_params(rendered: &[String]) -> String {
    let mut s = String::new();
    for (i, value) in rendered.iter().enumerate() {
        let _ = writeln!(s, "  param  _{} == {}", i + 1, value);
    }
    s
}

/// The matchers of an expectation, one line each.
pub(crate) fn expected_params(described: &[String]) -> String {
    let mut s = String::new();
    for (i, d) in described.iter().enumerate() {
        let _ = writeln!(s, "  param  _{} {}", i + 1, d);
    }
    s
}

fn no_match_header(member: &str, signature: &str, params: &str) -> String {
    format!("No match for call of {} with signature {} with.\n{}",
            member, signature, params)
}

pub(crate) fn no_match(
    member: &str,
    signature: &str,
    params: &str,
    tried: &[Tried]
) -> String
{
    let mut s = no_match_header(member, signature, params);
    for t in tried {
        let _ = write!(s, "\nTried {} at {}\n", t.text, t.location);
        match &t.rejection {
            Rejection::Conditions(conditions) => {
                for c in conditions {
                    let _ = writeln!(s, "  Failed WITH({})", c);
                }
            }
            Rejection::Args(mismatches) => {
                for m in mismatches {
                    let _ = writeln!(s, "  Expected  _{} {}", m.index + 1,
                                     m.expected);
                    if let Some(explanation) = &m.explanation {
                        for line in explanation.lines() {
                            let _ = writeln!(s, "    {}", line);
                        }
                    }
                }
            }
        }
    }
    s
}

pub(crate) fn saturated(
    member: &str,
    signature: &str,
    params: &str,
    matches: &[(String, Location)]
) -> String
{
    let mut s = no_match_header(member, signature, params);
    s.push_str("\nMatches saturated call requirement\n");
    for (text, location) in matches {
        let _ = writeln!(s, "  {} at {}", text, location);
    }
    s
}

pub(crate) fn unfulfilled(
    header: &str,
    text: &str,
    min: usize,
    count: usize,
    params: &str
) -> String
{
    let expected = match min {
        1 => "once".to_owned(),
        n => format!("{} times", n)
    };
    let actual = match count {
        0 => "never called".to_owned(),
        1 => "called once".to_owned(),
        n => format!("called {} times", n)
    };
    format!("{}:\nExpected {} to be called {}, actually {}\n{}",
            header, text, expected, actual, params)
}

pub(crate) fn forbidden(text: &str, location: Location, params: &str)
    -> String
{
    format!("Match of forbidden call of {} at {}\n{}", text, location, params)
}

pub(crate) fn sequence_mismatch(
    sequence: &str,
    acting: &str,
    location: Location,
    blocking: &str
) -> String
{
    format!("Sequence mismatch for sequence \"{}\" with matching call of {} \
             at {}. Sequence \"{}\" has {} first in line\n",
             sequence, acting, location, sequence, blocking)
}

pub(crate) fn sequence_missing<'a, I>(sequence: &str, missing: I) -> String
    where I: IntoIterator<Item = (&'a str, Location)>
{
    let mut s = format!("Sequence expectations not met at destruction of \
                         sequence object \"{}\":", sequence);
    for (text, location) in missing {
        let _ = write!(s, "\n  missing {} at {}", text, location);
    }
    s.push('\n');
    s
}

pub(crate) fn unexpected_destruction(name: &str) -> String {
    format!("Unexpected destruction of {}\n", name)
}

pub(crate) fn still_alive(name: &str) -> String {
    format!("Object {} is still alive\n", name)
}

/// The text of an expected destruction, as shown in sequence diagnostics.
pub(crate) fn destruction_text(name: &str) -> String {
    format!("destruction of {}", name)
}

/// A call as shown to a [`Tracer`](crate::Tracer), before its outcome.
pub(crate) fn traced_call(text: &str, params: &str) -> String {
    format!("{} with.\n{}", text, params)
}

/// Describe a panic payload the way a throwing reaction's trace shows it.
pub(crate) fn thrown(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        format!(" threw exception: what = {}\n", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!(" threw exception: what = {}\n", msg)
    } else {
        " threw unknown exception\n".to_owned()
    }
}

#[cfg(test)]
mod t {
    use super::*;

    const LOC: Location = Location { file: "t.rs", line: 7 };

    #[test]
    fn unfulfilled_counts() {
        assert_eq!(
            "Unfulfilled expectation:\nExpected o.f() to be called once, \
             actually never called\n",
            unfulfilled(UNFULFILLED, "o.f()", 1, 0, ""));
        assert_eq!(
            "Pending expectation on destroyed mock object:\nExpected o.f() \
             to be called 3 times, actually called once\n",
            unfulfilled(DESTROYED_MOCK, "o.f()", 3, 1, ""));
        assert!(unfulfilled(UNFULFILLED, "o.f()", 3, 2, "")
                .ends_with("actually called 2 times\n"));
    }

    #[test]
    fn no_match_with_explanation() {
        let tried = [Tried {
            text: "o.f(== 1)".to_owned(),
            location: LOC,
            rejection: Rejection::Args(vec![Mismatch {
                index: 0,
                expected: "== 1".to_owned(),
                explanation: Some("a\nb".to_owned())
            }])
        }];
        let params = actual_params(&["2".to_owned()]);
        assert_eq!(
            "No match for call of f with signature void(u32) with.\n\
             \x20 param  _1 == 2\n\
             \nTried o.f(== 1) at t.rs:7\n\
             \x20 Expected  _1 == 1\n\
             \x20   a\n\
             \x20   b\n",
            no_match("f", "void(u32)", &params, &tried));
    }

    #[test]
    fn sequence_missing_lists_every_entry() {
        let msg = sequence_missing("s", [("o.f()", LOC), ("o.g()", LOC)]);
        assert_eq!(
            "Sequence expectations not met at destruction of sequence \
             object \"s\":\n  missing o.f() at t.rs:7\n  missing o.g() at \
             t.rs:7\n",
            msg);
    }

    #[test]
    fn thrown_payloads() {
        assert_eq!(" threw exception: what = boom\n", thrown(&"boom"));
        assert_eq!(" threw exception: what = boom\n",
                   thrown(&String::from("boom")));
        assert_eq!(" threw unknown exception\n", thrown(&42u32));
    }
}
