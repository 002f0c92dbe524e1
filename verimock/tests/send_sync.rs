// vim: tw=80
//! Mock objects and their helpers may be shared between threads
#![deny(warnings)]

use static_assertions::assert_impl_all;
use verimock::*;

assert_impl_all!(Mock: Send, Sync);
assert_impl_all!(Sequence: Send, Sync, Clone);
assert_impl_all!(ExpectationGuard: Send, Sync);
assert_impl_all!(ExpectationBuilder<(u32,), u32>: Send);
assert_impl_all!(Deathwatched<Vec<u8>>: Send, Sync);
assert_impl_all!(DeathwatchGuard: Send, Sync);
assert_impl_all!(Member<(u32,), String>: Send, Sync, Copy);
assert_impl_all!(RecordingReporter: Reporter);
assert_impl_all!(Violation: std::error::Error, Send, Sync);
assert_impl_all!(DeclarationError: std::error::Error, Send, Sync);
