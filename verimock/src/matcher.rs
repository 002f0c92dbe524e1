// vim: tw=80
//! Argument matchers.
//!
//! A [`Matcher`] decides whether one actual argument satisfies an
//! expectation, and describes what it expected for diagnostics.  An
//! expectation holds one matcher per positional argument, bundled as a tuple
//! implementing [`ArgMatchers`].

use crate::Args;

/// Decides whether an actual argument matches.
pub trait Matcher<T: ?Sized>: Send {
    fn matches(&self, actual: &T) -> bool;

    /// What this matcher expects, like `== 4` or `matching _`.
    fn describe(&self) -> String;

    /// A detailed reason why `actual` didn't match, if the matcher can give
    /// one beyond [`describe`](Matcher::describe).
    fn explain(&self, _actual: &T) -> Option<String> {
        None
    }
}

impl<T: ?Sized, M: Matcher<T> + ?Sized> Matcher<T> for Box<M> {
    fn matches(&self, actual: &T) -> bool {
        (**self).matches(actual)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn explain(&self, actual: &T) -> Option<String> {
        (**self).explain(actual)
    }
}

/// One positional argument that failed its matcher.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mismatch {
    /// Zero-based position of the argument.
    pub index: usize,
    /// The failed matcher's description.
    pub expected: String,
    pub explanation: Option<String>,
}

/// The positional matchers of one expectation.
///
/// Implemented for tuples of [`Matcher`]s whose arity equals the arity of the
/// argument tuple `A`.
pub trait ArgMatchers<A>: Send + 'static {
    fn matches(&self, args: &A) -> bool;

    /// Every argument that fails its matcher, in positional order.
    fn mismatches(&self, args: &A) -> Vec<Mismatch>;

    /// Descriptions of every matcher, in positional order.
    fn describe(&self) -> Vec<String>;
}

/// The matchers of an expectation that didn't specify any: every argument
/// is a wildcard.
pub(crate) struct AnyArgs;

impl<A: Args> ArgMatchers<A> for AnyArgs {
    fn matches(&self, _args: &A) -> bool {
        true
    }

    fn mismatches(&self, _args: &A) -> Vec<Mismatch> {
        Vec::new()
    }

    fn describe(&self) -> Vec<String> {
        vec![predicate::WILDCARD.to_owned(); A::ARITY]
    }
}

macro_rules! tuple_matchers {
    ($($idx:tt $t:ident $m:ident),*) => {
        impl<$($t: 'static, $m: Matcher<$t> + 'static,)*>
            ArgMatchers<($($t,)*)> for ($($m,)*)
        {
            #[allow(unused_variables)]
            fn matches(&self, args: &($($t,)*)) -> bool {
                true $(&& self.$idx.matches(&args.$idx))*
            }

            #[allow(unused_mut, unused_variables)]
            fn mismatches(&self, args: &($($t,)*)) -> Vec<Mismatch> {
                let mut mismatches = Vec::new();
                $(
                    if !self.$idx.matches(&args.$idx) {
                        mismatches.push(Mismatch {
                            index: $idx,
                            expected: self.$idx.describe(),
                            explanation: self.$idx.explain(&args.$idx),
                        });
                    }
                )*
                mismatches
            }

            fn describe(&self) -> Vec<String> {
                vec![$(self.$idx.describe()),*]
            }
        }
    }
}

tuple_matchers!();
tuple_matchers!(0 A0 M0);
tuple_matchers!(0 A0 M0, 1 A1 M1);
tuple_matchers!(0 A0 M0, 1 A1 M1, 2 A2 M2);
tuple_matchers!(0 A0 M0, 1 A1 M1, 2 A2 M2, 3 A3 M3);
tuple_matchers!(0 A0 M0, 1 A1 M1, 2 A2 M2, 3 A3 M3, 4 A4 M4);
tuple_matchers!(0 A0 M0, 1 A1 M1, 2 A2 M2, 3 A3 M3, 4 A4 M4, 5 A5 M5);
tuple_matchers!(0 A0 M0, 1 A1 M1, 2 A2 M2, 3 A3 M3, 4 A4 M4, 5 A5 M5,
                6 A6 M6);
tuple_matchers!(0 A0 M0, 1 A1 M1, 2 A2 M2, 3 A3 M3, 4 A4 M4, 5 A5 M5,
                6 A6 M6, 7 A7 M7);

/// Built-in matchers.
pub mod predicate {
    use std::fmt::Debug;
    use std::ops;

    use cfg_if::cfg_if;
    use predicates::ord::{EqPredicate, OrdPredicate};
    use predicates::prelude::Predicate;
    use predicates_tree::CaseTreeExt;

    use super::Matcher;

    pub(crate) const WILDCARD: &str = "matching _";

    /// A relational comparison against a stored value.
    ///
    /// Created by [`eq`], [`ne`], [`lt`], [`le`], [`gt`] and [`ge`].
    pub struct Relational<P> {
        pred: P,
        op: &'static str,
        operand: String,
    }

    impl<T, P> Matcher<T> for Relational<P>
        where T: ?Sized, P: Predicate<T> + Send
    {
        fn matches(&self, actual: &T) -> bool {
            self.pred.eval(actual)
        }

        fn describe(&self) -> String {
            format!("{} {}", self.op, self.operand)
        }
    }

    /// Matches an argument equal to `value`.
    pub fn eq<T: Debug + PartialEq>(value: T) -> Relational<EqPredicate<T>> {
        let operand = format!("{:?}", value);
        Relational { pred: predicates::ord::eq(value), op: "==", operand }
    }

    /// Matches an argument not equal to `value`.
    pub fn ne<T: Debug + PartialEq>(value: T) -> Relational<EqPredicate<T>> {
        let operand = format!("{:?}", value);
        Relational { pred: predicates::ord::ne(value), op: "!=", operand }
    }

    /// Matches an argument less than `value`.
    pub fn lt<T: Debug + PartialOrd>(value: T) -> Relational<OrdPredicate<T>>
    {
        let operand = format!("{:?}", value);
        Relational { pred: predicates::ord::lt(value), op: "<", operand }
    }

    /// Matches an argument less than or equal to `value`.
    pub fn le<T: Debug + PartialOrd>(value: T) -> Relational<OrdPredicate<T>>
    {
        let operand = format!("{:?}", value);
        Relational { pred: predicates::ord::le(value), op: "<=", operand }
    }

    /// Matches an argument greater than `value`.
    pub fn gt<T: Debug + PartialOrd>(value: T) -> Relational<OrdPredicate<T>>
    {
        let operand = format!("{:?}", value);
        Relational { pred: predicates::ord::gt(value), op: ">", operand }
    }

    /// Matches an argument greater than or equal to `value`.
    pub fn ge<T: Debug + PartialOrd>(value: T) -> Relational<OrdPredicate<T>>
    {
        let operand = format!("{:?}", value);
        Relational { pred: predicates::ord::ge(value), op: ">=", operand }
    }

    /// The wildcard.  See [`any`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Anything;

    impl<T: ?Sized> Matcher<T> for Anything {
        fn matches(&self, _actual: &T) -> bool {
            true
        }

        fn describe(&self) -> String {
            WILDCARD.to_owned()
        }
    }

    /// Matches any argument at all.
    pub fn any() -> Anything {
        Anything
    }

    /// Inverts another matcher.  See [`not`].
    pub struct Not<M>(M);

    impl<T: ?Sized, M: Matcher<T>> Matcher<T> for Not<M> {
        fn matches(&self, actual: &T) -> bool {
            !self.0.matches(actual)
        }

        fn describe(&self) -> String {
            format!("not {}", self.0.describe())
        }
    }

    /// Matches an argument that `matcher` rejects.
    pub fn not<M>(matcher: M) -> Not<M> {
        Not(matcher)
    }

    /// Applies another matcher to the pointee.  See [`deref`].
    pub struct Deref<M>(M);

    impl<T, M> Matcher<T> for Deref<M>
        where T: ops::Deref + ?Sized, M: Matcher<T::Target>
    {
        fn matches(&self, actual: &T) -> bool {
            self.0.matches(&**actual)
        }

        fn describe(&self) -> String {
            format!("*{}", self.0.describe())
        }

        fn explain(&self, actual: &T) -> Option<String> {
            self.0.explain(&**actual)
        }
    }

    /// Matches a pointer-like argument (`Box`, `Arc`, `&'static T`, ...)
    /// whose pointee satisfies `matcher`.
    pub fn deref<M>(matcher: M) -> Deref<M> {
        Deref(matcher)
    }

    /// A user supplied predicate and its description.  See [`custom`].
    pub struct Custom<F> {
        f: F,
        text: String,
    }

    impl<T, F> Matcher<T> for Custom<F>
        where T: ?Sized, F: Fn(&T) -> bool + Send
    {
        fn matches(&self, actual: &T) -> bool {
            (self.f)(actual)
        }

        fn describe(&self) -> String {
            self.text.clone()
        }
    }

    /// Matches an argument for which `f` returns true.  `text` describes the
    /// requirement in diagnostics.
    ///
    /// ```
    /// # use verimock::predicate::*;
    /// # use verimock::Matcher;
    /// let even = custom(|x: &u32| x % 2 == 0, "is even");
    /// assert!(Matcher::<u32>::matches(&even, &4));
    /// assert_eq!("is even", Matcher::<u32>::describe(&even));
    /// ```
    pub fn custom<T, F>(f: F, text: impl Into<String>) -> Custom<F>
        where T: ?Sized, F: Fn(&T) -> bool + Send
    {
        Custom { f, text: text.into() }
    }

    /// Adapts a [`Predicate`].  See [`pred`].
    pub struct Pred<P>(P);

    impl<T, P> Matcher<T> for Pred<P>
        where T: ?Sized, P: Predicate<T> + Send
    {
        fn matches(&self, actual: &T) -> bool {
            self.0.eval(actual)
        }

        fn describe(&self) -> String {
            format!("matching {}", self.0)
        }

        fn explain(&self, actual: &T) -> Option<String> {
            self.0.find_case(false, actual)
                .map(|case| case.tree().to_string())
        }
    }

    /// Matches an argument satisfying any [`Predicate`] from the
    /// `predicates` crate.  Mismatches are explained with the predicate's
    /// case tree.
    pub fn pred<P>(predicate: P) -> Pred<P> {
        Pred(predicate)
    }

    cfg_if! {
        if #[cfg(feature = "regex")] {
            use predicates::str::{RegexError, RegexPredicate};

            /// Matches strings against a regular expression.  See [`re`].
            pub struct Regex {
                pred: RegexPredicate,
                pattern: String,
            }

            impl<T: AsRef<str> + ?Sized> Matcher<T> for Regex {
                fn matches(&self, actual: &T) -> bool {
                    self.pred.eval(actual.as_ref())
                }

                fn describe(&self) -> String {
                    format!("matching regular expression /{}/", self.pattern)
                }
            }

            /// Matches a string-like argument against the regular
            /// expression `pattern`.  Fails if `pattern` doesn't compile.
            pub fn re(pattern: &str) -> Result<Regex, RegexError> {
                let pred = predicates::str::is_match(pattern)?;
                Ok(Regex { pred, pattern: pattern.to_owned() })
            }
        }
    }
}
