// vim: tw=80
use std::fmt::Debug;

/// The argument tuple of a mocked member.
///
/// Implemented for tuples of up to eight `Debug` values.  Each argument is
/// rendered with its `Debug` representation in diagnostics and traces.
pub trait Args: Send + 'static {
    /// Number of positional arguments.
    const ARITY: usize;

    /// Render every argument, in positional order.
    fn render(&self) -> Vec<String>;
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! tuple_args {
    ($($idx:tt $t:ident),*) => {
        impl<$($t: Debug + Send + 'static,)*> Args for ($($t,)*) {
            const ARITY: usize = count!($($t)*);

            fn render(&self) -> Vec<String> {
                vec![$(format!("{:?}", self.$idx)),*]
            }
        }
    }
}

tuple_args!();
tuple_args!(0 A0);
tuple_args!(0 A0, 1 A1);
tuple_args!(0 A0, 1 A1, 2 A2);
tuple_args!(0 A0, 1 A1, 2 A2, 3 A3);
tuple_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4);
tuple_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5);
tuple_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5, 6 A6);
tuple_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5, 6 A6, 7 A7);
