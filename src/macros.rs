/// Asserts structural equality, ignoring source spans.
#[macro_export]
macro_rules! assert_spanless_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_spanless_eq! { $left, $right, "" }
    };

    ($left:expr, $right:expr, $($fmt:tt)*) => {
        match (&$left, &$right) {
            (left, right) => assert! {
                $crate::location::SpanlessEq::spanless_eq(left, right),
                "spanless assertion `left == right` failed\n  left: {:#?}\n right: {:#?}\n{}",
                left,
                right,
                format_args!($($fmt)*),
            },
        }
    };
}

#[macro_export]
macro_rules! assert_spanless_ne {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_spanless_ne! { $left, $right, "" }
    };

    ($left:expr, $right:expr, $($fmt:tt)*) => {
        match (&$left, &$right) {
            (left, right) => assert! {
                !$crate::location::SpanlessEq::spanless_eq(left, right),
                "spanless assertion `left != right` failed\n  left: {:#?}\n right: {:#?}\n{}",
                left,
                right,
                format_args!($($fmt)*),
            },
        }
    };
}
