//! Macro for defining step lists.
//!
//! - `suite!`: Build a non-empty HList of steps for a [`Run`](crate::Run)

/// Build a non-empty, ordered list of steps.
///
/// An empty invocation does not match any rule, so empty runs are rejected at
/// compile time.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use witnet_tester::steps::{port_is_up, tcp_connect, tcp_disconnect};
/// use witnet_tester::{poll, suite, Run, Session};
///
/// # async fn demo() {
/// let steps = suite![
///     poll(port_is_up("127.0.0.1:21338"), Duration::from_secs(1), 5),
///     tcp_connect("127.0.0.1:21338"),
///     tcp_disconnect(),
/// ];
/// let result = Run::new(steps, Session::new()).start().await;
/// std::process::exit(if result.is_completed() { 0 } else { 1 });
/// # }
/// ```
#[macro_export]
macro_rules! suite {
    ($only:expr $(,)?) => {
        $crate::HSingle::new($only)
    };

    ($first:expr, $($rest:expr),+ $(,)?) => {
        $crate::HCons::new($first, $crate::suite!($($rest),+))
    };
}
